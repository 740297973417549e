//! The trained decision tree as consumed by the renderer.
//!
//! Nodes are stored as parallel arrays indexed by node id, exactly as
//! scikit-learn exposes them through `clf.tree_`. Node 0 is the root.

use crate::error::InvalidModelError;
use crate::utils;

/// Type alias for a node identifier (index into the parallel arrays).
pub type NodeId = usize;

// --- Sklearn-Style Sentinels ---
/// Sentinel value for child ids (children_left, children_right) of a leaf node.
pub const CHILD_LEAF_SENTINEL: i64 = -1;
/// Sentinel value for the feature index of a leaf node.
pub const FEATURE_LEAF_SENTINEL: i64 = -2;
/// Sentinel threshold scikit-learn stores for leaves.
pub const THRESHOLD_LEAF_SENTINEL: f64 = -2.0;
/// Sentinel for the leaf class of an internal node.
pub const INTERNAL_NODE_CLASS_SENTINEL: usize = usize::MAX;
// --- End Sentinels ---

/// A binary decision tree using Structure of Arrays (SoA).
///
/// Construction validates the shape once, so every accessor can index
/// without further checks and traversals from the root always terminate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    features: Vec<i64>,
    thresholds: Vec<f64>,
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    values: Vec<Vec<f64>>,
    /// Precomputed argmax class for each leaf. `INTERNAL_NODE_CLASS_SENTINEL` for internal nodes.
    leaf_classes: Vec<usize>,
}

impl DecisionTree {
    /// Builds a tree from scikit-learn style arrays.
    ///
    /// # Arguments
    /// * `features` - `features[node]` = split feature index, or -2 for leaves.
    /// * `thresholds` - `thresholds[node]` = split threshold (`x <= t` goes left).
    /// * `children_left`, `children_right` - child node ids, -1 for leaves.
    /// * `values` - `values[node][class]` = class weights. Must be non-empty for leaves.
    ///
    /// # Errors
    /// Returns `InvalidModelError` when the arrays disagree in length, a child id
    /// is out of range, the nodes do not form a single tree rooted at 0, or a
    /// leaf carries no class weights.
    pub fn new(
        features: Vec<i64>,
        thresholds: Vec<f64>,
        children_left: Vec<i64>,
        children_right: Vec<i64>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, InvalidModelError> {
        let node_count = features.len();
        if node_count == 0 {
            return Err(InvalidModelError::EmptyTree);
        }
        for (field, found) in [
            ("thresholds", thresholds.len()),
            ("children_left", children_left.len()),
            ("children_right", children_right.len()),
            ("values", values.len()),
        ] {
            if found != node_count {
                return Err(InvalidModelError::LengthMismatch {
                    field,
                    expected: node_count,
                    found,
                });
            }
        }
        for (node, &feature) in features.iter().enumerate() {
            if feature < 0 && feature != FEATURE_LEAF_SENTINEL {
                return Err(InvalidModelError::InvalidFeature { node, feature });
            }
        }

        let mut tree = DecisionTree {
            features,
            thresholds,
            children_left,
            children_right,
            values,
            leaf_classes: Vec::new(),
        };
        tree.check_shape()?;
        tree.leaf_classes = tree.compute_leaf_classes()?;
        Ok(tree)
    }

    /// Walks from the root and checks every node is reached exactly once.
    fn check_shape(&self) -> Result<(), InvalidModelError> {
        let node_count = self.nodes_len();
        let mut visited = vec![false; node_count];
        visited[0] = true;
        let mut stack = vec![0usize];

        while let Some(node) = stack.pop() {
            if self.is_leaf(node) {
                continue;
            }
            for child_raw in [self.children_left[node], self.children_right[node]] {
                if child_raw < 0 || child_raw as usize >= node_count {
                    return Err(InvalidModelError::ChildOutOfRange {
                        node,
                        child: child_raw,
                        node_count,
                    });
                }
                let child = child_raw as usize;
                if visited[child] {
                    return Err(InvalidModelError::SharedNode { node: child });
                }
                visited[child] = true;
                stack.push(child);
            }
        }

        match visited.iter().position(|&seen| !seen) {
            Some(node) => Err(InvalidModelError::UnreachableNode { node }),
            None => Ok(()),
        }
    }

    fn compute_leaf_classes(&self) -> Result<Vec<usize>, InvalidModelError> {
        (0..self.nodes_len())
            .map(|node| {
                if self.is_leaf(node) {
                    utils::argmax(&self.values[node])
                        .ok_or(InvalidModelError::MissingClassWeights { node })
                } else {
                    Ok(INTERNAL_NODE_CLASS_SENTINEL)
                }
            })
            .collect()
    }

    /// Checks that every split feature and every leaf class has a name.
    pub fn check_names(&self, n_features: usize, n_classes: usize) -> Result<(), InvalidModelError> {
        for node in 0..self.nodes_len() {
            if let Some(feature) = self.get_feature(node) {
                if feature >= n_features {
                    return Err(InvalidModelError::FeatureOutOfRange {
                        node,
                        feature,
                        n_features,
                    });
                }
            } else {
                let class = self.leaf_classes[node];
                if class >= n_classes {
                    return Err(InvalidModelError::ClassOutOfRange {
                        node,
                        class,
                        n_classes,
                    });
                }
            }
        }
        Ok(())
    }

    // --- SoA Accessor Methods ---

    /// Checks if the node with the given ID is a leaf.
    /// # Panics
    /// Panics if the `id` is out of bounds.
    #[inline(always)]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.features[id] == FEATURE_LEAF_SENTINEL
    }

    /// Gets the raw feature index (i64). Returns FEATURE_LEAF_SENTINEL (-2) for leaves.
    #[inline(always)]
    pub fn get_feature_raw(&self, id: NodeId) -> i64 {
        self.features[id]
    }

    /// Gets the split feature index, or `None` for leaves.
    #[inline(always)]
    pub fn get_feature(&self, id: NodeId) -> Option<usize> {
        if self.is_leaf(id) {
            None
        } else {
            Some(self.features[id] as usize)
        }
    }

    #[inline(always)]
    pub fn get_threshold(&self, id: NodeId) -> f64 {
        self.thresholds[id]
    }

    /// Gets the left child (taken when `feature <= threshold`).
    /// # Panics
    /// Panics if the node `id` is a leaf or out of bounds.
    #[inline(always)]
    pub fn get_left_id(&self, id: NodeId) -> NodeId {
        let child_raw = self.children_left[id];
        debug_assert!(child_raw != CHILD_LEAF_SENTINEL, "Called get_left_id on a leaf node");
        child_raw as NodeId
    }

    /// Gets the right child (taken when `feature > threshold`).
    /// # Panics
    /// Panics if the node `id` is a leaf or out of bounds.
    #[inline(always)]
    pub fn get_right_id(&self, id: NodeId) -> NodeId {
        let child_raw = self.children_right[id];
        debug_assert!(child_raw != CHILD_LEAF_SENTINEL, "Called get_right_id on a leaf node");
        child_raw as NodeId
    }

    #[inline(always)]
    pub fn get_class_weights(&self, id: NodeId) -> &[f64] {
        &self.values[id]
    }

    /// Gets the predicted class of a leaf. Returns INTERNAL_NODE_CLASS_SENTINEL for internal nodes.
    #[inline(always)]
    pub fn get_leaf_class(&self, id: NodeId) -> usize {
        self.leaf_classes[id]
    }

    // --- Tree Info Methods ---

    /// Returns the number of nodes (internal + leaves).
    #[inline(always)]
    pub fn nodes_len(&self) -> usize {
        self.features.len()
    }

    pub fn leaves_len(&self) -> usize {
        self.features.iter().filter(|&&f| f == FEATURE_LEAF_SENTINEL).count()
    }

    /// Height of the tree; a single leaf has height 0.
    pub fn height(&self) -> usize {
        self.height_from(0)
    }

    fn height_from(&self, node_id: NodeId) -> usize {
        if self.is_leaf(node_id) {
            0
        } else {
            let left_height = self.height_from(self.get_left_id(node_id));
            let right_height = self.height_from(self.get_right_id(node_id));
            1 + left_height.max(right_height)
        }
    }

    /// Number of features a sample must provide (highest split feature + 1).
    pub fn n_features_required(&self) -> usize {
        (0..self.nodes_len())
            .filter_map(|node| self.get_feature(node))
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Predicts the class of one sample by walking from the root.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, InvalidModelError> {
        let mut current_node_id = 0;

        loop {
            let Some(feature_idx) = self.get_feature(current_node_id) else {
                return Ok(self.get_leaf_class(current_node_id));
            };
            let feature_value = *sample.get(feature_idx).ok_or(InvalidModelError::SampleTooShort {
                required: feature_idx + 1,
                found: sample.len(),
            })?;

            current_node_id = if feature_value <= self.get_threshold(current_node_id) {
                self.get_left_id(current_node_id)
            } else {
                self.get_right_id(current_node_id)
            };
        }
    }

    // --- Raw Array Views (for export) ---

    pub fn features(&self) -> &[i64] {
        &self.features
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn children_left(&self) -> &[i64] {
        &self.children_left
    }

    pub fn children_right(&self) -> &[i64] {
        &self.children_right
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }
}
