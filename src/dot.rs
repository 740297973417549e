//! Renders a `DecisionTree` as a Graphviz DOT digraph with readable edge labels.
//!
//! Numeric splits are labelled `≤ t` / `> t`. One-hot splits are turned back
//! into categorical conditions: the right branch is the category itself, the
//! left branch lists the categories of the same base feature that are still
//! possible on that path.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{RenderOptions, ONE_HOT_THRESHOLD, ONE_HOT_TOLERANCE};
use crate::error::{Error, InvalidModelError};
use crate::external::{GraphBackend, ImageFormat};
use crate::features::{base_categories, split_feature, CategoryMap};
use crate::tree::{DecisionTree, NodeId};
use crate::utils::escape_label;

const GRAPH_HEADER: &str = "digraph Tree {\n\
node [shape=box, style=\"rounded, filled\", color=\"lightblue\", fontname=\"helvetica\"];\n";
const GRAPH_FOOTER: &str = "}";

/// Renders trees trained on a fixed set of feature and class names.
///
/// The base -> categories map is built once from `all_feature_names` and
/// shared (read-only) by every render.
#[derive(Debug, Clone)]
pub struct DotRenderer<'a> {
    feature_names: &'a [String],
    class_names: &'a [String],
    base_categories: CategoryMap,
    options: RenderOptions,
}

/// Edge labels for the two children of a split, plus the category maps they inherit.
struct Branches {
    left_label: String,
    right_label: String,
    /// `None` when both children keep the parent's map.
    narrowed: Option<(CategoryMap, CategoryMap)>,
}

impl<'a> DotRenderer<'a> {
    /// # Arguments
    /// * `feature_names` - Name of each feature index used by the tree.
    /// * `class_names` - Name of each class index.
    /// * `all_feature_names` - Every one-hot column produced from the original
    ///   table, before feature selection. Defaults to `feature_names`.
    pub fn new(
        feature_names: &'a [String],
        class_names: &'a [String],
        all_feature_names: Option<&[String]>,
    ) -> Self {
        Self::with_options(feature_names, class_names, all_feature_names, RenderOptions::default())
    }

    pub fn with_options(
        feature_names: &'a [String],
        class_names: &'a [String],
        all_feature_names: Option<&[String]>,
        options: RenderOptions,
    ) -> Self {
        let all = all_feature_names.unwrap_or(feature_names);
        DotRenderer {
            feature_names,
            class_names,
            base_categories: base_categories(all, options.separator),
            options,
        }
    }

    pub fn base_categories(&self) -> &CategoryMap {
        &self.base_categories
    }

    /// Produces the DOT text for `tree`.
    ///
    /// Nodes are emitted in pre-order (left subtree before right), each
    /// non-root node followed by its incoming edge.
    pub fn to_dot(&self, tree: &DecisionTree) -> Result<String, InvalidModelError> {
        tree.check_names(self.feature_names.len(), self.class_names.len())?;

        let mut dot = String::from(GRAPH_HEADER);
        self.recurse(tree, 0, None, &self.base_categories, &mut dot);
        dot.push_str(GRAPH_FOOTER);

        debug!(nodes = tree.nodes_len(), bytes = dot.len(), "rendered decision tree to DOT");
        Ok(dot)
    }

    /// Renders `tree` and rasterizes it to `output` through `backend`.
    pub fn save(
        &self,
        tree: &DecisionTree,
        output: &Path,
        format: ImageFormat,
        backend: &dyn GraphBackend,
    ) -> Result<PathBuf, Error> {
        let dot = self.to_dot(tree)?;
        backend.render(&dot, format, output)?;
        info!(path = %output.display(), format = format.as_str(), "saved decision tree image");
        Ok(output.to_path_buf())
    }

    fn recurse(
        &self,
        tree: &DecisionTree,
        node: NodeId,
        parent: Option<(NodeId, &str)>,
        allowed: &CategoryMap,
        dot: &mut String,
    ) {
        // Writing into a String cannot fail, so the fmt::Results below are ignored.
        let Some(feature) = tree.get_feature(node) else {
            let class_name = &self.class_names[tree.get_leaf_class(node)];
            let _ = writeln!(
                dot,
                "\"{node}\" [label=\"{}\", style=filled, fillcolor=\"lightgreen\"];",
                escape_label(class_name)
            );
            push_edge(dot, parent, node);
            return;
        };

        let (base, category) = split_feature(&self.feature_names[feature], self.options.separator);
        let threshold = tree.get_threshold(node);

        let _ = writeln!(dot, "\"{node}\" [label=\"{}\n≤ {threshold:.2}\"];", escape_label(base));
        push_edge(dot, parent, node);

        let branches = branch_labels(base, category, threshold, allowed);
        let (left_allowed, right_allowed) = match &branches.narrowed {
            Some((left, right)) => (left, right),
            None => (allowed, allowed),
        };

        self.recurse(
            tree,
            tree.get_left_id(node),
            Some((node, branches.left_label.as_str())),
            left_allowed,
            dot,
        );
        self.recurse(
            tree,
            tree.get_right_id(node),
            Some((node, branches.right_label.as_str())),
            right_allowed,
            dot,
        );
    }
}

fn push_edge(dot: &mut String, parent: Option<(NodeId, &str)>, node: NodeId) {
    if let Some((parent, label)) = parent {
        let _ = writeln!(dot, "\"{parent}\" -> \"{node}\" [label=\"{label}\"];");
    }
}

/// A split is read as one-hot when the column carries a category and the
/// threshold sits on 0.5. This is a heuristic: a numeric column whose name
/// contains the separator and happens to split at 0.5 is labelled as categorical.
fn is_one_hot_split(category: Option<&str>, threshold: f64) -> bool {
    category.is_some_and(|c| !c.is_empty()) && (threshold - ONE_HOT_THRESHOLD).abs() < ONE_HOT_TOLERANCE
}

/// Computes edge labels for both children of a split.
///
/// For a one-hot split each child receives its own copy of `allowed`, so
/// narrowing on one side is never visible to the sibling subtree.
fn branch_labels(base: &str, category: Option<&str>, threshold: f64, allowed: &CategoryMap) -> Branches {
    let category = match category {
        Some(category) if is_one_hot_split(Some(category), threshold) => category,
        _ => {
            return Branches {
                left_label: format!("≤ {threshold:.2}"),
                right_label: format!("> {threshold:.2}"),
                narrowed: None,
            };
        }
    };

    let mut left_allowed = allowed.clone();
    let mut right_allowed = allowed.clone();
    let remaining = left_allowed.entry(base.to_string()).or_default();
    remaining.remove(category);
    right_allowed.insert(base.to_string(), [category.to_string()].into());

    let base_label = escape_label(base);
    let category_label = escape_label(category);
    let left_label = match remaining.len() {
        0 => format!("{base_label} ≠ {category_label}"),
        1 => remaining.iter().map(|c| escape_label(c).into_owned()).collect::<String>(),
        _ => {
            let listed: Vec<_> = remaining.iter().map(|c| escape_label(c)).collect();
            format!("{base_label} in {{{}}}", listed.join(", "))
        }
    };

    Branches {
        left_label,
        right_label: category_label.into_owned(),
        narrowed: Some((left_allowed, right_allowed)),
    }
}

/// Renders `tree` to DOT text.
///
/// `all_feature_names` defaults to `used_feature_names` when `None`.
///
/// # Errors
/// `InvalidModelError` if a split feature or a leaf class has no name.
pub fn render_graph_text(
    tree: &DecisionTree,
    used_feature_names: &[String],
    class_names: &[String],
    all_feature_names: Option<&[String]>,
) -> Result<String, InvalidModelError> {
    DotRenderer::new(used_feature_names, class_names, all_feature_names).to_dot(tree)
}
