//! JSON interchange for trained trees.
//!
//! A model file carries scikit-learn's `clf.tree_` arrays together with the
//! names the renderer needs. It can be produced from Python with
//!
//! ```text
//! t = clf.tree_
//! json.dump({"features": t.feature.tolist(), "thresholds": t.threshold.tolist(),
//!            "children_left": t.children_left.tolist(),
//!            "children_right": t.children_right.tolist(),
//!            "values": t.value[:, 0, :].tolist(),
//!            "feature_names": list(X_train.columns), "class_names": list(classes),
//!            "all_feature_names": list(X.columns)}, f)
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, InvalidModelError};
use crate::tree::DecisionTree;

/// Structure mirroring scikit-learn's internal `_tree.Tree` arrays plus naming metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TreeExport {
    /// `features[node]` = feature index for the split, or -2 for leaves.
    pub features: Vec<i64>,
    /// `thresholds[node]` = split threshold, or -2.0 for leaves.
    pub thresholds: Vec<f64>,
    /// `children_left[node]` = left child (`x <= threshold`), or -1 for leaves.
    pub children_left: Vec<i64>,
    /// `children_right[node]` = right child (`x > threshold`), or -1 for leaves.
    pub children_right: Vec<i64>,
    /// `values[node][class]` = class weights at the node.
    pub values: Vec<Vec<f64>>,
    /// Name of each feature index the tree was trained on.
    pub feature_names: Vec<String>,
    /// Name of each class index.
    pub class_names: Vec<String>,
    /// Every encoded column before feature selection. Falls back to `feature_names`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_feature_names: Option<Vec<String>>,
}

/// A validated tree and the names that go with it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub tree: DecisionTree,
    pub feature_names: Vec<String>,
    pub class_names: Vec<String>,
    pub all_feature_names: Option<Vec<String>>,
}

impl LoadedModel {
    pub fn all_feature_names(&self) -> Option<&[String]> {
        self.all_feature_names.as_deref()
    }
}

impl TreeExport {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a model file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Writes the model as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_tree(
        tree: &DecisionTree,
        feature_names: Vec<String>,
        class_names: Vec<String>,
        all_feature_names: Option<Vec<String>>,
    ) -> Self {
        TreeExport {
            features: tree.features().to_vec(),
            thresholds: tree.thresholds().to_vec(),
            children_left: tree.children_left().to_vec(),
            children_right: tree.children_right().to_vec(),
            values: tree.values().to_vec(),
            feature_names,
            class_names,
            all_feature_names,
        }
    }

    /// Validates the arrays and names, producing a tree ready to render.
    pub fn into_model(self) -> Result<LoadedModel, InvalidModelError> {
        let tree = DecisionTree::new(
            self.features,
            self.thresholds,
            self.children_left,
            self.children_right,
            self.values,
        )?;
        tree.check_names(self.feature_names.len(), self.class_names.len())?;
        Ok(LoadedModel {
            tree,
            feature_names: self.feature_names,
            class_names: self.class_names,
            all_feature_names: self.all_feature_names,
        })
    }
}

/// Loads and validates a model file in one step.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<LoadedModel, Error> {
    Ok(TreeExport::load(path)?.into_model()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_JSON: &str = r#"{
        "features": [0, -2, -2],
        "thresholds": [0.5, -2.0, -2.0],
        "children_left": [1, -1, -1],
        "children_right": [2, -1, -1],
        "values": [[4.0, 4.0], [4.0, 0.0], [0.0, 4.0]],
        "feature_names": ["color_red"],
        "class_names": ["no", "yes"],
        "all_feature_names": ["color_blue", "color_red"]
    }"#;

    #[test]
    fn test_parse_and_validate() {
        let model = TreeExport::from_json_str(MODEL_JSON).unwrap().into_model().unwrap();
        assert_eq!(model.tree.nodes_len(), 3);
        assert_eq!(model.tree.get_leaf_class(2), 1);
        assert_eq!(model.feature_names, ["color_red"]);
        assert_eq!(model.all_feature_names().map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_all_feature_names_is_optional() {
        let json = MODEL_JSON.replace(r#",
        "all_feature_names": ["color_blue", "color_red"]"#, "");
        let export = TreeExport::from_json_str(&json).unwrap();
        assert_eq!(export.all_feature_names, None);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = TreeExport::from_json_str("{\"features\": [0]").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_names_are_checked() {
        let json = MODEL_JSON.replace(r#""class_names": ["no", "yes"]"#, r#""class_names": ["no"]"#);
        let err = TreeExport::from_json_str(&json).unwrap().into_model().unwrap_err();
        assert_eq!(err, InvalidModelError::ClassOutOfRange { node: 2, class: 1, n_classes: 1 });
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let export = TreeExport::from_json_str(MODEL_JSON).unwrap();
        export.save(&path).unwrap();

        let model = load_model(&path).unwrap();
        let again = TreeExport::from_tree(
            &model.tree,
            model.feature_names.clone(),
            model.class_names.clone(),
            model.all_feature_names.clone(),
        );
        assert_eq!(again, export);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = TreeExport::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io { ref path, .. } if path.ends_with("here.json")));
    }
}
