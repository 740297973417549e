//! Error types for tree validation, rendering and dataset preparation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The supplied tree or name lists are structurally inconsistent.
///
/// These point at a bug in whatever produced the model, so retrying is pointless.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidModelError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("array `{field}` has {found} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("node {node} has feature index {feature}, expected >= 0 or the leaf sentinel -2")]
    InvalidFeature { node: usize, feature: i64 },
    #[error("node {node} points to child {child}, outside 0..{node_count}")]
    ChildOutOfRange {
        node: usize,
        child: i64,
        node_count: usize,
    },
    #[error("node {node} is reachable from more than one parent")]
    SharedNode { node: usize },
    #[error("node {node} is not reachable from the root")]
    UnreachableNode { node: usize },
    #[error("leaf node {node} has no class weights")]
    MissingClassWeights { node: usize },
    #[error("node {node} splits on feature {feature}, but only {n_features} feature names were given")]
    FeatureOutOfRange {
        node: usize,
        feature: usize,
        n_features: usize,
    },
    #[error("leaf node {node} predicts class {class}, but only {n_classes} class names were given")]
    ClassOutOfRange {
        node: usize,
        class: usize,
        n_classes: usize,
    },
    #[error("sample has {found} features, tree needs at least {required}")]
    SampleTooShort { required: usize, found: usize },
}

/// The external rasterization step failed.
#[derive(Debug, Error)]
pub enum RenderBackendError {
    #[error("graph renderer `{executable}` is not available: {source}")]
    Unavailable {
        executable: PathBuf,
        source: std::io::Error,
    },
    #[error("graph renderer I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("graph renderer did not finish within {0:?}")]
    Timeout(Duration),
    #[error("graph renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("graph renderer reported success but {0} was not written")]
    MissingOutput(PathBuf),
}

/// A CSV dataset cannot be prepared for training.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("the CSV file must contain valid column names in the first row (found {0:?})")]
    InvalidColumnName(String),
    #[error("CSV file contains duplicate column name {0:?}")]
    DuplicateColumn(String),
    #[error("uploaded dataset is empty")]
    Empty,
    #[error("dataset must have at least {min} columns, found {found}")]
    TooFewColumns { min: usize, found: usize },
    #[error("dataset must have at least {min} rows, found {found}")]
    TooFewRows { min: usize, found: usize },
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("no categorical columns in the data, at least one required")]
    NoCategoricalColumns,
    #[error("target column {0:?} not found in dataset")]
    TargetNotFound(String),
    #[error("target column must have at least 2 unique classes, found {0}")]
    TooFewClasses(usize),
    #[error("class {class:?} in target has {count} samples, at least {min} required")]
    ClassTooSmall {
        class: String,
        count: usize,
        min: usize,
    },
    #[error("too many unique classes in target column ({found}, max {max})")]
    TooManyClasses { found: usize, max: usize },
}

/// Crate-level error returned by operations that touch the filesystem or the renderer.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidModel(#[from] InvalidModelError),
    #[error(transparent)]
    RenderBackend(#[from] RenderBackendError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
