//! dtree-dot: render trained decision trees as Graphviz diagrams.
//!
//! Trees come in as scikit-learn style parallel arrays. Splits on one-hot
//! encoded columns (`color_red`, `color_blue`, ...) are turned back into
//! categorical conditions such as `color in {blue, green}`.
//!
//! # Key Types
//!
//! - [`DecisionTree`] - validated array-backed tree
//! - [`DotRenderer`] / [`render_graph_text`] - DOT generation
//! - [`GraphBackend`] / [`Graphviz`] / [`save_image`] - rasterization
//! - [`TreeExport`] - JSON model files
//! - [`Dataset`] - CSV preparation producing encoded feature names

pub mod config;
pub mod dot;
pub mod error;
pub mod export;
pub mod external;
pub mod features;
pub mod logging;
pub mod preprocess;
pub mod tree;
pub mod utils;

pub use config::{GraphvizConfig, RenderOptions};
pub use dot::{render_graph_text, DotRenderer};
pub use error::{DatasetError, Error, InvalidModelError, RenderBackendError};
pub use export::{load_model, LoadedModel, TreeExport};
pub use external::{save_image, GraphBackend, Graphviz, ImageFormat};
pub use preprocess::{Dataset, PreparedDataset};
pub use tree::{DecisionTree, NodeId};
