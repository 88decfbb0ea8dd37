pub mod config;
pub mod error;
pub mod geometry;
pub mod inversion;
pub mod model;
pub mod pipeline;
pub mod regression;
pub mod types;

pub use config::{InversionConfig, LaplacianConfig, PipelineConfig, Subject};
pub use error::{ArcLengthError, InversionError, Result};
pub use inversion::{Inversion, InvertedBody};
pub use model::{ModelStore, StatisticalModelBundle};
pub use pipeline::Pipeline;
pub use regression::{PredMesh, RegressedMesh};
pub use types::{AnthropometricParameters, BodyMesh, Gender};
