pub mod gender;
pub mod mesh;
pub mod params;

pub use gender::Gender;
pub use mesh::BodyMesh;
pub use params::{AnthropometricParameters, PARAMETER_COUNT, PARAMETER_NAMES, SENTINEL};
