//! Model artifact loading and inference components

pub mod artifact;
pub mod inference;
pub mod loader;

pub use artifact::{ArtifactManifest, ModelArtifact};
pub use inference::{DecisionEngine, ProbabilityModel};
pub use loader::OnnxClassifier;
