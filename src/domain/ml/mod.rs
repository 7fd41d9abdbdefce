pub mod artifact;
pub mod feature_registry;

pub use artifact::{Artifact, FeatureVector, TrainingReport};
