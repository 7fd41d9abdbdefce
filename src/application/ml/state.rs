use crate::domain::ml::Artifact;
use crate::domain::ports::ArtifactStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trained-model availability of one predictor.
///
/// Transitions are pure: [`PredictorState::resolve`] consumes the current
/// state and returns the next one, so a caller holding `&self` can resolve a
/// throwaway copy without mutating anything.
#[derive(Debug)]
pub enum PredictorState<M> {
    /// No load attempted yet
    Unresolved,
    /// Load attempted, nothing usable in the store
    Missing,
    /// Loaded from the artifact store
    Loaded(Arc<Artifact<M>>),
    /// Trained during this process lifetime
    Trained(Arc<Artifact<M>>),
}

impl<M> Clone for PredictorState<M> {
    fn clone(&self) -> Self {
        match self {
            PredictorState::Unresolved => PredictorState::Unresolved,
            PredictorState::Missing => PredictorState::Missing,
            PredictorState::Loaded(artifact) => PredictorState::Loaded(Arc::clone(artifact)),
            PredictorState::Trained(artifact) => PredictorState::Trained(Arc::clone(artifact)),
        }
    }
}

impl<M> PredictorState<M> {
    pub fn artifact(&self) -> Option<&Arc<Artifact<M>>> {
        match self {
            PredictorState::Loaded(artifact) | PredictorState::Trained(artifact) => Some(artifact),
            PredictorState::Unresolved | PredictorState::Missing => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.artifact().is_some()
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, PredictorState::Unresolved)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PredictorState::Unresolved => "unresolved",
            PredictorState::Missing => "missing",
            PredictorState::Loaded(_) => "loaded",
            PredictorState::Trained(_) => "trained",
        }
    }
}

impl<M: DeserializeOwned> PredictorState<M> {
    /// Ready states are kept as they are; anything else attempts one load.
    /// Unreadable, corrupt or schema-mismatched artifacts resolve to `Missing`.
    pub fn resolve(self, store: &dyn ArtifactStore, key: &str, schema: &str) -> Self {
        if self.is_ready() {
            return self;
        }

        let bytes = match store.load(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No artifact for {} in {}", key, store.describe());
                return PredictorState::Missing;
            }
            Err(e) => {
                warn!("Failed to read artifact for {}: {}", key, e);
                return PredictorState::Missing;
            }
        };

        let artifact: Artifact<M> = match serde_json::from_slice(&bytes) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Failed to deserialize artifact for {}: {}", key, e);
                return PredictorState::Missing;
            }
        };

        if artifact.schema != schema {
            warn!(
                "Rejecting {} artifact: schema {} does not match extractor {}",
                key, artifact.schema, schema
            );
            return PredictorState::Missing;
        }

        info!(
            "Loaded {} model trained at {} on {} samples",
            key, artifact.trained_at, artifact.samples
        );
        PredictorState::Loaded(Arc::new(artifact))
    }
}
