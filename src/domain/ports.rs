use crate::domain::errors::ArtifactError;
use chrono::{DateTime, NaiveDate, Utc};

/// Key → blob store for trained model artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Returns `Ok(None)` when nothing has been saved under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, ArtifactError>;

    /// Replaces whatever was stored under `key`.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), ArtifactError>;

    fn describe(&self) -> String;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}
