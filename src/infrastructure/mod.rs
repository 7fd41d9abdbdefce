pub mod clock;
pub mod observability;
pub mod persistence;

pub use clock::{FixedClock, SystemClock};
pub use persistence::{FileArtifactStore, InMemoryArtifactStore};
