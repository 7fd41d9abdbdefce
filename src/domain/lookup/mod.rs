//! Immutable domain lookup tables handed to predictors at construction.
//!
//! Built-in defaults cover every table; a TOML file may replace any of them
//! wholesale (tables omitted from the file keep their defaults).

pub mod archetypes;
pub mod categories;
pub mod platforms;
pub mod segments;

pub use archetypes::{ArchetypeProfile, ArchetypeTable, BaselineMetrics, BenchmarkGrades, ValueRange};
pub use categories::{CategoryProfile, CategoryTable, Timeframes};
pub use platforms::{PlatformProfile, PlatformTable};
pub use segments::{SegmentProfile, SegmentTable};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupTables {
    #[serde(default)]
    pub platforms: PlatformTable,
    #[serde(default)]
    pub categories: CategoryTable,
    #[serde(default)]
    pub archetypes: ArchetypeTable,
    #[serde(default)]
    pub segments: SegmentTable,
}

impl LookupTables {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse lookup tables TOML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lookup tables from {:?}", path))?;
        Self::from_toml_str(&content)
    }
}
