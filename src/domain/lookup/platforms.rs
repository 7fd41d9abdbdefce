//! Ad-platform lookup table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Typical days before a creative fatigues.
    pub fatigue_cycle_days: u32,
    /// Relative fatigue speed, fed into the creative feature vector.
    pub fatigue_factor: f64,
    /// Relative return efficiency used when weighting platform ROI.
    pub budget_efficiency: f64,
    pub optimal_frequency: f64,
    pub ctr_warning_threshold: f64,
    pub cpm_warning_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformTable {
    pub platforms: BTreeMap<String, PlatformProfile>,
    pub default: PlatformProfile,
}

impl PlatformTable {
    /// Case-insensitive lookup, unknown platforms map to the default profile.
    pub fn get(&self, platform: &str) -> &PlatformProfile {
        self.platforms
            .get(&platform.trim().to_lowercase())
            .unwrap_or(&self.default)
    }

    pub fn is_known(&self, platform: &str) -> bool {
        self.platforms.contains_key(&platform.trim().to_lowercase())
    }
}

impl Default for PlatformTable {
    fn default() -> Self {
        let profile = |cycle, factor, efficiency, frequency, ctr, cpm| PlatformProfile {
            fatigue_cycle_days: cycle,
            fatigue_factor: factor,
            budget_efficiency: efficiency,
            optimal_frequency: frequency,
            ctr_warning_threshold: ctr,
            cpm_warning_multiplier: cpm,
        };

        let mut platforms = BTreeMap::new();
        platforms.insert("facebook".to_string(), profile(7, 1.0, 1.0, 2.0, 0.02, 1.5));
        platforms.insert("instagram".to_string(), profile(5, 1.2, 0.9, 2.5, 0.015, 1.6));
        platforms.insert("google".to_string(), profile(14, 0.8, 1.1, 3.0, 0.025, 1.3));
        platforms.insert("tiktok".to_string(), profile(3, 1.5, 0.8, 4.0, 0.01, 2.0));

        Self {
            platforms,
            default: profile(7, 1.0, 1.0, 2.0, 0.02, 1.5),
        }
    }
}
