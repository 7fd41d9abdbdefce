//! Product-category lookup table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Human-readable horizons for strong, moderate and mild velocity shifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeframes {
    pub high: String,
    pub medium: String,
    pub low: String,
}

impl Timeframes {
    fn new(high: &str, medium: &str, low: &str) -> Self {
        Self {
            high: high.to_string(),
            medium: medium.to_string(),
            low: low.to_string(),
        }
    }

    pub fn for_magnitude(&self, magnitude: f64) -> &str {
        if magnitude > 0.3 {
            &self.high
        } else if magnitude > 0.15 {
            &self.medium
        } else {
            &self.low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    pub seasonality: f64,
    pub trend_sensitivity: f64,
    pub lifecycle_days: f64,
    /// Scales the rule-based velocity change.
    pub volatility_multiplier: f64,
    pub timeframes: Timeframes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub categories: BTreeMap<String, CategoryProfile>,
    pub default: CategoryProfile,
}

impl CategoryTable {
    pub fn get(&self, category: &str) -> &CategoryProfile {
        self.categories
            .get(&category.trim().to_lowercase())
            .unwrap_or(&self.default)
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        let profile = |seasonality, sensitivity, lifecycle, multiplier, timeframes| CategoryProfile {
            seasonality,
            trend_sensitivity: sensitivity,
            lifecycle_days: lifecycle,
            volatility_multiplier: multiplier,
            timeframes,
        };

        let mut categories = BTreeMap::new();
        categories.insert(
            "fashion".to_string(),
            profile(0.8, 0.9, 90.0, 1.2, Timeframes::new("1 week", "2 weeks", "1 month")),
        );
        categories.insert(
            "electronics".to_string(),
            profile(0.4, 0.7, 365.0, 0.8, Timeframes::new("2 weeks", "1 month", "2 months")),
        );
        categories.insert(
            "beauty".to_string(),
            profile(0.6, 0.8, 180.0, 1.1, Timeframes::new("1 week", "3 weeks", "6 weeks")),
        );
        categories.insert(
            "home".to_string(),
            profile(0.3, 0.5, 730.0, 0.6, Timeframes::new("2 weeks", "6 weeks", "3 months")),
        );
        categories.insert(
            "sports".to_string(),
            profile(0.7, 0.6, 270.0, 0.9, Timeframes::new("1 week", "2 weeks", "1 month")),
        );

        Self {
            categories,
            default: profile(0.5, 0.5, 365.0, 1.0, Timeframes::new("2 weeks", "1 month", "2 months")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_category_values() {
        let table = CategoryTable::default();
        let fashion = table.get("Fashion");
        assert_eq!(fashion.lifecycle_days, 90.0);
        assert_eq!(fashion.volatility_multiplier, 1.2);
        assert_eq!(fashion.timeframes.for_magnitude(0.4), "1 week");
    }

    #[test]
    fn test_unknown_category_uses_general_profile() {
        let table = CategoryTable::default();
        let general = table.get("garden");
        assert_eq!(general.seasonality, 0.5);
        assert_eq!(general.timeframes.for_magnitude(0.2), "1 month");
        assert_eq!(general.timeframes.for_magnitude(0.01), "2 months");
    }
}
