//! Customer segments, matched in order by LTV and order-count minimums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProfile {
    pub name: String,
    pub min_lifetime_value: f64,
    pub min_orders: usize,
    /// Repurchase cycle assumed when the customer has no purchase intervals.
    pub default_cycle_days: f64,
    pub timing_multiplier: f64,
    pub confidence_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTable {
    /// Most valuable first. The last entry is the catch-all.
    pub segments: Vec<SegmentProfile>,
}

impl SegmentTable {
    pub fn classify(&self, lifetime_value: f64, orders: usize) -> Option<&SegmentProfile> {
        self.segments
            .iter()
            .find(|s| lifetime_value >= s.min_lifetime_value && orders >= s.min_orders)
            .or_else(|| self.segments.last())
    }

    pub fn get(&self, name: &str) -> Option<&SegmentProfile> {
        self.segments.iter().find(|s| s.name == name)
    }
}

impl Default for SegmentTable {
    fn default() -> Self {
        let segment = |name: &str, ltv, orders, cycle, timing, confidence| SegmentProfile {
            name: name.to_string(),
            min_lifetime_value: ltv,
            min_orders: orders,
            default_cycle_days: cycle,
            timing_multiplier: timing,
            confidence_multiplier: confidence,
        };

        Self {
            segments: vec![
                segment("high_value", 500.0, 3, 21.0, 0.8, 1.1),
                segment("regular", 100.0, 2, 45.0, 1.0, 1.0),
                segment("new", 0.0, 0, 60.0, 1.3, 0.8),
            ],
        }
    }
}
