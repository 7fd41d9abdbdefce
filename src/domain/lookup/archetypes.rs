//! Merchant archetypes: classification ranges and peer baselines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive numeric range; `max: None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max: Some(max) }
    }

    pub const fn at_least(min: f64) -> Self {
        Self { min, max: None }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.is_none_or(|max| value <= max)
    }
}

/// Average peer metrics for one archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineMetrics {
    pub merchant_count: usize,
    pub conversion_rate: f64,
    pub aov: f64,
    pub customer_retention: f64,
    pub roas: f64,
    pub lifetime_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeProfile {
    pub order_volume: ValueRange,
    pub avg_order_value: ValueRange,
    pub profit_margin: ValueRange,
    pub characteristics: Vec<String>,
    /// Adjective phrase used in explanations ("premium, brand-focused").
    pub description: String,
    pub actions: Vec<String>,
    pub confidence_multiplier: f64,
    pub baseline: BaselineMetrics,
}

impl ArchetypeProfile {
    /// Number of range criteria satisfied. Absent inputs never score.
    pub fn score(&self, order_volume: Option<f64>, aov: Option<f64>, margin: Option<f64>) -> usize {
        [
            (order_volume, &self.order_volume),
            (aov, &self.avg_order_value),
            (margin, &self.profit_margin),
        ]
        .into_iter()
        .filter(|(value, range)| value.is_some_and(|v| range.contains(v)))
        .count()
    }
}

/// Performance grades quoted in benchmark reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkGrades {
    pub excellent: f64,
    pub good: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTable {
    pub archetypes: BTreeMap<String, ArchetypeProfile>,
    /// Archetype chosen on a tie or when nothing scores.
    pub fallback: String,
    pub grades: BTreeMap<String, BenchmarkGrades>,
}

impl ArchetypeTable {
    pub fn get(&self, archetype: &str) -> Option<&ArchetypeProfile> {
        self.archetypes.get(archetype)
    }

    /// Picks the unique highest-scoring archetype, or the fallback archetype
    /// when the best score is zero or shared.
    pub fn classify(&self, order_volume: Option<f64>, aov: Option<f64>, margin: Option<f64>) -> &str {
        let mut best: Option<(&str, usize)> = None;
        let mut tied = false;

        for (name, profile) in &self.archetypes {
            let score = profile.score(order_volume, aov, margin);
            match best {
                Some((_, top)) if score == top => tied = true,
                Some((_, top)) if score < top => {}
                _ => {
                    best = Some((name.as_str(), score));
                    tied = false;
                }
            }
        }

        match best {
            Some((name, score)) if score > 0 && !tied => name,
            _ => self.fallback.as_str(),
        }
    }
}

impl Default for ArchetypeTable {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let baseline = |count, conversion, aov, retention, roas, ltv| BaselineMetrics {
            merchant_count: count,
            conversion_rate: conversion,
            aov,
            customer_retention: retention,
            roas,
            lifetime_value: ltv,
        };

        let mut archetypes = BTreeMap::new();
        archetypes.insert(
            "high_volume_low_margin".to_string(),
            ArchetypeProfile {
                order_volume: ValueRange::at_least(1000.0),
                avg_order_value: ValueRange::new(0.0, 50.0),
                profit_margin: ValueRange::new(0.0, 0.2),
                characteristics: strings(&["high frequency", "price sensitive customers", "scale efficiency"]),
                description: "high-volume, efficiency-focused".to_string(),
                actions: strings(&[
                    "Focus on automation and process efficiency",
                    "Implement dynamic pricing strategies",
                    "Optimize supply chain and inventory management",
                ]),
                confidence_multiplier: 0.9,
                baseline: baseline(15, 0.025, 35.0, 0.3, 2.8, 180.0),
            },
        );
        archetypes.insert(
            "premium_brand".to_string(),
            ArchetypeProfile {
                order_volume: ValueRange::new(50.0, 500.0),
                avg_order_value: ValueRange::at_least(100.0),
                profit_margin: ValueRange::new(0.3, 1.0),
                characteristics: strings(&["brand loyalty", "quality focus", "premium positioning"]),
                description: "premium, brand-focused".to_string(),
                actions: strings(&[
                    "Invest in brand storytelling and content",
                    "Enhance customer service experience",
                    "Build exclusive customer communities",
                ]),
                confidence_multiplier: 0.95,
                baseline: baseline(8, 0.04, 180.0, 0.5, 3.5, 450.0),
            },
        );
        archetypes.insert(
            "mid_market".to_string(),
            ArchetypeProfile {
                order_volume: ValueRange::new(200.0, 1000.0),
                avg_order_value: ValueRange::new(50.0, 150.0),
                profit_margin: ValueRange::new(0.15, 0.35),
                characteristics: strings(&["balanced approach", "growth focused", "optimization oriented"]),
                description: "balanced growth-oriented".to_string(),
                actions: strings(&[
                    "Balance growth investments across channels",
                    "Implement comprehensive testing programs",
                    "Focus on customer acquisition cost optimization",
                ]),
                confidence_multiplier: 1.0,
                baseline: baseline(25, 0.03, 85.0, 0.35, 3.0, 280.0),
            },
        );
        archetypes.insert(
            "niche_specialist".to_string(),
            ArchetypeProfile {
                order_volume: ValueRange::new(10.0, 200.0),
                avg_order_value: ValueRange::new(75.0, 300.0),
                profit_margin: ValueRange::new(0.25, 0.6),
                characteristics: strings(&["specialized products", "expert positioning", "loyal customer base"]),
                description: "specialized, expertise-driven".to_string(),
                actions: strings(&[
                    "Leverage expertise for content marketing",
                    "Build strategic partnerships in your niche",
                    "Develop customer education programs",
                ]),
                confidence_multiplier: 0.85,
                baseline: baseline(12, 0.045, 150.0, 0.45, 3.8, 380.0),
            },
        );

        let grade = |excellent, good, average| BenchmarkGrades {
            excellent,
            good,
            average,
        };
        let mut grades = BTreeMap::new();
        grades.insert("conversion_rate".to_string(), grade(0.05, 0.03, 0.02));
        grades.insert("customer_retention".to_string(), grade(0.6, 0.4, 0.25));
        grades.insert("lifetime_value".to_string(), grade(500.0, 300.0, 200.0));
        grades.insert("roas".to_string(), grade(4.0, 3.0, 2.5));

        Self {
            archetypes,
            fallback: "mid_market".to_string(),
            grades,
        }
    }
}
