//! Improvement opportunities and their ranking.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Feasibility weight: easy=3, medium=2, hard=1.
    pub fn weight(&self) -> f64 {
        match self {
            Difficulty::Easy => 3.0,
            Difficulty::Medium => 2.0,
            Difficulty::Hard => 1.0,
        }
    }

    /// Difficulty implied by the relative size of an improvement.
    pub fn from_impact(impact: f64) -> Self {
        if impact > 0.5 {
            Difficulty::Hard
        } else if impact > 0.25 {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        }
    }

    pub fn timeline(&self) -> &'static str {
        match self {
            Difficulty::Easy => "2-6 weeks",
            Difficulty::Medium => "1-3 months",
            Difficulty::Hard => "3-6 months",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub name: String,
    pub metric: String,
    pub impact: f64,
    pub difficulty: Difficulty,
    pub timeline: String,
    pub description: String,
}

impl Opportunity {
    pub fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        impact: f64,
        difficulty: Difficulty,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            impact,
            difficulty,
            timeline: difficulty.timeline().to_string(),
            description: description.into(),
        }
    }

    pub fn feasibility(&self) -> f64 {
        self.impact * self.difficulty.weight()
    }
}

/// Sorts `opportunities` by impact (descending) and returns the one with the
/// best impact × feasibility weight as the headline. Ties on feasibility keep
/// the higher-impact entry.
pub fn rank_opportunities(mut opportunities: Vec<Opportunity>) -> (Option<Opportunity>, Vec<Opportunity>) {
    opportunities.sort_by(|a, b| b.impact.total_cmp(&a.impact));

    let top = opportunities
        .iter()
        .fold(None::<&Opportunity>, |best, candidate| match best {
            Some(current) if current.feasibility() >= candidate.feasibility() => Some(current),
            _ => Some(candidate),
        })
        .cloned();

    (top, opportunities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_bands() {
        assert_eq!(Difficulty::from_impact(0.8), Difficulty::Hard);
        assert_eq!(Difficulty::from_impact(0.3), Difficulty::Medium);
        assert_eq!(Difficulty::from_impact(0.25), Difficulty::Easy);
        assert_eq!(Difficulty::Hard.timeline(), "3-6 months");
    }

    #[test]
    fn test_top_uses_feasibility_but_list_uses_impact() {
        let opportunities = vec![
            Opportunity::new("Easy win", "roas", 0.2, Difficulty::Easy, ""),
            Opportunity::new("Big lift", "aov", 0.55, Difficulty::Hard, ""),
            Opportunity::new("Middle", "conversion_rate", 0.27, Difficulty::Medium, ""),
        ];

        let (top, ranked) = rank_opportunities(opportunities);

        // 0.2*3 = 0.6 beats 0.27*2 = 0.54 and 0.55*1
        assert_eq!(top.unwrap().name, "Easy win");
        let names: Vec<_> = ranked.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Big lift", "Middle", "Easy win"]);
    }

    #[test]
    fn test_empty_list_has_no_top() {
        let (top, ranked) = rank_opportunities(Vec::new());
        assert!(top.is_none());
        assert!(ranked.is_empty());
    }
}
