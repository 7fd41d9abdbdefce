//! Transient input records.
//!
//! Historical series arrive as loosely-typed JSON rows ([`RawRecord`]) and are
//! normalized into [`HistoricalRecord`] by the data processor before any
//! feature is extracted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of an incoming historical series, before normalization.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A normalized daily performance row. Numeric fields are never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub orders: f64,
    #[serde(default)]
    pub impressions: f64,
    #[serde(default)]
    pub clicks: f64,
    #[serde(default)]
    pub ctr: f64,
    #[serde(default)]
    pub cpm: f64,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub engagement_rate: Option<f64>,
    #[serde(default)]
    pub units_sold: f64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub platform: Option<String>,
}

impl HistoricalRecord {
    /// An all-zero row for `date`, used when backfilling calendar gaps.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            spend: 0.0,
            revenue: 0.0,
            orders: 0.0,
            impressions: 0.0,
            clicks: 0.0,
            ctr: 0.0,
            cpm: 0.0,
            frequency: None,
            engagement_rate: None,
            units_sold: 0.0,
            amount: 0.0,
            platform: None,
        }
    }

    /// Revenue per unit of spend; 0 when nothing was spent.
    pub fn roas(&self) -> f64 {
        if self.spend > 0.0 {
            self.revenue / self.spend
        } else {
            0.0
        }
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Spend => self.spend,
            Metric::Revenue => self.revenue,
            Metric::Orders => self.orders,
            Metric::Impressions => self.impressions,
            Metric::Clicks => self.clicks,
            Metric::Ctr => self.ctr,
            Metric::Cpm => self.cpm,
            Metric::Roas => self.roas(),
            Metric::UnitsSold => self.units_sold,
            Metric::Amount => self.amount,
        }
    }
}

/// Numeric columns of a [`HistoricalRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Spend,
    Revenue,
    Orders,
    Impressions,
    Clicks,
    Ctr,
    Cpm,
    Roas,
    UnitsSold,
    Amount,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::Spend,
        Metric::Revenue,
        Metric::Orders,
        Metric::Impressions,
        Metric::Clicks,
        Metric::Ctr,
        Metric::Cpm,
        Metric::Roas,
        Metric::UnitsSold,
        Metric::Amount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Spend => "spend",
            Metric::Revenue => "revenue",
            Metric::Orders => "orders",
            Metric::Impressions => "impressions",
            Metric::Clicks => "clicks",
            Metric::Ctr => "ctr",
            Metric::Cpm => "cpm",
            Metric::Roas => "roas",
            Metric::UnitsSold => "units_sold",
            Metric::Amount => "amount",
        }
    }

    /// Volume metrics are summed when resampling, rate metrics are averaged.
    pub fn is_volume(&self) -> bool {
        !matches!(self, Metric::Ctr | Metric::Cpm | Metric::Roas)
    }
}

/// Validated merchant-level aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantSnapshot {
    pub merchant_id: String,
    pub revenue: f64,
    pub orders: f64,
    pub spend: f64,
    pub conversion_rate: f64,
    pub avg_order_value: f64,
    pub calculated_aov: f64,
    pub roas: f64,
}
