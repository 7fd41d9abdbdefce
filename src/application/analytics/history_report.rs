//! One-shot summary of a merchant's raw history: cleaning, resampling,
//! anomaly counts and the confidence breakdown the data would support.

use crate::application::analytics::confidence_calculator::{ConfidenceCalculator, ConfidenceWeights};
use crate::application::analytics::data_processor::{
    DEFAULT_ANOMALY_THRESHOLD, DEFAULT_GROWTH_PERIODS, DEFAULT_MA_WINDOWS, DataProcessor, DerivedMetrics,
    Period, PeriodAggregate, TimeFeatures,
};
use crate::application::analytics::statistics::coefficient_of_variation;
use crate::domain::records::{Metric, RawRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const REPORT_METRICS: [Metric; 4] = [Metric::Revenue, Metric::Spend, Metric::Orders, Metric::Roas];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryRequest {
    /// Current merchant aggregates (revenue, orders, spend, ...).
    #[serde(default)]
    pub merchant: RawRecord,
    #[serde(default)]
    pub history: Vec<RawRecord>,
    /// Resampling period (`D`, `W`, `M`, `Q`, `Y`); weekly when absent.
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceBreakdown {
    pub data_quality: f64,
    pub historical: f64,
    pub model: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReport {
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Calendar days with no row between the first and last date.
    pub missing_days: usize,
    pub period: Period,
    pub aggregates: Vec<PeriodAggregate>,
    /// Last value of every moving-average and growth column.
    pub latest: BTreeMap<String, f64>,
    pub anomalies: BTreeMap<Metric, usize>,
    pub latest_derived: Option<DerivedMetrics>,
    pub latest_calendar: Option<TimeFeatures>,
    pub merchant_features: Vec<f64>,
    pub confidence: ConfidenceBreakdown,
}

impl HistoryReport {
    pub fn build(merchant: &RawRecord, history: &[RawRecord], period: Period, today: NaiveDate) -> Self {
        let records = DataProcessor::normalize_history(history);
        let filled = DataProcessor::fill_missing_dates(&records, None, None);

        let mut latest = BTreeMap::new();
        let columns = DataProcessor::moving_averages(&filled, &REPORT_METRICS, &DEFAULT_MA_WINDOWS)
            .into_iter()
            .chain(DataProcessor::growth_rates(&filled, &REPORT_METRICS, &DEFAULT_GROWTH_PERIODS));
        for (name, values) in columns {
            if let Some(last) = values.last() {
                latest.insert(name, *last);
            }
        }

        let anomalies = DataProcessor::detect_anomalies(&records, &REPORT_METRICS, DEFAULT_ANOMALY_THRESHOLD)
            .into_iter()
            .map(|(metric, flags)| (metric, flags.iter().filter(|flag| flag.is_anomaly).count()))
            .collect();

        let calculator = ConfidenceCalculator::default();
        let revenue = DataProcessor::series(&records, Metric::Revenue);
        let data_quality = calculator.data_quality(merchant);
        let historical = calculator.historical(history, today);
        let model = calculator.model(coefficient_of_variation(&revenue).unwrap_or(1.0), None);

        Self {
            rows: records.len(),
            first_date: records.first().map(|r| r.date),
            last_date: records.last().map(|r| r.date),
            missing_days: filled.len().saturating_sub(records.len()),
            period,
            aggregates: DataProcessor::aggregate_by_period(&records, period),
            latest,
            anomalies,
            latest_derived: records.last().map(DataProcessor::derived_metrics),
            latest_calendar: records.last().map(|r| DataProcessor::time_features(r.date)),
            merchant_features: DataProcessor::create_feature_matrix(merchant, history),
            confidence: ConfidenceBreakdown {
                data_quality,
                historical,
                model,
                overall: calculator.overall(data_quality, historical, model, ConfidenceWeights::default()),
            },
        }
    }

    pub fn from_request(request: &HistoryRequest, today: NaiveDate) -> Result<Self, String> {
        let period = match &request.period {
            Some(period) => period.parse()?,
            None => Period::Week,
        };
        Ok(Self::build(&request.merchant, &request.history, period, today))
    }
}
