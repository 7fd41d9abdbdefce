//! Stateless cleaning and derivation over historical series.
//!
//! Every operation is total: empty input yields an empty (or pass-through)
//! result, never an error. The only fallible entry point is CSV import, whose
//! errors are I/O or format errors rather than data errors.

use crate::application::analytics::statistics::{mean, sample_std, tail};
use crate::domain::records::{HistoricalRecord, Metric, RawRecord};
use crate::domain::validation::{MerchantDataValidator, coerce_number, non_negative_field};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, warn};

pub const DEFAULT_MA_WINDOWS: [usize; 3] = [7, 14, 30];
pub const DEFAULT_GROWTH_PERIODS: [usize; 3] = [1, 7, 30];
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;
pub const MERCHANT_FEATURE_COUNT: usize = 11;

/// Resampling granularity. Buckets are labelled by their first calendar day
/// (weeks start on Monday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => date,
            Period::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Period::Month => date.with_day(1).unwrap_or(date),
            Period::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            Period::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "D" | "DAY" => Ok(Period::Day),
            "W" | "WEEK" => Ok(Period::Week),
            "M" | "MONTH" => Ok(Period::Month),
            "Q" | "QUARTER" => Ok(Period::Quarter),
            "Y" | "YEAR" => Ok(Period::Year),
            other => Err(format!("Unknown period '{}'", other)),
        }
    }
}

/// One resampled bucket: volume metrics summed, rate metrics averaged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodAggregate {
    pub period_start: NaiveDate,
    pub rows: usize,
    pub spend: f64,
    pub revenue: f64,
    pub orders: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub units_sold: f64,
    pub ctr: f64,
    pub cpm: f64,
    pub roas: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyFlag {
    /// `None` when the series has no spread.
    pub zscore: Option<f64>,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeFeatures {
    pub year: i32,
    pub month: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub day_of_month: u32,
    pub quarter: u32,
    pub is_weekend: bool,
    pub is_month_end: bool,
    pub is_quarter_end: bool,
    pub season: Season,
}

/// Per-row ratios. CTR and CPC divide by 1 when the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub calculated_ctr: f64,
    pub calculated_cpc: f64,
    pub roas: f64,
}

pub struct DataProcessor;

impl DataProcessor {
    /// Parses the date formats accepted in historical rows.
    pub fn parse_date(value: &Value) -> Option<NaiveDate> {
        let text = value.as_str()?.trim();
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Some(datetime.date_naive());
        }
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(|datetime| datetime.date())
    }

    /// Normalizes raw rows into a date-sorted series. Rows without a parseable
    /// date are dropped; numeric fields are coerced, clamped to ≥ 0 and
    /// zero-filled. CTR and CPM are derived from clicks/impressions/spend when
    /// not reported.
    pub fn normalize_history(raw: &[RawRecord]) -> Vec<HistoricalRecord> {
        let mut dropped = 0usize;
        let mut records: Vec<HistoricalRecord> = raw
            .iter()
            .filter_map(|row| {
                let parsed = row.get("date").and_then(Self::parse_date);
                if parsed.is_none() {
                    dropped += 1;
                }
                parsed.map(|date| Self::normalize_row(date, row))
            })
            .collect();

        if dropped > 0 {
            debug!("DataProcessor: dropped {} rows without a parseable date", dropped);
        }

        records.sort_by_key(|r| r.date);
        records
    }

    fn normalize_row(date: NaiveDate, row: &RawRecord) -> HistoricalRecord {
        let field = |name: &str| non_negative_field(row, name).unwrap_or(0.0);

        let spend = field("spend");
        let impressions = field("impressions");
        let clicks = field("clicks");

        let ctr = non_negative_field(row, "ctr").unwrap_or(if impressions > 0.0 {
            clicks / impressions
        } else {
            0.0
        });
        let cpm = non_negative_field(row, "cpm").unwrap_or(if impressions > 0.0 {
            spend / impressions * 1000.0
        } else {
            0.0
        });

        HistoricalRecord {
            date,
            spend,
            revenue: field("revenue"),
            orders: field("orders"),
            impressions,
            clicks,
            ctr,
            cpm,
            frequency: non_negative_field(row, "frequency"),
            engagement_rate: non_negative_field(row, "engagement_rate"),
            units_sold: field("units_sold"),
            amount: field("amount"),
            platform: row
                .get("platform")
                .and_then(Value::as_str)
                .map(|p| p.trim().to_lowercase()),
        }
    }

    pub fn series(records: &[HistoricalRecord], metric: Metric) -> Vec<f64> {
        records.iter().map(|r| r.metric(metric)).collect()
    }

    pub fn derived_metrics(record: &HistoricalRecord) -> DerivedMetrics {
        let non_zero = |v: f64| if v == 0.0 { 1.0 } else { v };
        DerivedMetrics {
            calculated_ctr: record.clicks / non_zero(record.impressions),
            calculated_cpc: record.spend / non_zero(record.clicks),
            roas: record.roas(),
        }
    }

    /// Trailing mean over `window` points with `min_periods = 1`.
    pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
        let window = window.max(1);
        (0..values.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(window);
                mean(&values[start..=i])
            })
            .collect()
    }

    /// Moving averages keyed `"<metric>_ma<window>"`.
    pub fn moving_averages(
        records: &[HistoricalRecord],
        metrics: &[Metric],
        windows: &[usize],
    ) -> BTreeMap<String, Vec<f64>> {
        let mut columns = BTreeMap::new();
        if records.is_empty() {
            return columns;
        }
        for metric in metrics {
            let values = Self::series(records, *metric);
            for window in windows {
                columns.insert(
                    format!("{}_ma{}", metric.name(), window),
                    Self::rolling_mean(&values, *window),
                );
            }
        }
        columns
    }

    /// Percentage change against the value `period` rows earlier. The first
    /// `period` rows and zero denominators yield 0 (no growth).
    pub fn percent_change(values: &[f64], period: usize) -> Vec<f64> {
        (0..values.len())
            .map(|i| {
                if period == 0 || i < period {
                    return 0.0;
                }
                let previous = values[i - period];
                if previous == 0.0 {
                    0.0
                } else {
                    (values[i] - previous) / previous * 100.0
                }
            })
            .collect()
    }

    /// Growth columns keyed `"<metric>_growth_<period>d"`.
    pub fn growth_rates(
        records: &[HistoricalRecord],
        metrics: &[Metric],
        periods: &[usize],
    ) -> BTreeMap<String, Vec<f64>> {
        let mut columns = BTreeMap::new();
        for metric in metrics {
            let values = Self::series(records, *metric);
            for period in periods {
                columns.insert(
                    format!("{}_growth_{}d", metric.name(), period),
                    Self::percent_change(&values, *period),
                );
            }
        }
        columns
    }

    /// Z-score anomaly flags against the series' own mean and sample std.
    pub fn zscore_anomalies(values: &[f64], threshold: f64) -> Vec<AnomalyFlag> {
        let avg = mean(values);
        let std = sample_std(values);

        values
            .iter()
            .map(|value| {
                if std > 0.0 {
                    let z = (value - avg) / std;
                    AnomalyFlag {
                        zscore: Some(z),
                        is_anomaly: z.abs() > threshold,
                    }
                } else {
                    AnomalyFlag {
                        zscore: None,
                        is_anomaly: false,
                    }
                }
            })
            .collect()
    }

    pub fn detect_anomalies(
        records: &[HistoricalRecord],
        metrics: &[Metric],
        threshold: f64,
    ) -> BTreeMap<Metric, Vec<AnomalyFlag>> {
        metrics
            .iter()
            .map(|metric| {
                let values = Self::series(records, *metric);
                (*metric, Self::zscore_anomalies(&values, threshold))
            })
            .collect()
    }

    /// Resamples a daily series into `period` buckets (only buckets that
    /// contain rows are returned).
    pub fn aggregate_by_period(records: &[HistoricalRecord], period: Period) -> Vec<PeriodAggregate> {
        let mut buckets: BTreeMap<NaiveDate, Vec<&HistoricalRecord>> = BTreeMap::new();
        for record in records {
            buckets
                .entry(period.bucket_start(record.date))
                .or_default()
                .push(record);
        }

        buckets
            .into_iter()
            .map(|(period_start, rows)| {
                let sum = |metric: Metric| rows.iter().map(|r| r.metric(metric)).sum::<f64>();
                let avg = |metric: Metric| {
                    let values: Vec<f64> = rows.iter().map(|r| r.metric(metric)).collect();
                    mean(&values)
                };
                PeriodAggregate {
                    period_start,
                    rows: rows.len(),
                    spend: sum(Metric::Spend),
                    revenue: sum(Metric::Revenue),
                    orders: sum(Metric::Orders),
                    impressions: sum(Metric::Impressions),
                    clicks: sum(Metric::Clicks),
                    units_sold: sum(Metric::UnitsSold),
                    ctr: avg(Metric::Ctr),
                    cpm: avg(Metric::Cpm),
                    roas: avg(Metric::Roas),
                }
            })
            .collect()
    }

    /// Inserts zero rows for every calendar day in `[start, end]` that has no
    /// data. Bounds default to the series' own first and last dates.
    pub fn fill_missing_dates(
        records: &[HistoricalRecord],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Vec<HistoricalRecord> {
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Vec::new();
        };
        let start = start.unwrap_or(first.date);
        let end = end.unwrap_or(last.date);
        if start > end {
            return records.to_vec();
        }

        let mut by_date: BTreeMap<NaiveDate, Vec<HistoricalRecord>> = BTreeMap::new();
        for record in records {
            by_date.entry(record.date).or_default().push(record.clone());
        }

        let mut filled = Vec::new();
        let mut day = start;
        while day <= end {
            match by_date.remove(&day) {
                Some(rows) => filled.extend(rows),
                None => filled.push(HistoricalRecord::empty(day)),
            }
            day += Duration::days(1);
        }
        filled
    }

    pub fn time_features(date: NaiveDate) -> TimeFeatures {
        let month = date.month();
        let day_of_month = date.day();
        let day_of_week = date.weekday().num_days_from_monday();
        let season = match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        };

        TimeFeatures {
            year: date.year(),
            month,
            day_of_week,
            day_of_month,
            quarter: (month - 1) / 3 + 1,
            is_weekend: day_of_week >= 5,
            is_month_end: day_of_month >= 28,
            is_quarter_end: month % 3 == 0 && day_of_month >= 28,
            season,
        }
    }

    /// Merchant-level feature row: six validated aggregates followed by five
    /// recent-history statistics (zeros when no history survives cleaning).
    pub fn create_feature_matrix(merchant: &RawRecord, history: &[RawRecord]) -> Vec<f64> {
        let snapshot = MerchantDataValidator::validate(merchant);
        let mut features = vec![
            snapshot.revenue,
            snapshot.orders,
            snapshot.spend,
            snapshot.roas,
            snapshot.conversion_rate,
            snapshot.avg_order_value,
        ];

        let records = Self::normalize_history(history);
        if records.is_empty() {
            features.extend([0.0; 5]);
        } else {
            let revenue = Self::series(&records, Metric::Revenue);
            let spend = Self::series(&records, Metric::Spend);
            let roas = Self::series(&records, Metric::Roas);
            features.extend([
                mean(tail(&revenue, 7)),
                mean(tail(&spend, 7)),
                mean(tail(&roas, 7)),
                sample_std(tail(&revenue, 7)),
                records.len() as f64,
            ]);
        }

        features
    }

    /// Reads a CSV export (header row required) into a normalized series.
    pub fn read_history_csv<R: Read>(reader: R) -> anyhow::Result<Vec<HistoricalRecord>> {
        let rows = Self::read_csv_rows(reader)?;
        Ok(Self::normalize_history(&rows))
    }

    /// Reads a CSV export into raw rows. Empty cells are dropped so they read
    /// as missing rather than as invalid numbers.
    pub fn read_csv_rows<R: Read>(reader: R) -> anyhow::Result<Vec<RawRecord>> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let mut rows = Vec::new();
        for (line, result) in csv_reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed CSV row {}: {}", line + 2, e);
                    continue;
                }
            };
            let row: RawRecord = headers
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.trim().is_empty())
                .map(|(name, value)| (name.trim().to_string(), Value::String(value.to_string())))
                .collect();
            rows.push(row);
        }

        Ok(rows)
    }

    /// Reads a numeric field from a raw row, keeping sign (for signals that
    /// can legitimately be negative, e.g. market changes).
    pub fn signed_field(row: &RawRecord, field: &str) -> Option<f64> {
        row.get(field).and_then(coerce_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(rows: Value) -> Vec<RawRecord> {
        rows.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_normalize_drops_bad_dates_and_sorts() {
        let records = DataProcessor::normalize_history(&raw(json!([
            {"date": "2024-03-03", "revenue": 30},
            {"date": "not a date", "revenue": 99},
            {"date": "2024-03-01T10:00:00Z", "revenue": "10"},
            {"revenue": 5},
            {"date": "2024-03-02 08:15:00", "revenue": -4},
        ])));

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date, day("2024-03-01"));
        assert_eq!(records[0].revenue, 10.0);
        assert_eq!(records[1].revenue, 0.0);
        assert_eq!(records[2].revenue, 30.0);
    }

    #[test]
    fn test_normalize_derives_ctr_and_cpm() {
        let records = DataProcessor::normalize_history(&raw(json!([
            {"date": "2024-03-01", "impressions": 2000, "clicks": 40, "spend": 10},
        ])));
        assert!((records[0].ctr - 0.02).abs() < 1e-12);
        assert!((records[0].cpm - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs_are_pass_through() {
        assert!(DataProcessor::normalize_history(&[]).is_empty());
        assert!(DataProcessor::moving_averages(&[], &[Metric::Revenue], &DEFAULT_MA_WINDOWS).is_empty());
        assert!(DataProcessor::fill_missing_dates(&[], None, None).is_empty());
        assert!(DataProcessor::aggregate_by_period(&[], Period::Week).is_empty());
        assert!(DataProcessor::zscore_anomalies(&[], 2.0).is_empty());
    }

    #[test]
    fn test_rolling_mean_uses_min_periods_one() {
        let rolled = DataProcessor::rolling_mean(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(rolled, vec![2.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_percent_change_guards_zero() {
        let growth = DataProcessor::percent_change(&[0.0, 10.0, 15.0], 1);
        assert_eq!(growth, vec![0.0, 0.0, 50.0]);
    }

    #[test]
    fn test_zero_variance_has_no_anomalies() {
        let flags = DataProcessor::zscore_anomalies(&[5.0, 5.0, 5.0, 5.0], 2.0);
        assert!(flags.iter().all(|f| !f.is_anomaly && f.zscore.is_none()));
    }

    #[test]
    fn test_spike_is_flagged() {
        let mut values = vec![10.0; 20];
        values.push(100.0);
        let flags = DataProcessor::zscore_anomalies(&values, DEFAULT_ANOMALY_THRESHOLD);
        assert!(flags[20].is_anomaly);
        assert!(!flags[0].is_anomaly);
    }

    #[test]
    fn test_weekly_aggregation_sums_volume_and_averages_rates() {
        let records = DataProcessor::normalize_history(&raw(json!([
            {"date": "2024-03-04", "spend": 100, "revenue": 300, "ctr": 0.02},
            {"date": "2024-03-06", "spend": 50, "revenue": 100, "ctr": 0.04},
            {"date": "2024-03-11", "spend": 10, "revenue": 10, "ctr": 0.01},
        ])));
        let weeks = DataProcessor::aggregate_by_period(&records, Period::Week);

        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].period_start, day("2024-03-04"));
        assert_eq!(weeks[0].spend, 150.0);
        assert_eq!(weeks[0].revenue, 400.0);
        assert!((weeks[0].ctr - 0.03).abs() < 1e-12);
        assert!((weeks[0].roas - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_fill_missing_dates_inserts_zero_rows() {
        let records = DataProcessor::normalize_history(&raw(json!([
            {"date": "2024-03-01", "revenue": 10},
            {"date": "2024-03-04", "revenue": 40},
        ])));
        let filled = DataProcessor::fill_missing_dates(&records, None, None);
        assert_eq!(filled.len(), 4);
        assert_eq!(filled[1].date, day("2024-03-02"));
        assert_eq!(filled[1].revenue, 0.0);
        assert_eq!(filled[3].revenue, 40.0);
    }

    #[test]
    fn test_time_features() {
        let features = DataProcessor::time_features(day("2024-03-30"));
        assert_eq!(features.quarter, 1);
        assert_eq!(features.day_of_week, 5);
        assert!(features.is_weekend);
        assert!(features.is_month_end);
        assert!(features.is_quarter_end);
        assert_eq!(features.season, Season::Spring);
    }

    #[test]
    fn test_feature_matrix_has_fixed_length() {
        let merchant = json!({"revenue": 1000, "orders": 20, "spend": 250})
            .as_object()
            .cloned()
            .unwrap();
        let without_history = DataProcessor::create_feature_matrix(&merchant, &[]);
        assert_eq!(without_history.len(), MERCHANT_FEATURE_COUNT);
        assert_eq!(without_history[3], 4.0);

        let history = raw(json!([
            {"date": "2024-03-01", "revenue": 100, "spend": 50},
            {"date": "2024-03-02", "revenue": 200, "spend": 50},
        ]));
        let with_history = DataProcessor::create_feature_matrix(&merchant, &history);
        assert_eq!(with_history.len(), MERCHANT_FEATURE_COUNT);
        assert_eq!(with_history[6], 150.0);
        assert_eq!(with_history[10], 2.0);
    }

    #[test]
    fn test_read_history_csv() {
        let data = "date,spend,revenue\n2024-03-02,10,40\n2024-03-01,5,\nbad,1,1\n";
        let records = DataProcessor::read_history_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].spend, 5.0);
        assert_eq!(records[0].revenue, 0.0);
        assert_eq!(records[1].roas(), 4.0);
    }

    #[test]
    fn test_derived_metrics_guard_zero_denominators() {
        let record = HistoricalRecord {
            spend: 20.0,
            revenue: 50.0,
            ..HistoricalRecord::empty(day("2024-01-01"))
        };
        let derived = DataProcessor::derived_metrics(&record);
        assert_eq!(derived.calculated_ctr, 0.0);
        assert_eq!(derived.calculated_cpc, 20.0);
        assert_eq!(derived.roas, 2.5);
    }
}
