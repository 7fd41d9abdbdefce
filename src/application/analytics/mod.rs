pub mod confidence_calculator;
pub mod data_processor;
pub mod history_report;
pub mod statistics;

pub use confidence_calculator::{ConfidenceCalculator, ConfidenceWeights};
pub use data_processor::{DataProcessor, Period};
pub use history_report::{HistoryReport, HistoryRequest};
