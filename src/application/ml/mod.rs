pub mod forest;
pub mod predictor;
pub mod scaler;
pub mod state;
pub mod tiered;

pub use forest::{FitMetrics, ForestModel, ForestParams};
pub use predictor::{ForecastStrategy, PredictContext, TrainingSet};
pub use scaler::StandardScaler;
pub use state::PredictorState;
pub use tiered::TieredPredictor;
