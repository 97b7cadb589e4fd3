pub mod algorithms;
pub mod anomaly;
pub mod forecast;
pub mod outcome;
pub mod pipeline;
pub mod render;
pub mod synthetic;

pub use anomaly::{
    run_anomaly_detection, split_sequences, AnomalyEngine, AnomalyReport, AnomalyRequest, SplitMode, SplitPlan,
};
pub use forecast::{run_forecasting, ForecastEngine, ForecastPoint, ForecastReport, ForecastRequest};
pub use outcome::{AnomalyOutcome, Figure, ForecastOutcome, PipelineFailure};
pub use render::Renderer;
pub use synthetic::{generate_synthetic_data, SyntheticDataGenerator, SyntheticTask};
