//! Preprocessing stages shared by the anomaly and forecasting engines.
//!
//! - [`prune`]: collapse consecutive duplicate alarms per machine
//! - [`sequences`]: sliding windows and forecasting pairs per machine
//! - [`series`]: daily alarm-count series for forecasting
//! - [`metrics`]: per-stage wall-clock timings of an engine run

pub mod metrics;
pub mod prune;
pub mod sequences;
pub mod series;

pub use metrics::{RunMetrics, StageTimer, StageTiming};
pub use prune::{prune_alarm_logs, PrunedLog};
pub use sequences::{build_all, create_sequences, ForecastPair, MachineSequences, WindowSpec};
pub use series::{daily_counts, DailySeries};
