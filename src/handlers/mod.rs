pub mod action_handler;
pub mod audit_handler;
pub mod health;
pub mod metrics;
pub mod references_handler;
pub mod requests_handler;
pub mod shifts_handler;

pub use health::health_check;
pub use metrics::{metrics_handler, setup_metrics_recorder, MetricsState};
