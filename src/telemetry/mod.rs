//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{
    record_email, record_login_attempt, record_workflow_transition, EmailOutcome, LoginOutcome,
    MetricsState,
};
pub use tracing::init_telemetry;
