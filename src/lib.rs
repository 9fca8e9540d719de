pub mod config;
pub mod engine;
pub mod render;
pub mod telemetry;
pub mod vr;

pub use config::ClientConfig;
pub use engine::{Engine, ExitReason, RunSummary, TickOutcome};
