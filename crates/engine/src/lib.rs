//! Multi-touch attribution: windowing, model weighting, exact minor-unit
//! allocation and the batch reports built on them.

pub mod aggregator;
pub mod allocation;
pub mod batch;
pub mod comparison;
pub mod engine;
pub mod journey;
pub mod models;
pub mod report;
pub mod window;

pub use aggregator::{ChannelCredit, TouchpointCredit};
pub use batch::{BatchRunner, BreakdownTally, ChannelTally, ConversionFailure};
pub use comparison::ModelComparison;
pub use engine::{AttributionEngine, AttributionResult};
pub use journey::{analyze_journey, JourneyAnalysis, JourneyOutcome};
pub use models::{CreditWeights, TouchPosition};
pub use report::{ChannelReport, ChannelReportRow};
