pub mod channels;
pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::{AppConfig, AttributionConfig, BatchConfig};
pub use error::{AttributionError, CoreResult};
pub use source::{InMemoryTouchpointSource, TouchpointSource};
pub use types::{AttributionModel, DateRange, Touchpoint, DIRECT_CHANNEL, NO_CAMPAIGN};
