pub mod config;
pub mod types;

pub use config::Config;
pub use types::{
    AttributionResult, AttributionSource, FunnelType, ProcessingStatus, RoutingDecision,
    UpsertOutcome, UtmSet,
};
