//! Shared machinery for the historical import CLIs: query-window parsing,
//! paced CRM pagination with backoff, cooperative cancellation, and the
//! console summary.

pub mod fetch;
pub mod summary;
pub mod window;

pub use fetch::{cancellation_flag, cancelled, fetch_closed_leads, DB_PAUSE, DB_PAUSE_EVERY};
pub use summary::{ImportStats, RecordError, Tally};
pub use window::ImportWindow;
