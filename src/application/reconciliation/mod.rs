pub mod adaptive_delay;
pub mod comment_worker;
pub mod errors;
pub mod like_worker;
pub mod shutdown;
pub mod stats_service;

pub use adaptive_delay::AdaptiveDelay;
pub use comment_worker::{process_comment_batch, run_comment_worker};
pub use errors::{ReconciliationError, Result};
pub use like_worker::{process_like_batch, run_like_worker};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
pub use stats_service::*;
