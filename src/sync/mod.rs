// Cache refresh module.
// The fetch-and-persist pipeline and the policy deciding when it runs.

pub mod refresh;
pub mod scheduler;

pub use refresh::{RefreshPipeline, RefreshReport};
pub use scheduler::{BackgroundRefresh, DEFAULT_SHUTDOWN_GRACE, RefreshScheduler};
