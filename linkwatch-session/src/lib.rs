//! Link session runtime: watcher + change queue + debounce + build events,
//! coordinated by one tokio loop.

pub mod debounce;
mod error;
pub mod queue;
pub mod report;
mod session;
pub mod watcher;

pub use error::SessionError;
pub use session::{
    init_tracing, perform_initial_link, run_until_interrupted, start_blocking, LinkOutcome,
    SessionOptions, WatchSession,
};
