pub mod collaborators;
pub mod config;
pub mod date_window;
pub mod error;
pub mod leaderboard;
pub mod metadata;
pub mod pipeline;
pub mod query;
pub mod sheets;
pub mod tables;

#[cfg(feature = "runtime")]
pub mod http;
#[cfg(feature = "runtime")]
pub mod warehouse;

pub use error::{PipelineError, Result};
