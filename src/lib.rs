mod batch;
mod batch_function;
mod cache;
mod config;
mod error;
mod loader;
mod stats;
mod thunk;

pub use batch_function::{BatchFunction, BatchOutput};
pub use config::{LoaderConfig, DEFAULT_WAIT};
pub use error::{format_errors, BatchError, ErrorFormatter, LoadError, LoadResult};
pub use loader::Loader;
pub use stats::LoaderStats;
pub use thunk::Thunk;
