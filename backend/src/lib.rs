//! Book catalogue backend core.
//!
//! Every catalogue write runs through a command pipeline that traces,
//! deduplicates and commits it, publishing domain events only once the
//! transaction is durable.

pub mod app;
pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use app::Bookshelf;
pub use domain::TraceId;
