//! Metric helpers shared by the supervisor crates.
//!
//! The macros expand to calls into the `metrics` crate, so callers must depend on it.

mod macros;

mod reporter;
pub use reporter::MetricsReporter;
