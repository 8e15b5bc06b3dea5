//! Domain models for dental patient records.

mod chart;
mod collection;
pub(crate) mod lenient;
mod patient;
mod payment;

pub use chart::*;
pub use collection::*;
pub use patient::*;
pub use payment::*;
