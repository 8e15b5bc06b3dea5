//! Export functionality: JSON documents and printable reports.

mod json;
mod report;

pub use json::*;
pub use report::*;
