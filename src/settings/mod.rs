//! The deployment settings artifact: generation from a graph, the on-disk
//! wire format, and safe reconciliation with an existing file.

pub mod diff;
pub mod document;
pub mod generator;
pub mod reconciler;

pub use diff::*;
pub use document::*;
pub use generator::*;
pub use reconciler::*;
