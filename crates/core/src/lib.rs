//! Core library: share model, media classification, content identity and
//! the scan/index engine over the shared catalog.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod keys;
pub mod model;
pub mod scanner;
pub mod share;

pub use catalog::Catalog;
pub use model::{MediaKind, MediaRecord};
pub use scanner::{ScanOutcome, Scanner};
pub use share::{ShareConfig, ShareKind};
