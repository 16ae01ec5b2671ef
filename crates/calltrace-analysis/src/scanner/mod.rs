//! File-diff records consumed from the scanner collaborator.

pub mod language_detect;
pub mod types;

pub use language_detect::Language;
pub use types::ScanDiff;
