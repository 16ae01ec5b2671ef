//! Parsed-file records consumed from the parser collaborator.

pub mod types;

pub use types::ParseResult;
