//! Application services layer.

pub mod catalog;
pub mod error;
pub mod format;
pub mod metadata;
