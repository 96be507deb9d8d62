//! Output generation for page reports.
//!
//! # Submodules
//!
//! - [`json`]: Serialises a [`crate::pagination::PageReport`] to stdout or a file
pub mod json;
