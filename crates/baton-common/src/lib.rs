//! Baton Common Library
//!
//! Shared utilities and error handling for the Baton workspace members:
//!
//! - **Error Handling**: Custom error and result types
//! - **Checksums**: Streaming file digest computation and verification
//! - **Logging**: Centralized tracing configuration
//!
//! # Example
//!
//! ```no_run
//! use baton_common::{Result, checksum};
//! use baton_common::checksum::ChecksumAlgorithm;
//!
//! fn digest_file(path: &str) -> Result<String> {
//!     checksum::compute_file_checksum(path, ChecksumAlgorithm::Md5, 65536)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
