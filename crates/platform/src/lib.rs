//! # sftpdiff Platform
//!
//! Core platform types shared by the sftpdiff crates.
//!
//! This crate provides:
//! - Unified error types (`SftpdiffError`, `SftpdiffResult`)
//!
//! # Examples
//!
//! ```
//! use sftpdiff_platform::{SftpdiffError, SftpdiffResult};
//!
//! fn example_function() -> SftpdiffResult<String> {
//!     Ok("Hello, sftpdiff!".to_string())
//! }
//!
//! # fn main() -> SftpdiffResult<()> {
//! let result = example_function()?;
//! assert_eq!(result, "Hello, sftpdiff!");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{SftpdiffError, SftpdiffResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
