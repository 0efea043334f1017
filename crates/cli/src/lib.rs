//! Command-line front end for sftpdiff.
//!
//! Parses the option surface, streams remote inputs through the SFTP
//! engine, drives the external diff tool and rewrites its output so users
//! see the names they typed.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod compare;

pub use cli::Cli;
pub use compare::Comparison;
