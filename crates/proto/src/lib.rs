//! SFTP client engine for sftpdiff.
//!
//! This crate implements the protocol side of comparing files across
//! hosts: an SFTP version 3 client multiplexing pipelined operations over
//! a child `ssh` process, plus the connection pool and the read pump that
//! higher layers stream remote files through.
//!
//! # Example
//!
//! ```rust,no_run
//! use sftpdiff_proto::sftp::ConnectionPool;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ConnectionPool::new();
//! let conn = pool.get("server").await?;
//! let attrs = conn.stat("/etc/hosts").await?;
//! println!("size: {:?}", attrs.size);
//! pool.disconnect_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [SFTP Draft v3](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod sftp;
