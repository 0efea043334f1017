//! SFTP (SSH File Transfer Protocol) client engine, protocol version 3.
//!
//! The engine multiplexes many outstanding operations over a single
//! transport: a child `ssh` process running the server's SFTP subsystem on
//! its stdin/stdout. Encryption and authentication belong to that child;
//! this module owns framing, request-ID correlation, and pipelining.
//!
//! # Architecture
//!
//! 1. Spawn `ssh -s <host> sftp` and exchange INIT/VERSION
//! 2. Start one receive task routing replies to waiters by request ID
//! 3. Callers issue requests concurrently; writes are serialized per frame
//! 4. Bulk transfer keeps a bounded window of reads in flight
//!
//! # Protocol Flow
//!
//! ```text
//! Client                          Server (ssh subsystem)
//!   |                               |
//!   |-- SSH_FXP_INIT -------------->|
//!   |<- SSH_FXP_VERSION ------------|
//!   |                               |
//!   |-- SSH_FXP_REALPATH "" ------->|
//!   |<- SSH_FXP_NAME (home) --------|
//!   |                               |
//!   |-- SSH_FXP_OPEN -------------->|
//!   |<- SSH_FXP_HANDLE -------------|
//!   |                               |
//!   |-- SSH_FXP_READ (id=1) ------->|
//!   |-- SSH_FXP_READ (id=2) ------->|   reads pipelined;
//!   |<- SSH_FXP_DATA (id=2) --------|   replies in any order
//!   |<- SSH_FXP_DATA (id=1) --------|
//!   |<- SSH_FXP_STATUS (EOF) -------|
//!   |                               |
//!   |-- SSH_FXP_CLOSE ------------->|
//!   |<- SSH_FXP_STATUS -------------|
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sftpdiff_proto::sftp::{ConnectionPool, OpenFlags, ReadPump};
//!
//! # async fn example() -> sftpdiff_platform::SftpdiffResult<()> {
//! let pool = ConnectionPool::new();
//! let conn = pool.get("server").await?;
//!
//! let handle = conn.open("big.log", OpenFlags::READ).await?;
//! let pump = ReadPump::new(conn.clone());
//! let mut out = Vec::new();
//! let bytes = pump.run(handle, &mut out).await?;
//! println!("streamed {} bytes", bytes);
//!
//! pool.disconnect_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [SFTP Draft v3](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02) - Most common version

pub mod client;
pub mod message;
pub mod pool;
pub mod pump;
mod registry;
pub mod transport;
pub mod types;

pub use client::{PendingReply, SftpClient};
pub use message::{MessageType, PacketBuilder, PacketReader, SFTP_VERSION};
pub use pool::ConnectionPool;
pub use pump::{PumpConfig, ReadPump};
pub use transport::SftpTransport;
pub use types::{AttrFlags, FileAttributes, NameEntry, OpenFlags, StatusCode};
