//! Error types for sftpdiff

use std::fmt;

/// Unified error type for all sftpdiff operations
#[derive(Debug)]
pub enum SftpdiffError {
    /// I/O error
    Io(std::io::Error),

    /// Configuration or usage error
    Config(String),

    /// Spawning the transport child, or the protocol handshake, failed
    TransportSetup(String),

    /// The transport closed mid-frame
    UnexpectedEof,

    /// A write failed because the peer closed the transport
    TransportClosed,

    /// A reply body was shorter than its decoder required
    TruncatedReply,

    /// A reply type or shape outside the allowed set for the request
    ProtocolViolation(String),

    /// Server-reported SSH_FXP_STATUS with a non-zero code
    Sftp {
        /// SFTP v3 status code
        code: u32,
        /// Server-supplied error text
        message: String,
    },

    /// The connection was torn down while a caller was waiting
    Shutdown,
}

impl fmt::Display for SftpdiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SftpdiffError::Io(e) => write!(f, "IO error: {}", e),
            SftpdiffError::Config(msg) => write!(f, "configuration error: {}", msg),
            SftpdiffError::TransportSetup(msg) => write!(f, "transport setup failed: {}", msg),
            SftpdiffError::UnexpectedEof => write!(f, "unexpected end of stream from transport"),
            SftpdiffError::TransportClosed => write!(f, "transport closed by peer"),
            SftpdiffError::TruncatedReply => write!(f, "truncated reply"),
            SftpdiffError::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
            SftpdiffError::Sftp { code, message } => {
                write!(f, "SFTP error {}: {}", code, message)
            }
            SftpdiffError::Shutdown => write!(f, "connection shut down"),
        }
    }
}

impl std::error::Error for SftpdiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SftpdiffError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SftpdiffError {
    fn from(err: std::io::Error) -> Self {
        SftpdiffError::Io(err)
    }
}

/// Result type for sftpdiff operations
pub type SftpdiffResult<T> = Result<T, SftpdiffError>;
