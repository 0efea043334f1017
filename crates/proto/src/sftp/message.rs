//! SFTP wire format: message types, packet construction and parsing.
//!
//! Every SFTP v3 message travels as a frame:
//!
//! ```text
//! uint32    length    (big-endian; counts the type byte and the body)
//! byte      type
//! byte[n]   body      (n = length - 1)
//! ```
//!
//! All integers are unsigned and big-endian. Strings are a `uint32` byte
//! count followed by the raw bytes; no character-set interpretation is
//! imposed and no terminator is appended.

use bytes::{BufMut, Bytes, BytesMut};
use sftpdiff_platform::{SftpdiffError, SftpdiffResult};

/// SFTP protocol version spoken by this client (v3).
pub const SFTP_VERSION: u32 = 3;

/// SFTP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// SSH_FXP_INIT - Initialize SFTP session
    Init = 1,
    /// SSH_FXP_VERSION - Version response
    Version = 2,
    /// SSH_FXP_OPEN - Open file
    Open = 3,
    /// SSH_FXP_CLOSE - Close file/directory
    Close = 4,
    /// SSH_FXP_READ - Read from file
    Read = 5,
    /// SSH_FXP_WRITE - Write to file
    Write = 6,
    /// SSH_FXP_LSTAT - Get file attributes (no follow symlinks)
    LStat = 7,
    /// SSH_FXP_FSTAT - Get file attributes by handle
    FStat = 8,
    /// SSH_FXP_SETSTAT - Set file attributes
    SetStat = 9,
    /// SSH_FXP_FSETSTAT - Set file attributes by handle
    FSetStat = 10,
    /// SSH_FXP_OPENDIR - Open directory
    OpenDir = 11,
    /// SSH_FXP_READDIR - Read directory
    ReadDir = 12,
    /// SSH_FXP_REMOVE - Remove file
    Remove = 13,
    /// SSH_FXP_MKDIR - Create directory
    MkDir = 14,
    /// SSH_FXP_RMDIR - Remove directory
    RmDir = 15,
    /// SSH_FXP_REALPATH - Canonicalize path
    RealPath = 16,
    /// SSH_FXP_STAT - Get file attributes
    Stat = 17,
    /// SSH_FXP_RENAME - Rename file/directory
    Rename = 18,
    /// SSH_FXP_READLINK - Read symbolic link
    ReadLink = 19,
    /// SSH_FXP_SYMLINK - Create symbolic link
    Symlink = 20,

    // Response messages
    /// SSH_FXP_STATUS - Status response
    Status = 101,
    /// SSH_FXP_HANDLE - File handle response
    Handle = 102,
    /// SSH_FXP_DATA - Data response
    Data = 103,
    /// SSH_FXP_NAME - Name response
    Name = 104,
    /// SSH_FXP_ATTRS - Attributes response
    Attrs = 105,
}

impl MessageType {
    /// Convert from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Init),
            2 => Some(Self::Version),
            3 => Some(Self::Open),
            4 => Some(Self::Close),
            5 => Some(Self::Read),
            6 => Some(Self::Write),
            7 => Some(Self::LStat),
            8 => Some(Self::FStat),
            9 => Some(Self::SetStat),
            10 => Some(Self::FSetStat),
            11 => Some(Self::OpenDir),
            12 => Some(Self::ReadDir),
            13 => Some(Self::Remove),
            14 => Some(Self::MkDir),
            15 => Some(Self::RmDir),
            16 => Some(Self::RealPath),
            17 => Some(Self::Stat),
            18 => Some(Self::Rename),
            19 => Some(Self::ReadLink),
            20 => Some(Self::Symlink),
            101 => Some(Self::Status),
            102 => Some(Self::Handle),
            103 => Some(Self::Data),
            104 => Some(Self::Name),
            105 => Some(Self::Attrs),
            _ => None,
        }
    }
}

/// Builder for an outgoing SFTP packet.
///
/// Starts with a four-byte length placeholder and the type byte; the
/// placeholder is rewritten by [`PacketBuilder::finish`].
///
/// # Example
///
/// ```
/// use sftpdiff_proto::sftp::{MessageType, PacketBuilder, SFTP_VERSION};
///
/// let mut pkt = PacketBuilder::new(MessageType::Init);
/// pkt.put_u32(SFTP_VERSION);
/// let frame = pkt.finish();
/// assert_eq!(&frame[..], &[0, 0, 0, 5, 1, 0, 0, 0, 3]);
/// ```
#[derive(Debug)]
pub struct PacketBuilder {
    buf: BytesMut,
}

impl PacketBuilder {
    /// Starts a new packet of the given type.
    pub fn new(msg_type: MessageType) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u32(0); // length placeholder
        buf.put_u8(msg_type as u8);
        Self { buf }
    }

    /// Appends a big-endian u32.
    pub fn put_u32(&mut self, n: u32) {
        self.buf.put_u32(n);
    }

    /// Appends a big-endian u64.
    pub fn put_u64(&mut self, n: u64) {
        self.buf.put_u64(n);
    }

    /// Appends a length-prefixed byte string.
    ///
    /// The length is the byte count, not a codepoint count, and the bytes
    /// are not terminated.
    pub fn put_str(&mut self, bytes: &[u8]) {
        self.buf.put_u32(bytes.len() as u32);
        self.buf.put_slice(bytes);
    }

    /// Rewrites the length placeholder and returns the finished frame.
    pub fn finish(mut self) -> Bytes {
        let len = (self.buf.len() - 4) as u32;
        self.buf[..4].copy_from_slice(&len.to_be_bytes());
        self.buf.freeze()
    }
}

/// Cursor-based reader for a reply body.
///
/// Every accessor fails with `TruncatedReply` when fewer bytes remain than
/// the value requires, and advances the cursor on success.
#[derive(Debug)]
pub struct PacketReader<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a reader positioned at the start of `body`.
    pub fn new(body: &'a [u8]) -> Self {
        Self { body, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.body.len() - self.pos
    }

    /// Reads a big-endian u32.
    pub fn get_u32(&mut self) -> SftpdiffResult<u32> {
        if self.remaining() < 4 {
            return Err(SftpdiffError::TruncatedReply);
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.body[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(raw))
    }

    /// Reads a big-endian u64.
    pub fn get_u64(&mut self) -> SftpdiffResult<u64> {
        if self.remaining() < 8 {
            return Err(SftpdiffError::TruncatedReply);
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.body[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_be_bytes(raw))
    }

    /// Reads a length-prefixed byte string.
    pub fn get_str(&mut self) -> SftpdiffResult<Vec<u8>> {
        let len = self.get_u32()? as usize;
        if self.remaining() < len {
            return Err(SftpdiffError::TruncatedReply);
        }
        let bytes = self.body[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(bytes)
    }

    /// Reads a length-prefixed string, replacing invalid UTF-8.
    pub fn get_string(&mut self) -> SftpdiffResult<String> {
        let bytes = self.get_str()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
