//! SFTP data types and structures.

use super::message::{PacketBuilder, PacketReader};
use sftpdiff_platform::SftpdiffResult;

/// SFTP status codes (SSH_FX_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCode {
    /// SSH_FX_OK - Success
    Ok = 0,
    /// SSH_FX_EOF - End of file
    Eof = 1,
    /// SSH_FX_NO_SUCH_FILE - No such file
    NoSuchFile = 2,
    /// SSH_FX_PERMISSION_DENIED - Permission denied
    PermissionDenied = 3,
    /// SSH_FX_FAILURE - General failure
    Failure = 4,
    /// SSH_FX_BAD_MESSAGE - Bad message
    BadMessage = 5,
    /// SSH_FX_NO_CONNECTION - No connection
    NoConnection = 6,
    /// SSH_FX_CONNECTION_LOST - Connection lost
    ConnectionLost = 7,
    /// SSH_FX_OP_UNSUPPORTED - Operation not supported
    OpUnsupported = 8,
}

impl StatusCode {
    /// Convert from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Eof),
            2 => Some(Self::NoSuchFile),
            3 => Some(Self::PermissionDenied),
            4 => Some(Self::Failure),
            5 => Some(Self::BadMessage),
            6 => Some(Self::NoConnection),
            7 => Some(Self::ConnectionLost),
            8 => Some(Self::OpUnsupported),
            _ => None,
        }
    }

    /// Returns the conventional message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::Eof => "End of file",
            Self::NoSuchFile => "No such file or directory",
            Self::PermissionDenied => "Permission denied",
            Self::Failure => "Failure",
            Self::BadMessage => "Bad message",
            Self::NoConnection => "No connection",
            Self::ConnectionLost => "Connection lost",
            Self::OpUnsupported => "Operation not supported",
        }
    }
}

/// File open flags (SSH_FXF_*).
#[derive(Debug, Clone, Copy)]
pub struct OpenFlags;

impl OpenFlags {
    /// SSH_FXF_READ - Open for reading
    pub const READ: u32 = 0x00000001;
    /// SSH_FXF_WRITE - Open for writing
    pub const WRITE: u32 = 0x00000002;
    /// SSH_FXF_APPEND - Force writes to append
    pub const APPEND: u32 = 0x00000004;
    /// SSH_FXF_CREAT - Create if doesn't exist
    pub const CREAT: u32 = 0x00000008;
    /// SSH_FXF_TRUNC - Truncate to 0 length
    pub const TRUNC: u32 = 0x00000010;
    /// SSH_FXF_EXCL - Fail if file exists
    pub const EXCL: u32 = 0x00000020;
}

/// File attribute flags (SSH_FILEXFER_ATTR_*).
#[derive(Debug, Clone, Copy)]
pub struct AttrFlags;

impl AttrFlags {
    /// SSH_FILEXFER_ATTR_SIZE
    pub const SIZE: u32 = 0x00000001;
    /// SSH_FILEXFER_ATTR_UIDGID
    pub const UIDGID: u32 = 0x00000002;
    /// SSH_FILEXFER_ATTR_PERMISSIONS
    pub const PERMISSIONS: u32 = 0x00000004;
    /// SSH_FILEXFER_ATTR_ACMODTIME
    pub const ACMODTIME: u32 = 0x00000008;
    /// SSH_FILEXFER_ATTR_EXTENDED
    pub const EXTENDED: u32 = 0x80000000;
}

// POSIX file-type bits carried in the permissions word.
const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// File attributes, decoded per the v3 layout.
///
/// A 32-bit flag word selects which fields follow on the wire; absent
/// fields decode to `None`.
#[derive(Debug, Clone, Default)]
pub struct FileAttributes {
    /// File size in bytes
    pub size: Option<u64>,
    /// User ID
    pub uid: Option<u32>,
    /// Group ID
    pub gid: Option<u32>,
    /// Permissions (POSIX mode bits)
    pub permissions: Option<u32>,
    /// Access time (Unix timestamp)
    pub atime: Option<u32>,
    /// Modification time (Unix timestamp)
    pub mtime: Option<u32>,
    /// Extended attributes (type/data byte-string pairs)
    pub extended: Vec<(Vec<u8>, Vec<u8>)>,
}

impl FileAttributes {
    /// Creates empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the permissions word marks this as a directory.
    pub fn is_dir(&self) -> bool {
        self.permissions.unwrap_or(0) & S_IFMT == S_IFDIR
    }

    /// Appends the v3 serialization to a packet under construction.
    pub fn encode(&self, pkt: &mut PacketBuilder) {
        let mut flags = 0u32;
        if self.size.is_some() {
            flags |= AttrFlags::SIZE;
        }
        if self.uid.is_some() && self.gid.is_some() {
            flags |= AttrFlags::UIDGID;
        }
        if self.permissions.is_some() {
            flags |= AttrFlags::PERMISSIONS;
        }
        if self.atime.is_some() && self.mtime.is_some() {
            flags |= AttrFlags::ACMODTIME;
        }
        if !self.extended.is_empty() {
            flags |= AttrFlags::EXTENDED;
        }

        pkt.put_u32(flags);
        if let Some(size) = self.size {
            pkt.put_u64(size);
        }
        if let (Some(uid), Some(gid)) = (self.uid, self.gid) {
            pkt.put_u32(uid);
            pkt.put_u32(gid);
        }
        if let Some(permissions) = self.permissions {
            pkt.put_u32(permissions);
        }
        if let (Some(atime), Some(mtime)) = (self.atime, self.mtime) {
            pkt.put_u32(atime);
            pkt.put_u32(mtime);
        }
        if !self.extended.is_empty() {
            pkt.put_u32(self.extended.len() as u32);
            for (ext_type, ext_data) in &self.extended {
                pkt.put_str(ext_type);
                pkt.put_str(ext_data);
            }
        }
    }

    /// Decodes an attribute record at the reader's cursor.
    pub fn decode(r: &mut PacketReader<'_>) -> SftpdiffResult<Self> {
        let flags = r.get_u32()?;
        let mut attrs = Self::new();

        if flags & AttrFlags::SIZE != 0 {
            attrs.size = Some(r.get_u64()?);
        }
        if flags & AttrFlags::UIDGID != 0 {
            attrs.uid = Some(r.get_u32()?);
            attrs.gid = Some(r.get_u32()?);
        }
        if flags & AttrFlags::PERMISSIONS != 0 {
            attrs.permissions = Some(r.get_u32()?);
        }
        if flags & AttrFlags::ACMODTIME != 0 {
            attrs.atime = Some(r.get_u32()?);
            attrs.mtime = Some(r.get_u32()?);
        }
        if flags & AttrFlags::EXTENDED != 0 {
            let count = r.get_u32()?;
            for _ in 0..count {
                let ext_type = r.get_str()?;
                let ext_data = r.get_str()?;
                attrs.extended.push((ext_type, ext_data));
            }
        }

        Ok(attrs)
    }
}

/// A single record from an SSH_FXP_NAME reply.
#[derive(Debug, Clone)]
pub struct NameEntry {
    /// File name relative to the directory read
    pub filename: String,
    /// Expanded `ls -l` style line supplied by the server
    pub longname: String,
    /// Attributes for the entry
    pub attrs: FileAttributes,
}

impl NameEntry {
    /// Decodes one name record at the reader's cursor.
    pub fn decode(r: &mut PacketReader<'_>) -> SftpdiffResult<Self> {
        let filename = r.get_string()?;
        let longname = r.get_string()?;
        let attrs = FileAttributes::decode(r)?;
        Ok(Self {
            filename,
            longname,
            attrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::message::MessageType;

    fn round_trip(attrs: &FileAttributes) -> FileAttributes {
        let mut pkt = PacketBuilder::new(MessageType::Attrs);
        attrs.encode(&mut pkt);
        let frame = pkt.finish();
        let mut r = PacketReader::new(&frame[5..]);
        FileAttributes::decode(&mut r).unwrap()
    }

    #[test]
    fn test_status_code_conversion() {
        assert_eq!(StatusCode::from_u32(0), Some(StatusCode::Ok));
        assert_eq!(StatusCode::from_u32(2), Some(StatusCode::NoSuchFile));
        assert_eq!(StatusCode::from_u32(999), None);
    }

    #[test]
    fn test_attributes_round_trip() {
        let mut attrs = FileAttributes::new();
        attrs.size = Some(1024);
        attrs.permissions = Some(0o100644);

        let parsed = round_trip(&attrs);
        assert_eq!(parsed.size, Some(1024));
        assert_eq!(parsed.permissions, Some(0o100644));
        assert_eq!(parsed.uid, None);
        assert_eq!(parsed.atime, None);
    }

    #[test]
    fn test_attributes_all_fields() {
        let mut attrs = FileAttributes::new();
        attrs.size = Some(7);
        attrs.uid = Some(1000);
        attrs.gid = Some(1000);
        attrs.permissions = Some(0o100600);
        attrs.atime = Some(1_700_000_000);
        attrs.mtime = Some(1_700_000_001);
        attrs.extended = vec![(b"owner@".to_vec(), b"u".to_vec())];

        let parsed = round_trip(&attrs);
        assert_eq!(parsed.size, Some(7));
        assert_eq!(parsed.uid, Some(1000));
        assert_eq!(parsed.gid, Some(1000));
        assert_eq!(parsed.mtime, Some(1_700_000_001));
        assert_eq!(parsed.extended.len(), 1);
        assert_eq!(parsed.extended[0].0, b"owner@");
    }

    #[test]
    fn test_is_dir() {
        let mut attrs = FileAttributes::new();
        assert!(!attrs.is_dir());
        attrs.permissions = Some(0o040755);
        assert!(attrs.is_dir());
        attrs.permissions = Some(0o100644);
        assert!(!attrs.is_dir());
    }

    #[test]
    fn test_name_entry_decode() {
        let mut pkt = PacketBuilder::new(MessageType::Name);
        pkt.put_str(b"x");
        pkt.put_str(b"-rw-r--r--    1 u  u    10 Jan  1 00:00 x");
        let mut attrs = FileAttributes::new();
        attrs.size = Some(10);
        attrs.encode(&mut pkt);
        let frame = pkt.finish();

        let mut r = PacketReader::new(&frame[5..]);
        let entry = NameEntry::decode(&mut r).unwrap();
        assert_eq!(entry.filename, "x");
        assert!(entry.longname.starts_with("-rw-"));
        assert_eq!(entry.attrs.size, Some(10));
    }
}
