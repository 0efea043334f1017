//! SFTP client connection.
//!
//! One [`SftpClient`] represents a lazily-opened session to a remote host.
//! Any number of callers may use it concurrently: requests are written to
//! the transport one frame at a time, replies arrive in whatever order the
//! server chooses, and a dedicated receive task routes each reply to the
//! caller waiting on its request ID. The split `begin_read`/`finish_read`
//! surface lets callers keep several reads in flight over one round trip.

use std::sync::Arc;

use sftpdiff_platform::{SftpdiffError, SftpdiffResult};
use tokio::process::Child;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::message::{MessageType, PacketBuilder, PacketReader, SFTP_VERSION};
use super::registry::{Reply, ReplyRegistry};
use super::transport::{FrameReader, FrameWriter, SftpTransport};
use super::types::{FileAttributes, NameEntry, StatusCode};

/// Shared per-session state: the registry and the transport write side.
///
/// Both the facade and the receive task hold this behind an `Arc`; the
/// facade additionally owns the receive task's join handle.
struct Session {
    host: String,
    registry: Mutex<ReplyRegistry>,
    writer: Mutex<FrameWriter>,
}

/// State of an established session.
struct Live {
    session: Arc<Session>,
    home: String,
    recv_task: JoinHandle<()>,
    child: Option<Child>,
}

enum State {
    Disconnected,
    Connected(Live),
}

/// A request in flight: the allocated ID and the slot its reply arrives on.
pub struct PendingReply {
    id: u32,
    rx: oneshot::Receiver<Reply>,
}

impl PendingReply {
    /// The request ID this reply is correlated by.
    pub fn id(&self) -> u32 {
        self.id
    }

    async fn recv(self) -> SftpdiffResult<Reply> {
        self.rx.await.map_err(|_| SftpdiffError::Shutdown)
    }
}

/// Connection to an SFTP server.
///
/// Created disconnected; [`SftpClient::connect`] is idempotent and performs
/// the child spawn, the INIT/VERSION exchange and home-directory discovery.
/// [`SftpClient::disconnect`] (also idempotent) wakes every parked caller
/// with `Shutdown` and reaps the child.
///
/// # Example
///
/// ```rust,no_run
/// use sftpdiff_proto::sftp::{OpenFlags, SftpClient};
///
/// # async fn example() -> sftpdiff_platform::SftpdiffResult<()> {
/// let client = SftpClient::new("server");
/// client.connect().await?;
///
/// let handle = client.open("notes.txt", OpenFlags::READ).await?;
/// let pending = client.begin_read(&handle, 0, 4096).await?;
/// let data = client.finish_read(pending).await?;
/// println!("read {} bytes", data.len());
///
/// client.close(&handle).await?;
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct SftpClient {
    host: String,
    state: Mutex<State>,
}

impl SftpClient {
    /// Creates a disconnected client for `host`.
    ///
    /// `host` is an opaque string handed to the transport; anything the
    /// user's SSH client accepts is fine.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(State::Disconnected),
        }
    }

    /// The host this client talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether a session is currently established.
    pub async fn is_connected(&self) -> bool {
        matches!(&*self.state.lock().await, State::Connected(_))
    }

    /// The remote home directory, cached at connect time.
    pub async fn home(&self) -> SftpdiffResult<String> {
        let (_session, home) = self.live().await?;
        Ok(home)
    }

    /// Establishes the session. Does nothing if already connected.
    pub async fn connect(&self) -> SftpdiffResult<()> {
        let mut state = self.state.lock().await;
        if let State::Connected(_) = &*state {
            return Ok(());
        }
        let transport = SftpTransport::spawn(&self.host)?;
        *state = State::Connected(self.establish(transport).await?);
        Ok(())
    }

    /// Establishes the session over a caller-supplied transport.
    ///
    /// Intended for tests and in-process servers. Does nothing (and drops
    /// the transport) if already connected.
    pub async fn connect_with(&self, transport: SftpTransport) -> SftpdiffResult<()> {
        let mut state = self.state.lock().await;
        if let State::Connected(_) = &*state {
            return Ok(());
        }
        *state = State::Connected(self.establish(transport).await?);
        Ok(())
    }

    /// Tears down the session. Does nothing if not connected.
    ///
    /// Every caller still waiting on a reply observes `Shutdown`; the
    /// receive task is joined, the pipes closed and the child reaped.
    pub async fn disconnect(&self) -> SftpdiffResult<()> {
        let mut state = self.state.lock().await;
        let live = match std::mem::replace(&mut *state, State::Disconnected) {
            State::Connected(live) => live,
            State::Disconnected => return Ok(()),
        };
        debug!(host = %self.host, "disconnecting");

        // Wake every parked caller before touching the transport
        live.session.registry.lock().await.fail_all();
        live.recv_task.abort();
        let _ = live.recv_task.await;

        // Closing our write end tells the child to exit
        let _ = live.session.writer.lock().await.close().await;

        if let Some(mut child) = live.child {
            if let Err(e) = child.wait().await {
                warn!(host = %self.host, error = %e, "waiting for child transport failed");
            } else {
                debug!(host = %self.host, "child transport reaped");
            }
        }
        Ok(())
    }

    /// INIT/VERSION exchange, receive-task start, home discovery.
    ///
    /// The version exchange happens on the whole transport, before the
    /// receive task exists, so the only ID-less frames never reach it.
    async fn establish(&self, mut transport: SftpTransport) -> SftpdiffResult<Live> {
        let mut pkt = PacketBuilder::new(MessageType::Init);
        pkt.put_u32(SFTP_VERSION);
        transport.send_frame(&pkt.finish()).await?;

        let (msg_type, body) = transport.recv_frame().await?;
        if msg_type != MessageType::Version as u8 {
            return Err(SftpdiffError::TransportSetup(format!(
                "{}: expected VERSION during handshake, got type {}",
                self.host, msg_type
            )));
        }
        let version = PacketReader::new(&body).get_u32()?;
        if version < SFTP_VERSION {
            return Err(SftpdiffError::TransportSetup(format!(
                "{}: unsupported SFTP version {}",
                self.host, version
            )));
        }

        let (reader, writer, child) = transport.into_parts();
        let session = Arc::new(Session {
            host: self.host.clone(),
            registry: Mutex::new(ReplyRegistry::new()),
            writer: Mutex::new(writer),
        });
        let recv_task = tokio::spawn(recv_loop(Arc::clone(&session), reader));

        // Servers vary on REALPATH of ""; whatever comes back is the root
        // that relative paths resolve against.
        let home = match realpath_on(&session, "").await {
            Ok(home) => home,
            Err(e) => {
                session.registry.lock().await.fail_all();
                recv_task.abort();
                let _ = recv_task.await;
                let _ = session.writer.lock().await.close().await;
                if let Some(mut child) = child {
                    let _ = child.wait().await;
                }
                return Err(e);
            }
        };
        info!(host = %self.host, version, home = %home, "SFTP session established");

        Ok(Live {
            session,
            home,
            recv_task,
            child,
        })
    }

    async fn live(&self) -> SftpdiffResult<(Arc<Session>, String)> {
        match &*self.state.lock().await {
            State::Connected(live) => Ok((Arc::clone(&live.session), live.home.clone())),
            // No session to issue against, torn down or never established
            State::Disconnected => Err(SftpdiffError::Shutdown),
        }
    }

    /// Opens a remote file and returns its handle.
    ///
    /// `flags` is a combination of the `OpenFlags` constants. Relative
    /// paths resolve against the remote home directory.
    pub async fn open(&self, path: &str, flags: u32) -> SftpdiffResult<Vec<u8>> {
        let (session, home) = self.live().await?;
        let full = resolve_path(&home, path);
        debug!(host = %self.host, path = %full, flags, "SSH_FXP_OPEN");

        let reply = request(&session, MessageType::Open, |pkt| {
            pkt.put_str(full.as_bytes());
            pkt.put_u32(flags);
            pkt.put_u32(0); // no attributes supplied
        })
        .await?;

        match MessageType::from_u8(reply.msg_type) {
            Some(MessageType::Handle) => {
                let handle = PacketReader::new(&reply.body).get_str()?;
                debug!(host = %self.host, handle = %hex::encode(&handle), "remote file opened");
                Ok(handle)
            }
            Some(MessageType::Status) => Err(expect_error_status(&reply.body)),
            _ => Err(unexpected_reply("OPEN", reply.msg_type)),
        }
    }

    /// Opens a remote directory and returns its handle.
    pub async fn opendir(&self, path: &str) -> SftpdiffResult<Vec<u8>> {
        let (session, home) = self.live().await?;
        let full = resolve_path(&home, path);
        debug!(host = %self.host, path = %full, "SSH_FXP_OPENDIR");

        let reply = request(&session, MessageType::OpenDir, |pkt| {
            pkt.put_str(full.as_bytes());
        })
        .await?;

        match MessageType::from_u8(reply.msg_type) {
            Some(MessageType::Handle) => {
                let handle = PacketReader::new(&reply.body).get_str()?;
                debug!(host = %self.host, handle = %hex::encode(&handle), "remote directory opened");
                Ok(handle)
            }
            Some(MessageType::Status) => Err(expect_error_status(&reply.body)),
            _ => Err(unexpected_reply("OPENDIR", reply.msg_type)),
        }
    }

    /// Closes a handle returned by `open` or `opendir`.
    pub async fn close(&self, handle: &[u8]) -> SftpdiffResult<()> {
        let (session, _home) = self.live().await?;
        debug!(host = %self.host, handle = %hex::encode(handle), "SSH_FXP_CLOSE");

        let reply = request(&session, MessageType::Close, |pkt| {
            pkt.put_str(handle);
        })
        .await?;

        match MessageType::from_u8(reply.msg_type) {
            Some(MessageType::Status) => {
                let (code, message) = decode_status(&reply.body)?;
                if code == StatusCode::Ok as u32 {
                    Ok(())
                } else {
                    Err(SftpdiffError::Sftp { code, message })
                }
            }
            _ => Err(unexpected_reply("CLOSE", reply.msg_type)),
        }
    }

    /// Gets attributes for a path, following symlinks.
    pub async fn stat(&self, path: &str) -> SftpdiffResult<FileAttributes> {
        let (session, home) = self.live().await?;
        let full = resolve_path(&home, path);
        debug!(host = %self.host, path = %full, "SSH_FXP_STAT");
        gstat_on(&session, MessageType::Stat, full.as_bytes()).await
    }

    /// Gets attributes for a path, not following symlinks.
    pub async fn lstat(&self, path: &str) -> SftpdiffResult<FileAttributes> {
        let (session, home) = self.live().await?;
        let full = resolve_path(&home, path);
        debug!(host = %self.host, path = %full, "SSH_FXP_LSTAT");
        gstat_on(&session, MessageType::LStat, full.as_bytes()).await
    }

    /// Gets attributes for an open handle.
    pub async fn fstat(&self, handle: &[u8]) -> SftpdiffResult<FileAttributes> {
        let (session, _home) = self.live().await?;
        debug!(host = %self.host, handle = %hex::encode(handle), "SSH_FXP_FSTAT");
        gstat_on(&session, MessageType::FStat, handle).await
    }

    /// Canonicalizes a path on the server.
    ///
    /// The path is sent verbatim; this is the resolver that relative-path
    /// handling is built on.
    pub async fn realpath(&self, path: &str) -> SftpdiffResult<String> {
        let (session, _home) = self.live().await?;
        realpath_on(&session, path).await
    }

    /// Initiates a read without blocking for the reply.
    ///
    /// The returned [`PendingReply`] is consumed by
    /// [`SftpClient::finish_read`]; issuing several before finishing any
    /// keeps the transport busy across round trips.
    pub async fn begin_read(
        &self,
        handle: &[u8],
        offset: u64,
        len: u32,
    ) -> SftpdiffResult<PendingReply> {
        let (session, _home) = self.live().await?;
        let pending = issue(&session, MessageType::Read, |pkt| {
            pkt.put_str(handle);
            pkt.put_u64(offset);
            pkt.put_u32(len);
        })
        .await?;
        debug!(
            host = %self.host,
            handle = %hex::encode(handle),
            offset,
            len,
            id = pending.id(),
            "SSH_FXP_READ"
        );
        Ok(pending)
    }

    /// Completes a read started with `begin_read`.
    ///
    /// Returns the payload bytes; end-of-file yields an empty vector, and
    /// reads past the logical end keep yielding empty vectors. The server
    /// may legally return fewer bytes than requested.
    pub async fn finish_read(&self, pending: PendingReply) -> SftpdiffResult<Vec<u8>> {
        let id = pending.id();
        let reply = pending.recv().await?;
        match MessageType::from_u8(reply.msg_type) {
            Some(MessageType::Data) => {
                let data = PacketReader::new(&reply.body).get_str()?;
                debug!(host = %self.host, id, len = data.len(), "read completed");
                Ok(data)
            }
            Some(MessageType::Status) => {
                let (code, message) = decode_status(&reply.body)?;
                if code == StatusCode::Eof as u32 {
                    debug!(host = %self.host, id, "read reached end of file");
                    Ok(Vec::new())
                } else if code != StatusCode::Ok as u32 {
                    Err(SftpdiffError::Sftp { code, message })
                } else {
                    Err(SftpdiffError::ProtocolViolation(
                        "unexpected OK status for READ".to_string(),
                    ))
                }
            }
            _ => Err(unexpected_reply("READ", reply.msg_type)),
        }
    }

    /// Initiates a directory read without blocking for the reply.
    pub async fn begin_readdir(&self, handle: &[u8]) -> SftpdiffResult<PendingReply> {
        let (session, _home) = self.live().await?;
        let pending = issue(&session, MessageType::ReadDir, |pkt| {
            pkt.put_str(handle);
        })
        .await?;
        debug!(
            host = %self.host,
            handle = %hex::encode(handle),
            id = pending.id(),
            "SSH_FXP_READDIR"
        );
        Ok(pending)
    }

    /// Completes a directory read started with `begin_readdir`.
    ///
    /// Returns the next batch of entries; an empty vector means the
    /// directory is exhausted.
    pub async fn finish_readdir(&self, pending: PendingReply) -> SftpdiffResult<Vec<NameEntry>> {
        let reply = pending.recv().await?;
        match MessageType::from_u8(reply.msg_type) {
            Some(MessageType::Name) => {
                let mut r = PacketReader::new(&reply.body);
                let count = r.get_u32()?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    entries.push(NameEntry::decode(&mut r)?);
                }
                Ok(entries)
            }
            Some(MessageType::Status) => {
                let (code, message) = decode_status(&reply.body)?;
                if code == StatusCode::Eof as u32 {
                    Ok(Vec::new())
                } else if code != StatusCode::Ok as u32 {
                    Err(SftpdiffError::Sftp { code, message })
                } else {
                    Err(SftpdiffError::ProtocolViolation(
                        "unexpected OK status for READDIR".to_string(),
                    ))
                }
            }
            _ => Err(unexpected_reply("READDIR", reply.msg_type)),
        }
    }

    /// Lists a directory: open, drain all batches, close.
    pub async fn readdir(&self, path: &str) -> SftpdiffResult<Vec<NameEntry>> {
        let handle = self.opendir(path).await?;
        let mut entries = Vec::new();
        loop {
            let pending = match self.begin_readdir(&handle).await {
                Ok(pending) => pending,
                Err(e) => {
                    let _ = self.close(&handle).await;
                    return Err(e);
                }
            };
            match self.finish_readdir(pending).await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => entries.extend(batch),
                Err(e) => {
                    let _ = self.close(&handle).await;
                    return Err(e);
                }
            }
        }
        self.close(&handle).await?;
        debug!(host = %self.host, path, entries = entries.len(), "directory listed");
        Ok(entries)
    }
}

impl Drop for SftpClient {
    fn drop(&mut self) {
        // Drop cannot await; disconnect() gives deterministic teardown.
        // The runtime reaps the dropped child in the background.
        if let Ok(mut state) = self.state.try_lock() {
            if let State::Connected(live) = std::mem::replace(&mut *state, State::Disconnected) {
                live.recv_task.abort();
                if let Ok(mut registry) = live.session.registry.try_lock() {
                    registry.fail_all();
                }
            }
        }
    }
}

/// Receive loop: reads frames and routes them to waiters by request ID.
///
/// Runs until the transport fails or the task is aborted by `disconnect`.
/// On exit the registry is failed so no waiter is left parked.
async fn recv_loop(session: Arc<Session>, mut reader: FrameReader) {
    loop {
        let (msg_type, body) = match reader.recv_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(host = %session.host, error = %e, "receive loop ending");
                break;
            }
        };
        if body.len() < 4 {
            warn!(host = %session.host, "reply too short to carry a request ID");
            break;
        }
        let id = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
        let reply = Reply {
            msg_type,
            body: body[4..].to_vec(),
        };
        if !session.registry.lock().await.complete(id, reply) {
            warn!(host = %session.host, id, "reply for unknown request ID");
        }
    }
    session.registry.lock().await.fail_all();
}

/// Builds and sends one request frame, returning the pending reply.
///
/// The writer lock is held across the whole frame so concurrent requests
/// are never interleaved on the wire.
async fn issue(
    session: &Session,
    msg_type: MessageType,
    build: impl FnOnce(&mut PacketBuilder),
) -> SftpdiffResult<PendingReply> {
    let (id, rx) = session.registry.lock().await.allocate()?;
    let mut pkt = PacketBuilder::new(msg_type);
    pkt.put_u32(id);
    build(&mut pkt);
    let frame = pkt.finish();

    let sent = {
        let mut writer = session.writer.lock().await;
        writer.send_frame(&frame).await
    };
    if let Err(e) = sent {
        session.registry.lock().await.release(id);
        return Err(e);
    }
    Ok(PendingReply { id, rx })
}

async fn request(
    session: &Session,
    msg_type: MessageType,
    build: impl FnOnce(&mut PacketBuilder),
) -> SftpdiffResult<Reply> {
    issue(session, msg_type, build).await?.recv().await
}

async fn gstat_on(
    session: &Session,
    msg_type: MessageType,
    target: &[u8],
) -> SftpdiffResult<FileAttributes> {
    let reply = request(session, msg_type, |pkt| {
        pkt.put_str(target);
    })
    .await?;
    match MessageType::from_u8(reply.msg_type) {
        Some(MessageType::Attrs) => FileAttributes::decode(&mut PacketReader::new(&reply.body)),
        Some(MessageType::Status) => Err(expect_error_status(&reply.body)),
        _ => Err(unexpected_reply("STAT", reply.msg_type)),
    }
}

async fn realpath_on(session: &Session, path: &str) -> SftpdiffResult<String> {
    debug!(host = %session.host, path, "SSH_FXP_REALPATH");
    let reply = request(session, MessageType::RealPath, |pkt| {
        pkt.put_str(path.as_bytes());
    })
    .await?;
    match MessageType::from_u8(reply.msg_type) {
        Some(MessageType::Name) => {
            let mut r = PacketReader::new(&reply.body);
            let count = r.get_u32()?;
            if count != 1 {
                return Err(SftpdiffError::ProtocolViolation(format!(
                    "REALPATH returned {} names",
                    count
                )));
            }
            r.get_string()
        }
        Some(MessageType::Status) => Err(expect_error_status(&reply.body)),
        _ => Err(unexpected_reply("REALPATH", reply.msg_type)),
    }
}

/// Resolves a path against the session's home directory.
fn resolve_path(home: &str, path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", home, path)
    }
}

/// Decodes the code and message of an SSH_FXP_STATUS body.
fn decode_status(body: &[u8]) -> SftpdiffResult<(u32, String)> {
    let mut r = PacketReader::new(body);
    let code = r.get_u32()?;
    let message = r.get_string()?;
    // Language tag ignored
    Ok((code, message))
}

/// Maps a STATUS body to an error, in a context where OK makes no sense.
fn expect_error_status(body: &[u8]) -> SftpdiffError {
    match decode_status(body) {
        Ok((0, _)) => SftpdiffError::ProtocolViolation("unexpected OK status".to_string()),
        Ok((code, message)) => SftpdiffError::Sftp { code, message },
        Err(e) => e,
    }
}

fn unexpected_reply(context: &str, msg_type: u8) -> SftpdiffError {
    SftpdiffError::ProtocolViolation(format!(
        "unexpected reply type {} to {}",
        msg_type, context
    ))
}
