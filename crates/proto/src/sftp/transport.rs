//! Child-process transport carrying SFTP frames over ssh's stdio.
//!
//! The transport owns one child process speaking the SFTP subsystem on its
//! stdin/stdout (`ssh -s <host> sftp`); encryption and authentication are
//! entirely the child's business. Reads are buffered in 4 KiB chunks and
//! partial reads are transparent to callers.
//!
//! Exactly one task reads and one task writes once a session is live; the
//! two halves are separated with [`SftpTransport::into_parts`].

use std::process::Stdio;

use sftpdiff_platform::{SftpdiffError, SftpdiffResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;

/// Buffer size for the receive side.
const READ_BUFFER_SIZE: usize = 4096;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Receive half of a transport: yields whole frames.
pub struct FrameReader {
    inner: BufReader<BoxedReader>,
}

impl FrameReader {
    /// Reads one frame, returning its type byte and body.
    ///
    /// End-of-stream with bytes still required fails with `UnexpectedEof`.
    pub async fn recv_frame(&mut self) -> SftpdiffResult<(u8, Vec<u8>)> {
        let mut len_raw = [0u8; 4];
        read_exact(&mut self.inner, &mut len_raw).await?;
        let len = u32::from_be_bytes(len_raw);

        // The length counts the type byte, so it is at least 1
        if len == 0 {
            return Err(SftpdiffError::ProtocolViolation(
                "zero-length frame".to_string(),
            ));
        }

        let mut type_raw = [0u8; 1];
        read_exact(&mut self.inner, &mut type_raw).await?;

        let mut body = vec![0u8; (len - 1) as usize];
        read_exact(&mut self.inner, &mut body).await?;

        Ok((type_raw[0], body))
    }
}

/// Send half of a transport: writes whole frames.
pub struct FrameWriter {
    inner: BoxedWriter,
}

impl FrameWriter {
    /// Writes one complete frame.
    ///
    /// A broken pipe fails with `TransportClosed`.
    pub async fn send_frame(&mut self, frame: &[u8]) -> SftpdiffResult<()> {
        self.inner.write_all(frame).await.map_err(write_error)?;
        self.inner.flush().await.map_err(write_error)?;
        Ok(())
    }

    /// Closes the write side, signalling end-of-input to the child.
    pub async fn close(&mut self) -> SftpdiffResult<()> {
        self.inner.shutdown().await.map_err(write_error)?;
        Ok(())
    }
}

fn write_error(e: std::io::Error) -> SftpdiffError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        SftpdiffError::TransportClosed
    } else {
        SftpdiffError::Io(e)
    }
}

async fn read_exact<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> SftpdiffResult<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(SftpdiffError::UnexpectedEof)
        }
        Err(e) => Err(SftpdiffError::Io(e)),
    }
}

/// A duplex SFTP transport and, for spawned transports, its child process.
pub struct SftpTransport {
    reader: FrameReader,
    writer: FrameWriter,
    child: Option<Child>,
}

impl SftpTransport {
    /// Spawns `ssh -s <host> sftp` with its stdio piped to this transport.
    ///
    /// `host` is passed to ssh unmodified; anything the user's SSH client
    /// accepts is fine.
    pub fn spawn(host: &str) -> SftpdiffResult<Self> {
        debug!(host, "spawning ssh transport");

        let mut child = Command::new("ssh")
            .arg("-s")
            .arg(host)
            .arg("sftp")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| SftpdiffError::TransportSetup(format!("spawn ssh {}: {}", host, e)))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            SftpdiffError::TransportSetup("child stdin not captured".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            SftpdiffError::TransportSetup("child stdout not captured".to_string())
        })?;

        Ok(Self::assemble(
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
        ))
    }

    /// Builds a transport over arbitrary streams.
    ///
    /// Used by tests and in-process servers; there is no child to reap.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::assemble(Box::new(reader), Box::new(writer), None)
    }

    fn assemble(reader: BoxedReader, writer: BoxedWriter, child: Option<Child>) -> Self {
        Self {
            reader: FrameReader {
                inner: BufReader::with_capacity(READ_BUFFER_SIZE, reader),
            },
            writer: FrameWriter { inner: writer },
            child,
        }
    }

    /// Reads one frame. Used during the handshake, before the halves split.
    pub async fn recv_frame(&mut self) -> SftpdiffResult<(u8, Vec<u8>)> {
        self.reader.recv_frame().await
    }

    /// Writes one frame. Used during the handshake, before the halves split.
    pub async fn send_frame(&mut self, frame: &[u8]) -> SftpdiffResult<()> {
        self.writer.send_frame(frame).await
    }

    /// Splits the transport into its receive half, send half and child.
    pub fn into_parts(self) -> (FrameReader, FrameWriter, Option<Child>) {
        (self.reader, self.writer, self.child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::message::{MessageType, PacketBuilder};

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (client, server) = tokio::io::duplex(4096);
        let (srv_read, _srv_write) = tokio::io::split(server);
        let (_cli_read, cli_write) = tokio::io::split(client);

        let mut sender = SftpTransport::from_streams(srv_read, cli_write);

        let mut pkt = PacketBuilder::new(MessageType::Init);
        pkt.put_u32(3);
        sender.send_frame(&pkt.finish()).await.unwrap();

        let (msg_type, body) = sender.recv_frame().await.unwrap();
        assert_eq!(msg_type, MessageType::Init as u8);
        assert_eq!(body, vec![0, 0, 0, 3]);
    }

    #[tokio::test]
    async fn test_eof_mid_frame() {
        let (client, server) = tokio::io::duplex(4096);
        let (srv_read, srv_write) = tokio::io::split(server);
        let (_cli_read, mut cli_write) = tokio::io::split(client);

        let mut transport = SftpTransport::from_streams(srv_read, srv_write);

        // Half a length prefix, then end-of-stream
        use tokio::io::AsyncWriteExt;
        cli_write.write_all(&[0, 0]).await.unwrap();
        cli_write.shutdown().await.unwrap();
        drop(cli_write);

        let err = transport.recv_frame().await.unwrap_err();
        assert!(matches!(err, SftpdiffError::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_zero_length_frame_rejected() {
        let (client, server) = tokio::io::duplex(4096);
        let (srv_read, srv_write) = tokio::io::split(server);
        let (_cli_read, mut cli_write) = tokio::io::split(client);

        let mut transport = SftpTransport::from_streams(srv_read, srv_write);

        use tokio::io::AsyncWriteExt;
        cli_write.write_all(&[0, 0, 0, 0]).await.unwrap();

        let err = transport.recv_frame().await.unwrap_err();
        assert!(matches!(err, SftpdiffError::ProtocolViolation(_)));
    }
}
