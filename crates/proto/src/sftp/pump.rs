//! Pipelined read pump.
//!
//! Streams one open remote file into an ordered byte sink while keeping a
//! bounded window of reads in flight, so throughput is not limited to one
//! round trip per chunk. Replies may arrive in any order; bytes reach the
//! sink in file order regardless.
//!
//! The pump tolerates two early exits:
//! - end-of-file: stop issuing, drain the window, finish;
//! - broken pipe on the sink (the downstream consumer quit): stop writing,
//!   drain the window for its side effects, finish.
//!
//! Servers may legally return fewer bytes than requested. The bytes a
//! short read left out are the next ones due in file order, so the pump
//! immediately re-queues the residual range at the front of the window;
//! later in-flight offsets remain valid and no gap is ever delivered.

use std::collections::VecDeque;
use std::sync::Arc;

use sftpdiff_platform::{SftpdiffError, SftpdiffResult};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::client::{PendingReply, SftpClient};

/// Default read chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u32 = 4096;

/// Default number of reads kept in flight.
pub const DEFAULT_WINDOW: usize = 4;

/// Read pump configuration.
///
/// The window is a throughput/latency trade; 4 × 4 KiB is the baseline.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Bytes requested per read.
    pub chunk_size: u32,
    /// Maximum reads in flight.
    pub window: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            window: DEFAULT_WINDOW,
        }
    }
}

impl PumpConfig {
    /// Creates the baseline configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bytes requested per read.
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the maximum reads in flight.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

/// One read in flight, with the offset and length it was issued for.
struct InFlight {
    pending: PendingReply,
    offset: u64,
    requested: u32,
}

/// Streams a remote file into a sink with bounded-window read-ahead.
pub struct ReadPump {
    client: Arc<SftpClient>,
    config: PumpConfig,
}

impl ReadPump {
    /// Creates a pump with the baseline window and chunk size.
    pub fn new(client: Arc<SftpClient>) -> Self {
        Self::with_config(client, PumpConfig::default())
    }

    /// Creates a pump with an explicit configuration.
    pub fn with_config(client: Arc<SftpClient>, config: PumpConfig) -> Self {
        Self { client, config }
    }

    /// Pumps the file behind `handle` into `sink`, from offset 0 to EOF.
    ///
    /// On exit the remote handle is closed and the sink is shut down,
    /// whether the pump finished, the sink went away, or an error stopped
    /// it early. Returns the number of bytes delivered to the sink.
    pub async fn run<W>(&self, handle: Vec<u8>, mut sink: W) -> SftpdiffResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let chunk = self.config.chunk_size;
        let mut window: VecDeque<InFlight> = VecDeque::new();
        let mut next_offset: u64 = 0;
        let mut delivered: u64 = 0;
        let mut outcome: SftpdiffResult<()> = Ok(());

        'pump: loop {
            // Keep the window full
            while window.len() < self.config.window {
                match self.client.begin_read(&handle, next_offset, chunk).await {
                    Ok(pending) => {
                        window.push_back(InFlight {
                            pending,
                            offset: next_offset,
                            requested: chunk,
                        });
                        next_offset += u64::from(chunk);
                    }
                    Err(e) => {
                        outcome = Err(e);
                        break 'pump;
                    }
                }
            }

            // Oldest read completes first; its bytes are next in file order
            let InFlight {
                pending,
                offset,
                requested,
            } = match window.pop_front() {
                Some(in_flight) => in_flight,
                None => break,
            };
            let data = match self.client.finish_read(pending).await {
                Ok(data) => data,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };

            if data.is_empty() {
                debug!(host = %self.client.host(), delivered, "pump reached end of file");
                break;
            }

            match sink.write_all(&data).await {
                Ok(()) => delivered += data.len() as u64,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    // The consumer exited early, possibly without reading
                    // anything; remaining replies are drained and discarded.
                    debug!(host = %self.client.host(), delivered, "pump sink closed early");
                    break;
                }
                Err(e) => {
                    outcome = Err(SftpdiffError::Io(e));
                    break;
                }
            }

            let got = data.len() as u32;
            if got < requested {
                // Short read: the residual range is the next due in file
                // order, so it goes to the front of the window.
                debug!(
                    host = %self.client.host(),
                    offset,
                    got,
                    requested,
                    "short read, re-queuing residual range"
                );
                let residual_offset = offset + u64::from(got);
                match self
                    .client
                    .begin_read(&handle, residual_offset, requested - got)
                    .await
                {
                    Ok(pending) => window.push_front(InFlight {
                        pending,
                        offset: residual_offset,
                        requested: requested - got,
                    }),
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }
        }

        self.drain(&mut window).await;

        let _ = sink.shutdown().await;
        if let Err(e) = self.client.close(&handle).await {
            warn!(host = %self.client.host(), error = %e, "closing pumped handle failed");
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }

        outcome.map(|()| delivered)
    }

    /// Collects and discards every read still in flight.
    async fn drain(&self, window: &mut VecDeque<InFlight>) {
        while let Some(in_flight) = window.pop_front() {
            let _ = self.client.finish_read(in_flight.pending).await;
        }
    }
}
