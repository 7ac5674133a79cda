// loglens - app/live.rs
//
// Live ingest: accepts byte chunks from a streaming producer (serial port
// reader, device log command, remote tail over SSH), normalises line
// endings, prefixes each complete line with a wall-clock timestamp,
// appends to a per-connection backing file, and emits typed events so the
// line index over the backing file can grow incrementally.
//
// Architecture mirrors the tail pattern: per-connection state with a
// residual (incomplete-line) buffer, an mpsc event channel polled by the
// consumer, and non-fatal per-connection errors. The direction is
// inverted — bytes flow from the producer into the backing file instead
// of out of a watched file.
//
// Lifecycle: connect -> active while receiving -> disconnect stops
// receiving but the backing file remains indexable -> remove deletes the
// backing file.

use crate::core::model::{LiveConnectionInfo, SourceKind};
use crate::util::constants::{
    LIVE_TIMESTAMP_FORMAT, MAX_LIVE_CONNECTIONS, MAX_LIVE_RESIDUAL_BYTES,
};
use crate::util::error::{EngineError, Result};
use chrono::{Local, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

// =============================================================================
// Events
// =============================================================================

/// Outbound notifications of a live connection, forwarded by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// New complete lines were appended to the backing file.
    LinesAdded { connection_id: String, count: u64 },

    /// The producer reported an error; the connection may still be alive.
    Error {
        connection_id: String,
        message: String,
    },

    /// The connection stopped receiving bytes. The backing file survives.
    Disconnected { connection_id: String },
}

// =============================================================================
// Connection
// =============================================================================

struct LiveConnection {
    id: String,
    kind: SourceKind,
    display_name: String,
    detail: String,
    backing_path: PathBuf,
    /// `None` after disconnect.
    file: Option<File>,
    /// Bytes after the last terminator — an in-progress line carried into
    /// the next chunk.
    residual: Vec<u8>,
    connected_since: chrono::DateTime<Utc>,
    connected: bool,
    line_count: u64,
    events: mpsc::Sender<LiveEvent>,
}

impl LiveConnection {
    fn info(&self) -> LiveConnectionInfo {
        LiveConnectionInfo {
            id: self.id.clone(),
            source_kind: self.kind,
            display_name: self.display_name.clone(),
            detail: self.detail.clone(),
            backing_file_path: self.backing_path.clone(),
            connected_since: self.connected_since,
            connected: self.connected,
            line_count: self.line_count,
        }
    }

    fn send(&self, event: LiveEvent) {
        // Consumer gone is not an error; the connection keeps capturing.
        let _ = self.events.send(event);
    }

    /// Split `residual` + `bytes` on `\n`, `\r`, `\r\n` and append every
    /// complete line to the backing file. Returns the lines appended.
    fn feed(&mut self, bytes: &[u8]) -> Result<u64> {
        if !self.connected {
            return Err(EngineError::invalid(format!(
                "connection '{}' is disconnected",
                self.id
            )));
        }
        self.residual.extend_from_slice(bytes);

        let mut appended = 0u64;
        let mut start = 0usize;
        let mut i = 0usize;
        let data = std::mem::take(&mut self.residual);
        while i < data.len() {
            match data[i] {
                b'\n' => {
                    self.write_line(&data[start..i])?;
                    appended += 1;
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    if i + 1 == data.len() {
                        // A bare trailing \r may be half of a split \r\n;
                        // hold it until the next chunk decides.
                        break;
                    }
                    self.write_line(&data[start..i])?;
                    appended += 1;
                    i += if data[i + 1] == b'\n' { 2 } else { 1 };
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.residual = data[start..].to_vec();

        // A producer that never terminates lines must not grow the buffer
        // without bound; flush the oversized fragment as one line.
        if self.residual.len() > MAX_LIVE_RESIDUAL_BYTES {
            tracing::warn!(
                connection = %self.id,
                bytes = self.residual.len(),
                "Residual buffer exceeded limit; flushing fragment as a line"
            );
            let fragment = std::mem::take(&mut self.residual);
            self.write_line(&fragment)?;
            appended += 1;
        }

        if appended > 0 {
            if let Some(file) = self.file.as_mut() {
                file.flush()
                    .map_err(|e| EngineError::io(&self.backing_path, "flush", e))?;
            }
            self.line_count += appended;
            self.send(LiveEvent::LinesAdded {
                connection_id: self.id.clone(),
                count: appended,
            });
        }
        Ok(appended)
    }

    /// Write one line prefixed with the wall-clock timestamp and an LF
    /// terminator.
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            EngineError::invalid(format!("connection '{}' has no open backing file", self.id))
        })?;
        let prefix = format!("{} ", Local::now().format(LIVE_TIMESTAMP_FORMAT));
        file.write_all(prefix.as_bytes())
            .and_then(|()| file.write_all(line))
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|e| EngineError::io(&self.backing_path, "write", e))
    }

    /// Graceful stop: flush any residual as a final line, close the file,
    /// emit `Disconnected`. The backing file survives.
    fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        if !self.residual.is_empty() {
            let fragment = std::mem::take(&mut self.residual);
            self.write_line(&fragment)?;
            self.line_count += 1;
            self.send(LiveEvent::LinesAdded {
                connection_id: self.id.clone(),
                count: 1,
            });
        }
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
        self.connected = false;
        self.send(LiveEvent::Disconnected {
            connection_id: self.id.clone(),
        });
        tracing::info!(connection = %self.id, lines = self.line_count, "Live connection closed");
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Tracks live connections and forwards their events to the consumer.
/// Enforces the process-wide connection cap.
pub struct ConnectionRegistry {
    connections: HashMap<String, LiveConnection>,
    capture_root: PathBuf,
    events_tx: mpsc::Sender<LiveEvent>,
    next_seq: u64,
}

impl ConnectionRegistry {
    /// Create a registry writing backing files under `capture_root`.
    /// Returns the registry and the receiver for all connection events.
    pub fn new(capture_root: PathBuf) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                connections: HashMap::new(),
                capture_root,
                events_tx: tx,
                next_seq: 1,
            },
            rx,
        )
    }

    /// Open a new connection and its backing file. Fails with `Capacity`
    /// when the concurrent-connection cap is reached.
    pub fn connect(
        &mut self,
        kind: SourceKind,
        display_name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Result<String> {
        let active = self.connections.values().filter(|c| c.connected).count();
        if active >= MAX_LIVE_CONNECTIONS {
            return Err(EngineError::Capacity {
                limit: MAX_LIVE_CONNECTIONS,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let id = format!("conn-{seq}");

        let dir = self.capture_root.join(format!("loglens-{kind}"));
        std::fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, "create_dir", e))?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let backing_path = dir.join(format!("{kind}_{seq}_{stamp}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&backing_path)
            .map_err(|e| EngineError::io(&backing_path, "open", e))?;

        tracing::info!(
            connection = %id,
            source = %kind,
            file = %backing_path.display(),
            "Live connection opened"
        );
        self.connections.insert(
            id.clone(),
            LiveConnection {
                id: id.clone(),
                kind,
                display_name: display_name.into(),
                detail: detail.into(),
                backing_path,
                file: Some(file),
                residual: Vec::new(),
                connected_since: Utc::now(),
                connected: true,
                line_count: 0,
                events: self.events_tx.clone(),
            },
        );
        Ok(id)
    }

    fn connection_mut(&mut self, id: &str) -> Result<&mut LiveConnection> {
        self.connections
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound {
                what: "live connection",
                key: id.to_string(),
            })
    }

    /// Deliver a producer byte chunk to a connection.
    pub fn feed(&mut self, id: &str, bytes: &[u8]) -> Result<u64> {
        self.connection_mut(id)?.feed(bytes)
    }

    /// Report a producer failure. A fatal failure also disconnects.
    pub fn producer_error(&mut self, id: &str, message: &str, fatal: bool) -> Result<()> {
        let connection = self.connection_mut(id)?;
        connection.send(LiveEvent::Error {
            connection_id: id.to_string(),
            message: message.to_string(),
        });
        tracing::warn!(connection = %id, error = %message, fatal, "Live producer error");
        if fatal {
            connection.disconnect()?;
        }
        Ok(())
    }

    /// Graceful caller-initiated disconnect; the backing file survives so
    /// the captured log can still be analysed.
    pub fn disconnect(&mut self, id: &str) -> Result<()> {
        self.connection_mut(id)?.disconnect()
    }

    /// Remove the connection and delete its backing file.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        {
            let connection = self.connection_mut(id)?;
            connection.disconnect()?;
        }
        let connection = self
            .connections
            .remove(id)
            .expect("checked by connection_mut");
        if connection.backing_path.exists() {
            std::fs::remove_file(&connection.backing_path)
                .map_err(|e| EngineError::io(&connection.backing_path, "remove", e))?;
        }
        tracing::info!(connection = %id, "Live connection removed");
        Ok(())
    }

    /// Snapshot of every tracked connection.
    pub fn list(&self) -> Vec<LiveConnectionInfo> {
        let mut infos: Vec<LiveConnectionInfo> =
            self.connections.values().map(|c| c.info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn info(&self, id: &str) -> Option<LiveConnectionInfo> {
        self.connections.get(id).map(|c| c.info())
    }

    /// Backing file path for a connection, for opening a `FileView` over
    /// the captured bytes.
    pub fn backing_path(&self, id: &str) -> Option<&Path> {
        self.connections.get(id).map(|c| c.backing_path.as_path())
    }
}
