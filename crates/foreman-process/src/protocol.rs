//! Line-delimited JSON protocol for worker processes.
//!
//! Every message is one [`Action`] serialized as a single JSON object and
//! terminated by `\n`. The supervisor writes to the child's stdin and reads
//! the child's stdout; the child does the opposite. Blank lines are skipped.

use foreman_core::Action;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::error::ProcessError;

/// Serialize an action to one wire line (without the trailing newline).
pub fn encode_line(action: &Action) -> Result<String, ProcessError> {
    Ok(serde_json::to_string(action)?)
}

/// Parse one wire line into an action.
///
/// Malformed input yields [`ProcessError::ProtocolError`] carrying a preview
/// of the offending line.
pub fn decode_line(line: &str) -> Result<Action, ProcessError> {
    serde_json::from_str(line.trim()).map_err(|e| {
        // Keep the first 200 chars for diagnostics
        let preview: String = line.trim().chars().take(200).collect();
        ProcessError::ProtocolError(format!("{e} in {preview:?}"))
    })
}

/// Reads actions from a line-oriented byte stream.
pub struct LineReader<R> {
    reader: BufReader<R>,
    line: String,
    lines_read: u64,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
            lines_read: 0,
        }
    }

    /// Read the next action.
    ///
    /// Returns `Ok(None)` at end of stream. A malformed line returns
    /// `Err(ProcessError::ProtocolError)`; the reader stays usable and the
    /// caller may keep reading.
    pub async fn read_action(&mut self) -> Result<Option<Action>, ProcessError> {
        loop {
            self.line.clear();
            let bytes_read = self.reader.read_line(&mut self.line).await?;
            if bytes_read == 0 {
                return Ok(None);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            self.lines_read += 1;
            trace!(line_num = self.lines_read, "Raw line: {}", trimmed);
            return decode_line(trimmed).map(Some);
        }
    }

    /// Number of non-empty lines read so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

/// Writes actions to a line-oriented byte stream.
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one action and flush it.
    pub async fn write_action(&mut self, action: &Action) -> Result<(), ProcessError> {
        let json = encode_line(action)?;
        trace!("Writing line: {}", json);
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
