//! Newline-delimited JSON framing.
//!
//! One UTF-8 JSON object per line, terminated by `\n`; `\r\n` is
//! tolerated on read. Servers occasionally print banner text on stdout;
//! those lines are not lost but handed back as noise so the runner can
//! attach them to the current test as diagnostics.

use crate::mcp::protocol::Frame;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Outcome of classifying one line read off the server's stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// A complete JSON-RPC frame.
    Frame(Frame),
    /// A blank line; skipped.
    Blank,
    /// Anything else: unparseable JSON or JSON that is not a JSON-RPC
    /// message. Recorded as a diagnostic, then discarded.
    Noise(String),
}

/// Classifies one line (without its terminator).
#[must_use]
pub fn classify_line(line: &str) -> Line {
    let trimmed = line.trim_end_matches('\r').trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => match Frame::classify(value) {
            Some(frame) => Line::Frame(frame),
            None => Line::Noise(trimmed.to_string()),
        },
        Err(_) => Line::Noise(trimmed.to_string()),
    }
}

/// Serializes one frame as a single line and flushes.
///
/// `serde_json::to_string` never emits raw newlines (they are escaped
/// inside strings), so the frame is guaranteed to occupy exactly one
/// line.
///
/// # Errors
///
/// Propagates I/O errors from the underlying writer.
pub async fn write_frame<W>(writer: &mut W, frame: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let data = serde_json::to_string(frame)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_all(data.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
