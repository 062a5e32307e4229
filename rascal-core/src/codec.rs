//! Newline-delimited JSON framing for channel items.
//!
//! One item per line. Lines never contain a raw newline because JSON
//! string encoding escapes it.

use std::io::Write;

use crate::{ChannelItem, Error, Result};

/// Encodes an item as a single line, without the trailing newline.
///
/// # Errors
/// Returns an error if the item cannot be serialised.
pub fn encode_frame(item: &ChannelItem) -> Result<String> {
    Ok(serde_json::to_string(item)?)
}

/// Decodes one line back into an item. Surrounding whitespace is ignored.
///
/// # Errors
/// Returns [`Error::EmptyFrame`] for a blank line, or a codec error if the
/// line is not a channel item.
pub fn decode_frame(line: &str) -> Result<ChannelItem> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Error::EmptyFrame);
    }
    Ok(serde_json::from_str(line)?)
}

/// Writes frames to the producer end of a channel.
///
/// Every frame is flushed as soon as it is written so the reader sees it
/// while the engine is still running.
pub struct FrameWriter<W: Write> {
    inner: W,
    frames_written: usize,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frames_written: 0,
        }
    }

    /// Writes and flushes one item.
    ///
    /// # Errors
    /// Returns an error if encoding or the underlying write fails.
    pub fn push(&mut self, item: &ChannelItem) -> Result<()> {
        let line = encode_frame(item)?;
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
