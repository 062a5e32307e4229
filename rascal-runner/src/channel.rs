//! Consumer end of the worker channel.
//!
//! A reader thread turns the worker's stdout into a queue of decoded
//! items. The owning thread drains that queue without blocking: it pushes
//! a sentinel, then takes items until it meets the sentinel or the drain
//! timeout expires. Items the worker writes while a drain is in progress
//! land behind the sentinel and are picked up by the next drain.

use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rascal_core::{decode_frame, ChannelItem, Error as CoreError};

/// Queue entries seen by the consumer.
enum Slot {
    Item(ChannelItem),
    /// Drain boundary written by the consumer itself.
    Sentinel(u64),
    /// The worker closed its end of the channel.
    Eof,
}

/// Receiving side of one run's channel.
pub struct Channel {
    rx: Receiver<Slot>,
    sentinel_tx: Sender<Slot>,
    reader: Option<JoinHandle<()>>,
    next_sentinel: u64,
    closed: bool,
}

impl Channel {
    /// Starts reading frames from `source` on a background thread.
    pub fn open<R: Read + Send + 'static>(source: R) -> Self {
        let (tx, rx) = channel();
        let sentinel_tx = tx.clone();
        let reader = thread::Builder::new()
            .name("rascal-channel".to_string())
            .spawn(move || read_frames(source, &tx))
            .map_err(|e| log::error!("could not start channel reader: {e}"))
            .ok();

        Self {
            rx,
            sentinel_tx,
            closed: reader.is_none(),
            reader,
            next_sentinel: 0,
        }
    }

    /// Takes every item currently available, in FIFO order.
    ///
    /// Returns immediately when nothing is queued. Never waits longer than
    /// `timeout`.
    pub fn drain(&mut self, timeout: Duration) -> Vec<ChannelItem> {
        let marker = self.next_sentinel;
        self.next_sentinel += 1;
        // The receiver is alive as long as `self` is, so this cannot fail.
        let _ = self.sentinel_tx.send(Slot::Sentinel(marker));

        let deadline = Instant::now() + timeout;
        let mut items = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(Slot::Item(item)) => items.push(item),
                Ok(Slot::Eof) => self.closed = true,
                Ok(Slot::Sentinel(seen)) if seen == marker => break,
                // Left over from a drain that timed out.
                Ok(Slot::Sentinel(_)) => {}
                Err(RecvTimeoutError::Timeout) => {
                    log::debug!("channel drain timed out after {} items", items.len());
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        items
    }

    /// Whether the worker has closed its end and every frame it wrote has
    /// been drained.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the channel.
    ///
    /// The reader thread is joined only if the worker's end is already
    /// closed; otherwise it is left to exit on its own once the pipe closes,
    /// since a descendant of the worker may still hold it open.
    pub fn close(mut self) {
        if let Some(reader) = self.reader.take() {
            if self.closed {
                if reader.join().is_err() {
                    log::warn!("channel reader panicked");
                }
            } else {
                log::debug!("detaching channel reader with pipe still open");
            }
        }
    }
}

fn read_frames<R: Read>(source: R, tx: &Sender<Slot>) {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("channel read failed: {e}");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        match decode_frame(&line) {
            Ok(item) => {
                if tx.send(Slot::Item(item)).is_err() {
                    // Consumer gone; nothing left to deliver to.
                    return;
                }
            }
            Err(CoreError::EmptyFrame) => {}
            Err(e) => log::warn!("ignoring non-protocol worker output ({e}): {}", line.trim_end()),
        }
    }
    let _ = tx.send(Slot::Eof);
}
