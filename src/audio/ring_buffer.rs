//! Shared audio stream: a fixed-capacity, multi-reader ring buffer.
//!
//! One writer feeds raw audio words to up to `max_readers` independent
//! consumers (wake-word detector, capture pipeline). The writer never blocks:
//! a reader that falls more than the requested word count behind observes an
//! overrun on its next read and is resynchronized to the writer's position.
//! Data loss is visible to the reader, never silently hidden.
//!
//! No locks on the data path: one atomic writer cursor, per-reader cursors,
//! and atomic word storage. Cursors are absolute monotonic positions; the
//! storage index is `position % capacity`.

use crate::error::{Result, VoicegateError};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, Ordering};

/// Error observed by a stream reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamReadError {
    /// The reader fell too far behind and its cursor was reset to the
    /// writer's current position. `lost` words were skipped.
    Overrun { lost: u64 },
}

impl fmt::Display for StreamReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamReadError::Overrun { lost } => {
                write!(f, "Stream overrun: {} words lost", lost)
            }
        }
    }
}

impl std::error::Error for StreamReadError {}

struct StreamInner {
    data: Box<[AtomicI16]>,
    /// Requested capacity: the maximum lag any reader may accumulate.
    word_count: u64,
    /// Allocated words: `word_count` plus one word of slack so a reader at
    /// maximum lag never races the writer on the word it is copying.
    capacity: u64,
    write_pos: AtomicU64,
    writer_claimed: AtomicBool,
    reader_slots: Box<[AtomicBool]>,
}

/// Fixed-capacity multi-reader audio transport between capture and consumers.
#[derive(Clone)]
pub struct SharedAudioStream {
    inner: Arc<StreamInner>,
}

impl SharedAudioStream {
    /// Creates a stream holding `word_count` audio words readable by up to
    /// `max_readers` concurrent readers.
    ///
    /// The allocation reserves one word of slack beyond `word_count` so that
    /// every reader can lag the writer by the full requested word count
    /// without data loss.
    pub fn new(word_count: usize, max_readers: usize) -> Result<Self> {
        if word_count == 0 {
            return Err(VoicegateError::InvalidStreamSize {
                message: "word_count must be non-zero".to_string(),
            });
        }
        if max_readers == 0 {
            return Err(VoicegateError::InvalidStreamSize {
                message: "max_readers must be non-zero".to_string(),
            });
        }

        let capacity = word_count + 1;
        let data = (0..capacity).map(|_| AtomicI16::new(0)).collect();
        let reader_slots = (0..max_readers).map(|_| AtomicBool::new(false)).collect();

        Ok(Self {
            inner: Arc::new(StreamInner {
                data,
                word_count: word_count as u64,
                capacity: capacity as u64,
                write_pos: AtomicU64::new(0),
                writer_claimed: AtomicBool::new(false),
                reader_slots,
            }),
        })
    }

    /// Claims the stream's single writer. Fails on the second call.
    pub fn writer(&self) -> Result<StreamWriter> {
        if self.inner.writer_claimed.swap(true, Ordering::SeqCst) {
            return Err(VoicegateError::WriterAlreadyClaimed);
        }
        Ok(StreamWriter {
            inner: self.inner.clone(),
        })
    }

    /// Creates a new reader positioned at the writer's current position.
    ///
    /// Fails with `ReaderLimitExceeded` once `max_readers` readers exist.
    pub fn reader(&self) -> Result<StreamReader> {
        for (slot, used) in self.inner.reader_slots.iter().enumerate() {
            if !used.swap(true, Ordering::SeqCst) {
                return Ok(StreamReader {
                    pos: self.inner.write_pos.load(Ordering::Acquire),
                    slot,
                    inner: self.inner.clone(),
                });
            }
        }
        Err(VoicegateError::ReaderLimitExceeded {
            max: self.inner.reader_slots.len(),
        })
    }

    /// The writer's current absolute position (total words ever written).
    pub fn write_position(&self) -> u64 {
        self.inner.write_pos.load(Ordering::Acquire)
    }

    /// Maximum number of concurrent readers.
    pub fn max_readers(&self) -> usize {
        self.inner.reader_slots.len()
    }

    /// Requested stream capacity in words.
    pub fn word_count(&self) -> u64 {
        self.inner.word_count
    }
}

/// The stream's single writer. Writes never block.
pub struct StreamWriter {
    inner: Arc<StreamInner>,
}

impl StreamWriter {
    /// Appends `words` to the stream, overwriting the oldest data if
    /// necessary, and returns the number of words written (always all of
    /// them — the writer never waits on readers).
    pub fn write(&mut self, words: &[i16]) -> usize {
        let pos = self.inner.write_pos.load(Ordering::Relaxed);
        for (i, &word) in words.iter().enumerate() {
            let index = ((pos + i as u64) % self.inner.capacity) as usize;
            self.inner.data[index].store(word, Ordering::Relaxed);
        }
        self.inner
            .write_pos
            .store(pos + words.len() as u64, Ordering::Release);
        words.len()
    }

    /// The writer's current absolute position.
    pub fn position(&self) -> u64 {
        self.inner.write_pos.load(Ordering::Relaxed)
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        self.inner.writer_claimed.store(false, Ordering::SeqCst);
    }
}

/// One independent reader cursor over the shared stream.
pub struct StreamReader {
    inner: Arc<StreamInner>,
    slot: usize,
    pos: u64,
}

impl StreamReader {
    /// Reads up to `buf.len()` words without blocking.
    ///
    /// Returns `Ok(0)` when the reader is caught up with the writer. Returns
    /// `Err(Overrun { lost })` when the cursor fell more than the stream's
    /// word count behind; the cursor is then reset to the writer's current
    /// position so the next read starts from live data.
    pub fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, StreamReadError> {
        let write_pos = self.inner.write_pos.load(Ordering::Acquire);
        if write_pos - self.pos > self.inner.word_count {
            let lost = write_pos - self.pos;
            self.pos = write_pos;
            return Err(StreamReadError::Overrun { lost });
        }

        let available = (write_pos - self.pos).min(buf.len() as u64) as usize;
        for (i, slot) in buf.iter_mut().enumerate().take(available) {
            let index = ((self.pos + i as u64) % self.inner.capacity) as usize;
            *slot = self.inner.data[index].load(Ordering::Relaxed);
        }

        // The writer may have lapped the region we just copied. Re-check and
        // report the tear as an overrun rather than returning garbled words.
        let write_pos_after = self.inner.write_pos.load(Ordering::Acquire);
        if write_pos_after - self.pos > self.inner.word_count {
            let lost = write_pos_after - self.pos;
            self.pos = write_pos_after;
            return Err(StreamReadError::Overrun { lost });
        }

        self.pos += available as u64;
        Ok(available)
    }

    /// Moves the cursor to an absolute position, clamped to the writer's
    /// current position.
    pub fn seek(&mut self, position: u64) {
        let write_pos = self.inner.write_pos.load(Ordering::Acquire);
        self.pos = position.min(write_pos);
    }

    /// The reader's current absolute position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// The writer's current absolute position.
    pub fn write_position(&self) -> u64 {
        self.inner.write_pos.load(Ordering::Acquire)
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.inner.reader_slots[self.slot].store(false, Ordering::SeqCst);
    }
}
