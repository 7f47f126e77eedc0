//! Incremental UTF-8 decoding of process output.
//!
//! Output is forwarded chunk by chunk as the OS delivers it. A multi-byte
//! character can straddle two reads, so the trailing incomplete sequence of a
//! chunk is held back and prepended to the next one. Invalid bytes are
//! replaced with U+FFFD.

/// Stateful decoder for one output stream.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a freshly read chunk.
    ///
    /// Returns `None` when nothing printable is available yet (the chunk
    /// only contained the start of a multi-byte character).
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);
        let split = self.pending.len() - incomplete_tail_len(&self.pending);
        if split == 0 {
            return None;
        }
        let tail = self.pending.split_off(split);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        Some(text)
    }

    /// Flush whatever is left once the stream reached EOF.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(text)
    }
}

/// Length of a trailing multi-byte sequence that is cut short.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            // continuation byte, keep looking for the lead byte
            continue;
        }
        let needed = if byte & 0b1110_0000 == 0b1100_0000 {
            2
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            3
        } else if byte & 0b1111_1000 == 0b1111_0000 {
            4
        } else {
            1
        };
        return if needed > back { back } else { 0 };
    }
    0
}
