/// Line terminator every history entry carries.
pub const LINE_TERMINATOR: &[u8; 2] = b"\r\n";

/// Fixed-capacity circular byte store of CRLF-terminated lines.
///
/// `head == tail` is ambiguous between empty and full; `full` tells the two
/// apart. The bytes in `[head, tail)` always form whole lines: appends add a
/// whole line and eviction removes whole lines from the front.
///
/// Not synchronized. [`History`](super::History) keeps it behind its lock.
#[derive(Debug)]
pub struct HistoryBuffer {
    storage: Vec<u8>,
    head: usize,
    tail: usize,
    full: bool,
    missed: usize,
}

impl HistoryBuffer {
    /// Allocates `capacity` bytes up front. A zero capacity disables history.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity],
            head: 0,
            tail: 0,
            full: false,
            missed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Occupied bytes.
    pub fn len(&self) -> usize {
        if self.full {
            return self.capacity();
        }
        if self.tail >= self.head {
            self.tail - self.head
        } else {
            self.capacity() - (self.head - self.tail)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lines evicted or rejected since the last drain.
    pub fn missed(&self) -> usize {
        self.missed
    }

    /// Appends one CRLF-terminated line, evicting the oldest lines until it fits.
    ///
    /// A line longer than the whole buffer is rejected and counted as missed.
    pub fn append(&mut self, line: &[u8]) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }

        let need = line.len();
        if need > capacity {
            self.missed += 1;
            return;
        }

        while capacity - self.len() < need {
            self.evict_one_line();
        }

        let first = need.min(capacity - self.tail);
        self.storage[self.tail..self.tail + first].copy_from_slice(&line[..first]);
        if first < need {
            self.storage[..need - first].copy_from_slice(&line[first..]);
        }

        self.tail = (self.tail + need) % capacity;
        if need > 0 && self.tail == self.head {
            self.full = true;
        }
    }

    /// Removes the oldest line, up to and including its `\r\n`.
    fn evict_one_line(&mut self) {
        if self.is_empty() {
            return;
        }

        let capacity = self.capacity();
        let mut after_cr = false;
        while !self.is_empty() {
            let byte = self.storage[self.head];
            self.head = (self.head + 1) % capacity;
            self.full = false;
            if after_cr && byte == b'\n' {
                break;
            }
            after_cr = byte == b'\r';
        }
        self.missed += 1;
    }

    /// Linearizes the content oldest first and empties the buffer.
    ///
    /// `missed` is left alone; callers take it under the same lock with
    /// [`take_missed`](Self::take_missed).
    pub fn drain(&mut self) -> Vec<u8> {
        let used = self.len();
        let mut out = Vec::with_capacity(used);
        if used > 0 {
            if self.full || self.tail < self.head {
                out.extend_from_slice(&self.storage[self.head..]);
                out.extend_from_slice(&self.storage[..self.tail]);
            } else {
                out.extend_from_slice(&self.storage[self.head..self.tail]);
            }
        }

        self.head = self.tail;
        self.full = false;
        out
    }

    pub fn take_missed(&mut self) -> usize {
        std::mem::take(&mut self.missed)
    }

    /// Discards all content and resets the missed counter.
    pub fn clear(&mut self) {
        self.missed = 0;
        self.head = self.tail;
        self.full = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.extend_from_slice(LINE_TERMINATOR);
        bytes
    }

    fn lines_of(bytes: &[u8]) -> Vec<String> {
        if bytes.is_empty() {
            return Vec::new();
        }
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_suffix("\r\n").unwrap_or(&text);
        text.split("\r\n").map(str::to_string).collect()
    }

    #[test]
    fn new_buffer_is_empty() {
        let buffer = HistoryBuffer::new(16);
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.missed(), 0);
    }

    #[test]
    fn append_tracks_occupancy() {
        let mut buffer = HistoryBuffer::new(32);
        buffer.append(&line("abc"));
        buffer.append(&line("de"));
        assert_eq!(buffer.len(), 9);
        assert_eq!(buffer.drain(), b"abc\r\nde\r\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn exact_fit_marks_full() {
        let mut buffer = HistoryBuffer::new(10);
        buffer.append(&line("abc"));
        buffer.append(&line("def"));
        assert_eq!(buffer.len(), 10);
        assert!(buffer.full);
        assert_eq!(buffer.head, buffer.tail);
        assert_eq!(lines_of(&buffer.drain()), vec!["abc", "def"]);
        assert_eq!(buffer.missed(), 0);
    }

    #[test]
    fn eviction_drops_oldest_whole_lines() {
        let mut buffer = HistoryBuffer::new(12);
        buffer.append(&line("aaa"));
        buffer.append(&line("bbb"));
        buffer.append(&line("cc"));

        // "cc" needs 4 bytes, only 2 free: "aaa" goes.
        assert_eq!(buffer.missed(), 1);
        assert_eq!(buffer.len(), 9);
        assert_eq!(lines_of(&buffer.drain()), vec!["bbb", "cc"]);
    }

    #[test]
    fn eviction_can_drop_several_lines_for_one_append() {
        let mut buffer = HistoryBuffer::new(12);
        buffer.append(&line("a"));
        buffer.append(&line("b"));
        buffer.append(&line("c"));
        buffer.append(&line("d"));
        buffer.append(&line("0123456"));

        assert_eq!(buffer.missed(), 3);
        assert_eq!(lines_of(&buffer.drain()), vec!["d", "0123456"]);
    }

    #[test]
    fn wrapped_content_drains_in_order() {
        let mut buffer = HistoryBuffer::new(10);
        buffer.append(&line("ab"));
        buffer.append(&line("cd"));
        buffer.append(&line("ef"));

        // "ef" wrapped around the end of storage.
        assert!(buffer.tail < buffer.head);
        assert_eq!(buffer.len(), 8);
        assert_eq!(lines_of(&buffer.drain()), vec!["cd", "ef"]);
        assert_eq!(buffer.take_missed(), 1);
    }

    #[test]
    fn oversized_line_is_rejected() {
        let mut buffer = HistoryBuffer::new(8);
        buffer.append(&line("ok"));
        buffer.append(&line("far too long"));

        assert_eq!(buffer.missed(), 1);
        assert_eq!(lines_of(&buffer.drain()), vec!["ok"]);
    }

    #[test]
    fn line_of_exactly_capacity_fits() {
        let mut buffer = HistoryBuffer::new(6);
        buffer.append(&line("x"));
        buffer.append(&line("full"));

        assert_eq!(buffer.missed(), 1);
        assert_eq!(buffer.len(), 6);
        assert_eq!(lines_of(&buffer.drain()), vec!["full"]);
    }

    #[test]
    fn zero_capacity_ignores_appends() {
        let mut buffer = HistoryBuffer::new(0);
        buffer.append(&line("anything"));
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.missed(), 0);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn unterminated_content_evicts_to_empty() {
        let mut buffer = HistoryBuffer::new(8);
        buffer.append(b"abcdef");
        buffer.evict_one_line();
        assert!(buffer.is_empty());
        assert_eq!(buffer.missed(), 1);
    }

    #[test]
    fn evict_on_empty_is_noop() {
        let mut buffer = HistoryBuffer::new(8);
        buffer.evict_one_line();
        assert_eq!(buffer.missed(), 0);
    }

    #[test]
    fn drain_keeps_missed_until_taken() {
        let mut buffer = HistoryBuffer::new(6);
        buffer.append(&line("aa"));
        buffer.append(&line("bb"));
        let _ = buffer.drain();
        assert_eq!(buffer.missed(), 1);
        assert_eq!(buffer.take_missed(), 1);
        assert_eq!(buffer.missed(), 0);
    }

    #[test]
    fn clear_resets_content_and_missed() {
        let mut buffer = HistoryBuffer::new(6);
        buffer.append(&line("aa"));
        buffer.append(&line("bb"));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.missed(), 0);

        buffer.append(&line("cc"));
        assert_eq!(lines_of(&buffer.drain()), vec!["cc"]);
    }

    #[test]
    fn clear_on_empty_buffer_is_noop() {
        let mut buffer = HistoryBuffer::new(6);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.missed(), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn occupancy_never_exceeds_capacity_and_matches_retained_lines(
                capacity in 1usize..64,
                texts in prop::collection::vec("[a-z]{0,12}", 0..80),
            ) {
                let mut buffer = HistoryBuffer::new(capacity);
                for text in &texts {
                    buffer.append(&line(text));
                    prop_assert!(buffer.len() <= capacity);
                }
                let occupied = buffer.len();
                let drained = buffer.drain();
                prop_assert_eq!(drained.len(), occupied);
                prop_assert!(buffer.is_empty());
            }

            #[test]
            fn retained_plus_missed_accounts_for_every_line(
                capacity in 1usize..64,
                texts in prop::collection::vec("[a-z]{0,12}", 0..80),
            ) {
                let mut buffer = HistoryBuffer::new(capacity);
                for text in &texts {
                    buffer.append(&line(text));
                }
                let retained = lines_of(&buffer.drain());
                let missed = buffer.take_missed();
                prop_assert_eq!(retained.len() + missed, texts.len());

                // Retained lines are the newest fitting ones, in order.
                let fitting: Vec<&String> = texts.iter().filter(|t| t.len() + 2 <= capacity).collect();
                let newest = &fitting[fitting.len() - retained.len()..];
                prop_assert_eq!(retained.iter().collect::<Vec<_>>(), newest.to_vec());
            }

            #[test]
            fn fitting_line_always_survives_its_own_append(
                capacity in 2usize..64,
                texts in prop::collection::vec("[a-z]{0,12}", 1..40),
            ) {
                let mut buffer = HistoryBuffer::new(capacity);
                for text in &texts {
                    let entry = line(text);
                    buffer.append(&entry);
                    if entry.len() <= capacity {
                        let drained = buffer.drain();
                        prop_assert!(drained.ends_with(&entry));
                        buffer.append(&drained[drained.len() - entry.len()..]);
                    }
                }
            }

            #[test]
            fn oversized_line_leaves_buffer_unchanged(
                capacity in 2usize..32,
                texts in prop::collection::vec("[a-z]{0,6}", 0..10),
            ) {
                let mut buffer = HistoryBuffer::new(capacity);
                for text in &texts {
                    buffer.append(&line(text));
                }
                let before_len = buffer.len();
                let before_missed = buffer.missed();

                buffer.append(&vec![b'x'; capacity + 1]);

                prop_assert_eq!(buffer.len(), before_len);
                prop_assert_eq!(buffer.missed(), before_missed + 1);
            }
        }
    }
}
