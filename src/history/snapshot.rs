/// A consistent pair of screen text and drained history.
///
/// `history` holds every line that scrolled off before `screen` was rendered,
/// oldest first, each terminated by `\r\n`. `missed` counts lines that were
/// evicted or rejected since the previous drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub screen: Vec<String>,
    pub history: Vec<u8>,
    pub missed: usize,
}

impl Snapshot {
    /// Splits `history` into lines, dropping terminators. Invalid UTF-8 is replaced.
    pub fn history_lines(&self) -> Vec<String> {
        if self.history.is_empty() {
            return Vec::new();
        }
        let text = String::from_utf8_lossy(&self.history);
        let text = text.strip_suffix("\r\n").unwrap_or(&text);
        text.split("\r\n").map(str::to_string).collect()
    }

    /// Number of scrolled-off lines this snapshot accounts for, retained or missed.
    pub fn accounted_lines(&self) -> usize {
        self.history
            .windows(2)
            .filter(|pair| pair == b"\r\n")
            .count()
            + self.missed
    }
}
