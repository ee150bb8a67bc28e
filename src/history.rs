/// Lines entered during this session, oldest first, plus the recall cursor
/// used by the line editor's up/down arrows.
///
/// Entries are never removed, reordered or edited. The cursor ranges over
/// `0..=len()`, where `len()` means "past the newest entry".
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    cursor: usize,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    /// Records a submitted line and moves the cursor past it.
    /// Empty lines are not recorded.
    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.entries.push(text.to_string());
        self.cursor = self.entries.len();
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Points the cursor past the newest entry.
    pub fn rewind(&mut self) {
        self.cursor = self.entries.len();
    }

    /// Steps toward the oldest entry. `None` when already there.
    pub fn older(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.get(self.cursor)
    }

    /// Steps toward the newest entry. Stepping past the newest entry yields
    /// an empty line; `None` when the cursor is already past it.
    pub fn newer(&mut self) -> Option<&str> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        if self.cursor == self.entries.len() {
            Some("")
        } else {
            self.get(self.cursor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_moves_cursor_past_newest() {
        let mut history = History::new();
        history.append("ls");
        history.append("");
        history.append("echo hi");
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.get(0), Some("ls"));
        assert_eq!(history.get(1), Some("echo hi"));
        assert_eq!(history.get(2), None);
    }

    #[test]
    fn test_recall_walks_both_ways() {
        let mut history = History::new();
        for line in ["one", "two", "three"] {
            history.append(line);
        }
        assert_eq!(history.older(), Some("three"));
        assert_eq!(history.older(), Some("two"));
        assert_eq!(history.older(), Some("one"));
        assert_eq!(history.older(), None);
        assert_eq!(history.newer(), Some("two"));
        assert_eq!(history.newer(), Some("three"));
        assert_eq!(history.newer(), Some(""));
        assert_eq!(history.newer(), None);
    }

    #[test]
    fn test_growth_preserves_entries() {
        let mut history = History::new();
        for i in 0..1000 {
            history.append(&format!("cmd {}", i));
        }
        assert_eq!(history.len(), 1000);
        for i in 0..1000 {
            assert_eq!(history.get(i), Some(format!("cmd {}", i).as_str()));
        }
    }
}
