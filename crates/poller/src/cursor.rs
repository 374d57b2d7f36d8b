use herald_common::types::Cursor;

/// In-memory holder of the last-seen review watermark.
///
/// Starts empty, so the first poll is sent without a cursor. Only the poll
/// loop writes to it, once per `Found` batch.
#[derive(Debug, Default)]
pub struct CursorStore {
    current: Option<Cursor>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known watermark instead of the beginning.
    pub fn starting_at(cursor: Cursor) -> Self {
        Self {
            current: Some(cursor),
        }
    }

    pub fn current(&self) -> Option<&Cursor> {
        self.current.as_ref()
    }

    /// Replace the watermark with the value from the latest `Found` response.
    ///
    /// The server guarantees monotonic values; nothing is checked here.
    pub fn advance(&mut self, next: Cursor) {
        tracing::debug!(
            from = self.current.as_ref().map(Cursor::as_str),
            to = next.as_str(),
            "Advancing review cursor"
        );
        self.current = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let store = CursorStore::new();
        assert_eq!(store.current(), None);
    }

    #[test]
    fn test_advance_replaces_value() {
        let mut store = CursorStore::starting_at(Cursor::from(100));
        store.advance(Cursor::new("1555493856.1"));
        assert_eq!(store.current(), Some(&Cursor::new("1555493856.1")));
    }
}
