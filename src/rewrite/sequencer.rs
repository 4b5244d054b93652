//! Cyclic decoration source shared by every rewrite in the process.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::rewrite::RewriteError;

/// Hands out decoration symbols in a fixed order, wrapping forever.
///
/// The cursor is a single atomic counter, so concurrent callers each observe
/// a distinct index and none are skipped.
#[derive(Debug)]
pub struct DecorationSequencer {
    symbols: Vec<String>,
    cursor: AtomicUsize,
}

impl DecorationSequencer {
    pub fn new(symbols: Vec<String>) -> Result<Self, RewriteError> {
        if symbols.is_empty() {
            return Err(RewriteError::EmptyDecorations);
        }
        Ok(Self {
            symbols,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Return the symbol for the next call and advance the cursor.
    pub fn next(&self) -> &str {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.symbols[index % self.symbols.len()]
    }

    /// Find the configured symbol that `text` starts with, if any.
    pub fn leading_symbol(&self, text: &str) -> Option<&str> {
        self.symbols
            .iter()
            .find(|symbol| text.starts_with(symbol.as_str()))
            .map(String::as_str)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of symbols handed out so far.
    pub fn issued(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn faces() -> Vec<String> {
        vec!["😀".into(), "😍".into(), "😈".into()]
    }

    #[test]
    fn test_cycles_in_order() {
        let seq = DecorationSequencer::new(faces()).unwrap();
        let drawn: Vec<&str> = (0..7).map(|_| seq.next()).collect();
        assert_eq!(drawn, ["😀", "😍", "😈", "😀", "😍", "😈", "😀"]);
        assert_eq!(seq.issued(), 7);
    }

    #[test]
    fn test_rejects_empty_sequence() {
        assert!(matches!(
            DecorationSequencer::new(Vec::new()),
            Err(RewriteError::EmptyDecorations)
        ));
    }

    #[test]
    fn test_leading_symbol() {
        let seq = DecorationSequencer::new(faces()).unwrap();
        assert_eq!(seq.leading_symbol("😍, rest"), Some("😍"));
        assert_eq!(seq.leading_symbol("plain"), None);
    }

    #[test]
    fn test_concurrent_draws_are_balanced() {
        let seq = Arc::new(DecorationSequencer::new(faces()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = seq.clone();
                std::thread::spawn(move || {
                    (0..300).map(|_| seq.next().to_string()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for symbol in handle.join().unwrap() {
                *counts.entry(symbol).or_default() += 1;
            }
        }

        // 2400 draws over 3 symbols: any duplicated or skipped index would
        // unbalance the counts.
        assert_eq!(seq.issued(), 2400);
        for symbol in faces() {
            assert_eq!(counts[&symbol], 800);
        }
    }
}
