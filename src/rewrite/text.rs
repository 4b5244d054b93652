//! Six-character word decoration for plain text.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rewrite::sequencer::DecorationSequencer;

/// A maximal run of exactly six word characters.
pub const QUALIFYING_WORD: &str = r"\b\w{6}\b";

static RE_QUALIFYING_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(QUALIFYING_WORD).expect("valid regex"));
static RE_WORD_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w").expect("valid regex"));

/// A point in the text where `" " + symbol` is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion<'a> {
    /// Byte offset just past the qualifying token.
    pub offset: usize,
    pub symbol: &'a str,
}

/// Inserts a decoration after every qualifying word, drawing symbols from
/// the shared sequencer left to right.
#[derive(Debug, Clone)]
pub struct TextRewriter {
    sequencer: Arc<DecorationSequencer>,
}

impl TextRewriter {
    pub fn new(sequencer: Arc<DecorationSequencer>) -> Self {
        Self { sequencer }
    }

    pub fn sequencer(&self) -> &DecorationSequencer {
        &self.sequencer
    }

    /// Decide where decorations go in `text`, consuming one symbol per
    /// qualifying token in order of appearance.
    ///
    /// Tokens already followed by a space and a configured symbol are
    /// skipped, which keeps repeated rewrites from growing the text.
    pub fn plan(&self, text: &str) -> Vec<Insertion<'_>> {
        RE_QUALIFYING_WORD
            .find_iter(text)
            .filter(|token| !self.is_decorated(&text[token.end()..]))
            .map(|token| Insertion {
                offset: token.end(),
                symbol: self.sequencer.next(),
            })
            .collect()
    }

    pub fn rewrite(&self, text: &str) -> String {
        let insertions = self.plan(text);
        apply(text, &insertions)
    }

    fn is_decorated(&self, rest: &str) -> bool {
        rest.strip_prefix(' ')
            .and_then(|after| self.sequencer.leading_symbol(after))
            .is_some()
    }
}

/// Splice planned insertions into `text`. Offsets must be ascending.
pub fn apply(text: &str, insertions: &[Insertion<'_>]) -> String {
    let extra: usize = insertions.iter().map(|i| i.symbol.len() + 1).sum();
    let mut out = String::with_capacity(text.len() + extra);
    let mut last = 0;
    for insertion in insertions {
        out.push_str(&text[last..insertion.offset]);
        out.push(' ');
        out.push_str(insertion.symbol);
        last = insertion.offset;
    }
    out.push_str(&text[last..]);
    out
}

/// True if `text` contains a character the word pattern would consume.
pub fn contains_word_char(text: &str) -> bool {
    RE_WORD_CHAR.is_match(text)
}
