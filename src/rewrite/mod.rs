//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! fetched body
//!     → document.rs (parse, find text-bearing elements)
//!     → text.rs (locate six-character words)
//!     → sequencer.rs (next decoration symbol)
//!     → document.rs (serialize)
//! ```
//!
//! # Design Decisions
//! - One sequencer per process, injected; never a global
//! - Parsing is tolerant; only undecodable bodies fail
//! - Symbols are assigned in document order

pub mod document;
pub mod sequencer;
pub mod tags;
pub mod text;

use thiserror::Error;

pub use document::{ContentTransformer, Document, RewriteStats};
pub use sequencer::DecorationSequencer;
pub use tags::{TagSet, TextTag};
pub use text::TextRewriter;

/// Errors raised while building or running the rewriter.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// No decoration symbols were configured.
    #[error("decoration sequence is empty")]
    EmptyDecorations,

    /// Tag name outside the text-bearing set.
    #[error("unsupported text tag: {0}")]
    UnknownTag(String),

    /// The body could not be turned into a document.
    #[error("parse failure: {0}")]
    Parse(String),
}
