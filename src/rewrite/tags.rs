//! Text-bearing element types eligible for rewriting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rewrite::RewriteError;

/// Block-level elements whose text is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTag {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    P,
    Li,
    Code,
    Dd,
}

impl TextTag {
    pub const ALL: [TextTag; 10] = [
        TextTag::H1,
        TextTag::H2,
        TextTag::H3,
        TextTag::H4,
        TextTag::H5,
        TextTag::H6,
        TextTag::P,
        TextTag::Li,
        TextTag::Code,
        TextTag::Dd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextTag::H1 => "h1",
            TextTag::H2 => "h2",
            TextTag::H3 => "h3",
            TextTag::H4 => "h4",
            TextTag::H5 => "h5",
            TextTag::H6 => "h6",
            TextTag::P => "p",
            TextTag::Li => "li",
            TextTag::Code => "code",
            TextTag::Dd => "dd",
        }
    }

    /// Map a parsed element's local name to a tag. Anything else is `None`.
    pub fn from_local_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == name)
    }
}

impl FromStr for TextTag {
    type Err = RewriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_local_name(&s.to_ascii_lowercase())
            .ok_or_else(|| RewriteError::UnknownTag(s.to_string()))
    }
}

impl fmt::Display for TextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The configured allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<TextTag>,
}

impl TagSet {
    pub fn new(tags: impl IntoIterator<Item = TextTag>) -> Self {
        let mut tags: Vec<TextTag> = tags.into_iter().collect();
        tags.sort();
        tags.dedup();
        Self { tags }
    }

    /// True if an element with this local name should be rewritten.
    pub fn matches(&self, local_name: &str) -> bool {
        TextTag::from_local_name(local_name).is_some_and(|tag| self.tags.contains(&tag))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for TagSet {
    fn default() -> Self {
        Self::new(TextTag::ALL)
    }
}
