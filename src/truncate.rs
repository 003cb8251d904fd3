//! Character-length truncation applied to request text before inference.
//!
//! Each capability carries its own policy. Truncation is a silent prefix cut
//! on a character boundary, never an error.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationPolicy {
    /// Text passes through untouched.
    Unbounded,
    /// Keep at most this many characters.
    MaxChars(usize),
}

impl TruncationPolicy {
    pub fn max_chars(limit: usize) -> Self {
        Self::MaxChars(limit)
    }

    /// Cut `text` to the policy limit. Borrows when nothing is removed.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match *self {
            Self::Unbounded => Cow::Borrowed(text),
            Self::MaxChars(limit) => match text.char_indices().nth(limit) {
                Some((byte_idx, _)) => Cow::Owned(text[..byte_idx].to_string()),
                None => Cow::Borrowed(text),
            },
        }
    }

    pub fn apply_all(&self, texts: &[String]) -> Vec<String> {
        texts.iter().map(|t| self.apply(t).into_owned()).collect()
    }
}
