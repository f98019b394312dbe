use std::ops::Range;

use derive_more::derive::{AsMut, AsRef, Deref, DerefMut, From};

/// A byte range in the source text.
#[derive(Default, Clone, Debug, PartialEq, Eq, Hash, Deref, DerefMut, AsRef, AsMut, From)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Span(Range<usize>);

impl Span {
    pub fn new(range: Range<usize>) -> Self {
        Self(range)
    }
    pub fn empty(offset: usize) -> Self {
        Self(offset..offset)
    }
    pub fn range(&self) -> Range<usize> {
        self.0.clone()
    }
    pub fn extend(&self, other: &Span) -> Self {
        Self(self.start..other.end)
    }
    /// `true` if `other` lies entirely inside this span.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
