//! A [`SpannedError`] is the error type returned by `Parser::parse*` functions.

use std::fmt::Display;

use annotate_snippets::*;
use itertools::Itertools;
use thiserror::Error;

use crate::span::Span;

#[derive(Error, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ParseError {
    #[error("invalid token")]
    LexicalMismatch,
    #[error("unexpected input while parsing {rule}, expected {}", .expected.iter().format(", "))]
    AlternativeExhausted {
        rule: String,
        expected: Vec<String>,
    },
    #[error("unterminated directive `{0}`, missing `#endif`")]
    UnterminatedDirective(String),
    #[error("recursion limit of {0} exceeded")]
    RecursionLimitExceeded(usize),
    #[error("cannot evaluate condition: {0}")]
    InvalidCondition(String),
}

/// A parse error located in the source text.
#[derive(Error, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[error("{error} at {span}")]
pub struct Error {
    pub error: ParseError,
    pub span: Span,
}

impl Error {
    pub fn new(error: ParseError, span: Span) -> Self {
        Self { error, span }
    }

    /// 1-based line and column of the start of the error.
    ///
    /// ```rust
    /// # use sdsl_parse::error::{Error, ParseError};
    /// let err = Error::new(ParseError::LexicalMismatch, (5..6).into());
    /// assert_eq!(err.line_col("ab\ncd$"), (2, 3));
    /// ```
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let offset = self.span.start.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let col = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        (line, col)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpannedError<'s> {
    inner: Error,
    source: &'s str,
}

impl<'s> SpannedError<'s> {
    pub(crate) fn new(inner: Error, source: &'s str) -> Self {
        Self { inner, source }
    }

    pub fn error(&self) -> &Error {
        &self.inner
    }

    pub fn source_text(&self) -> &'s str {
        self.source
    }

    pub fn into_owned(self) -> Error {
        self.inner
    }
}

impl<'s> std::error::Error for SpannedError<'s> {}

impl<'s> Display for SpannedError<'s> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = self.source;
        let span = &self.inner.span;
        let renderer = Renderer::styled();

        // annotations must fall on char boundaries
        let start = span.start.min(source.len());
        let end = (span.end.max(start)..=source.len())
            .find(|e| source.is_char_boundary(*e))
            .unwrap_or(source.len());

        let title = self.inner.error.to_string();
        let label = match &self.inner.error {
            ParseError::LexicalMismatch => "this token is unknown".to_string(),
            ParseError::AlternativeExhausted { expected, .. } if start == source.len() => {
                format!("expected {}, found end of file", expected.iter().format(", "))
            }
            ParseError::AlternativeExhausted { expected, .. } => {
                format!(
                    "expected {}, found `{}`",
                    expected.iter().format(", "),
                    &source[start..end]
                )
            }
            ParseError::UnterminatedDirective(_) => "this block is never closed".to_string(),
            ParseError::RecursionLimitExceeded(_) => "nesting is too deep here".to_string(),
            ParseError::InvalidCondition(_) => "in this condition".to_string(),
        };

        let message = Level::Error.title(&title).snippet(
            Snippet::source(source)
                .fold(true)
                .annotation(Level::Error.span(start..end).label(&label)),
        );
        let rendered = renderer.render(message);
        write!(f, "{}", rendered)
    }
}

impl<'s> From<SpannedError<'s>> for Error {
    fn from(value: SpannedError<'s>) -> Self {
        value.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_snippet() {
        let source = "float x = 1;\nfloat y = $;\n";
        let err = SpannedError::new(Error::new(ParseError::LexicalMismatch, (23..24).into()), source);
        let text = err.to_string();
        assert!(text.contains("invalid token"));
        assert!(text.contains("float y = $;"));
        assert!(text.contains("this token is unknown"));

        let eof = SpannedError::new(
            Error::new(
                ParseError::AlternativeExhausted {
                    rule: "Block".to_string(),
                    expected: vec!["`}`".to_string()],
                },
                (source.len()..source.len()).into(),
            ),
            source,
        );
        assert!(eof.to_string().contains("found end of file"));
    }
}
