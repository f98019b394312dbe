//! The combinator rule graph.
//!
//! A [`Grammar`] is a set of named cells, each holding one [`Rule`]. Rules reference other
//! cells through [`RuleId`]s, which is how the mutually recursive parts of the language
//! (statements, expressions, generics) are tied together without reference cycles.
//! The graph is built once and never mutated; all parse state lives in the
//! [`Matcher`][crate::matcher::Matcher].
//!
//! Every cycle of the graph goes through a [`Rule::Nest`], which is what bounds the depth
//! of the matcher's recursion.

use std::fmt::Display;

use crate::lexer::Trivia;

/// Index of a late-bound rule cell in a [`Grammar`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

/// Atomic matchers backed by the lexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Identifier,
    Integer,
    Hex,
    Float,
    String,
    Bool,
    ScalarType,
    VectorType,
    MatrixType,
    /// The rest of the current line, newline included. Produces no node.
    RawLine,
    /// The rest of the current line, newline excluded, as a `MacroText` leaf.
    RestOfLine,
    /// A newline, or the end of input. Produces no node.
    LineEnd,
    /// The end of input.
    End,
}

impl Terminal {
    /// The tag of the leaf node produced by this terminal.
    pub fn tag(&self) -> &'static str {
        match self {
            Terminal::Identifier => "Identifier",
            Terminal::Integer => "IntegerLiteral",
            Terminal::Hex => "HexLiteral",
            Terminal::Float => "FloatLiteral",
            Terminal::String => "StringLiteral",
            Terminal::Bool => "BoolLiteral",
            Terminal::ScalarType => "ScalarType",
            Terminal::VectorType => "VectorType",
            Terminal::MatrixType => "MatrixType",
            Terminal::RawLine => "RawLine",
            Terminal::RestOfLine => "MacroText",
            Terminal::LineEnd => "LineEnd",
            Terminal::End => "EndOfInput",
        }
    }
}

impl Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminal::Identifier => f.write_str("identifier"),
            Terminal::Integer => f.write_str("integer literal"),
            Terminal::Hex => f.write_str("hex literal"),
            Terminal::Float => f.write_str("float literal"),
            Terminal::String => f.write_str("string literal"),
            Terminal::Bool => f.write_str("`true` or `false`"),
            Terminal::ScalarType => f.write_str("scalar type"),
            Terminal::VectorType => f.write_str("vector type"),
            Terminal::MatrixType => f.write_str("matrix type"),
            Terminal::RawLine | Terminal::RestOfLine => f.write_str("line"),
            Terminal::LineEnd => f.write_str("end of line"),
            Terminal::End => f.write_str("end of file"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Rule {
    Terminal(Terminal),
    /// A token whose source text equals `text`. Emits a leaf when `tag` is set.
    Token {
        text: &'static str,
        tag: Option<&'static str>,
    },
    /// A single raw character, even if it starts a longer token (`>` inside `>>`).
    Char(char),
    Seq(Vec<Rule>),
    /// Ordered choice: the first alternative that matches wins.
    Alt(Vec<Rule>),
    Repeat {
        rule: Box<Rule>,
        min: usize,
        sep: Option<Box<Rule>>,
    },
    Optional(Box<Rule>),
    /// Negative lookahead, consumes nothing.
    Not(Box<Rule>),
    /// Positive lookahead, consumes nothing.
    Peek(Box<Rule>),
    /// Wraps the nodes produced by the inner rule in a node tagged with the given name.
    Node(&'static str, Box<Rule>),
    Ref(RuleId),
    /// One level of syntactic nesting, counted against the recursion limit.
    Nest(Box<Rule>),
    /// Matches the inner rule with another trivia mode.
    Scope(Trivia, Box<Rule>),
    /// Once `head` matched, a failing `tail` is fatal and reported as `error`.
    Commit {
        head: Box<Rule>,
        tail: Box<Rule>,
        error: CommitError,
    },
}

/// The fatal error raised by a [`Rule::Commit`] whose tail fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitError {
    /// A conditional block without its `#endif`. Points at the first line of the head.
    UnterminatedDirective,
}

pub fn seq<const N: usize>(rules: [Rule; N]) -> Rule {
    Rule::Seq(rules.into())
}

pub fn alt<const N: usize>(rules: [Rule; N]) -> Rule {
    Rule::Alt(rules.into())
}

/// Punctuation or keyword, no node.
pub fn tok(text: &'static str) -> Rule {
    Rule::Token { text, tag: None }
}

/// A token captured as a leaf with the given tag.
pub fn word(text: &'static str, tag: &'static str) -> Rule {
    Rule::Token {
        text,
        tag: Some(tag),
    }
}

/// One of the given operators, captured as an `Operator` leaf.
pub fn op(ops: &[&'static str]) -> Rule {
    one_of(ops, "Operator")
}

/// One of the given words, captured as a leaf with the given tag.
pub fn one_of(words: &[&'static str], tag: &'static str) -> Rule {
    Rule::Alt(words.iter().map(|w| word(w, tag)).collect())
}

pub fn term(terminal: Terminal) -> Rule {
    Rule::Terminal(terminal)
}

pub fn node(tag: &'static str, rule: Rule) -> Rule {
    Rule::Node(tag, Box::new(rule))
}

pub fn opt(rule: Rule) -> Rule {
    Rule::Optional(Box::new(rule))
}

pub fn many0(rule: Rule) -> Rule {
    Rule::Repeat {
        rule: Box::new(rule),
        min: 0,
        sep: None,
    }
}

pub fn many1(rule: Rule) -> Rule {
    Rule::Repeat {
        rule: Box::new(rule),
        min: 1,
        sep: None,
    }
}

pub fn sep_by1(rule: Rule, sep: Rule) -> Rule {
    Rule::Repeat {
        rule: Box::new(rule),
        min: 1,
        sep: Some(Box::new(sep)),
    }
}

pub fn not(rule: Rule) -> Rule {
    Rule::Not(Box::new(rule))
}

pub fn peek(rule: Rule) -> Rule {
    Rule::Peek(Box::new(rule))
}

pub fn r(id: RuleId) -> Rule {
    Rule::Ref(id)
}

pub fn nest(rule: Rule) -> Rule {
    Rule::Nest(Box::new(rule))
}

/// Matches `rule` on the current line only.
pub fn line(rule: Rule) -> Rule {
    Rule::Scope(Trivia::Line, Box::new(rule))
}

pub fn commit(head: Rule, tail: Rule, error: CommitError) -> Rule {
    Rule::Commit {
        head: Box::new(head),
        tail: Box::new(tail),
        error,
    }
}

#[derive(Debug)]
pub(crate) struct Cell {
    pub name: &'static str,
    pub rule: Rule,
}

/// The immutable rule graph.
#[derive(Debug)]
pub struct Grammar {
    cells: Vec<Cell>,
}

impl Grammar {
    pub(crate) fn cell(&self, id: RuleId) -> &Cell {
        &self.cells[id.0]
    }

    pub fn name(&self, id: RuleId) -> &'static str {
        self.cells[id.0].name
    }

    /// The first cell with that name.
    pub fn find(&self, name: &str) -> Option<RuleId> {
        self.cells
            .iter()
            .position(|cell| cell.name == name)
            .map(RuleId)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Collects rule cells. Cells are declared first and defined later so that rules can
/// reference each other in any order.
#[derive(Default)]
pub struct GrammarBuilder {
    cells: Vec<(&'static str, Option<Rule>)>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("rule `{0}` was declared but never defined")]
pub struct UndefinedRule(pub &'static str);

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new cell. Names are only used in diagnostics and need not be unique.
    pub fn declare(&mut self, name: &'static str) -> RuleId {
        self.cells.push((name, None));
        RuleId(self.cells.len() - 1)
    }

    pub fn define(&mut self, id: RuleId, rule: Rule) -> RuleId {
        self.cells[id.0].1 = Some(rule);
        id
    }

    /// Declares and defines a cell at once.
    pub fn rule(&mut self, name: &'static str, rule: Rule) -> RuleId {
        let id = self.declare(name);
        self.define(id, rule)
    }

    pub fn finish(self) -> Result<Grammar, UndefinedRule> {
        let cells = self
            .cells
            .into_iter()
            .map(|(name, rule)| {
                rule.map(|rule| Cell { name, rule })
                    .ok_or(UndefinedRule(name))
            })
            .collect::<Result<_, _>>()?;
        Ok(Grammar { cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_binding() {
        let mut b = GrammarBuilder::new();
        let expr = b.declare("Expr");
        let paren = b.rule("Paren", seq([tok("("), r(expr), tok(")")]));
        b.define(expr, alt([r(paren), term(Terminal::Integer)]));
        let grammar = b.finish().unwrap();
        assert_eq!(grammar.find("Expr"), Some(expr));
        assert_eq!(grammar.name(paren), "Paren");
        assert_eq!(grammar.len(), 2);
    }

    #[test]
    fn undefined_cell() {
        let mut b = GrammarBuilder::new();
        b.declare("Missing");
        assert_eq!(b.finish().unwrap_err(), UndefinedRule("Missing"));
    }
}
