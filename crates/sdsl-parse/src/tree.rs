//! The match tree produced by the parser.
//!
//! Nodes are tagged with the name of the rule that produced them (`"Ternary"`,
//! `"AccessorChain"`, `"IntegerLiteral"`, ...). Leaves carry the decoded [`Value`] of the
//! terminal they matched.

use std::fmt::Display;

use derive_more::derive::IsVariant;
use itertools::Itertools;

use crate::span::Span;

#[derive(Clone, Debug, PartialEq, IsVariant)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    /// Identifiers, type names, operators, keywords captured as leaves and macro text.
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A string literal, unescaped.
    Str(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MatchNode {
    pub tag: &'static str,
    pub span: Span,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub value: Option<Value>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<MatchNode>,
}

impl MatchNode {
    pub fn leaf(tag: &'static str, span: Span, value: Value) -> Self {
        Self {
            tag,
            span,
            value: Some(value),
            children: Vec::new(),
        }
    }

    pub fn branch(tag: &'static str, span: Span, children: Vec<MatchNode>) -> Self {
        Self {
            tag,
            span,
            value: None,
            children,
        }
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The first direct child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&MatchNode> {
        self.children.iter().find(|c| c.is(tag))
    }

    /// Direct children with the given tag.
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MatchNode> {
        self.children.iter().filter(move |c| c.is(tag))
    }

    /// All nodes below this one, depth-first and in source order. Does not include `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// The first node with the given tag in depth-first order, `self` included.
    pub fn find(&self, tag: &str) -> Option<&MatchNode> {
        if self.is(tag) {
            return Some(self);
        }
        self.descendants().find(|n| n.is(tag))
    }

    /// All nodes with the given tag in depth-first order, `self` included.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MatchNode> {
        std::iter::once(self)
            .chain(self.descendants())
            .filter(move |n| n.is(tag))
    }

    /// The value of a leaf as text, e.g. the name of an `Identifier`.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// The source text covered by this node.
    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.span.range()).unwrap_or_default()
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        write!(f, "{:width$}{} {}", "", self.tag, self.span, width = depth * 2)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }

    /// A compact one-line form, `Tag(child, child)`, leaves printed as their value.
    ///
    /// ```rust
    /// # use sdsl_parse::{Parser, Entry};
    /// let node = Parser::parse_entry(Entry::Expression, "1 + 2 * 3").unwrap();
    /// assert_eq!(
    ///     node.sexpr(),
    ///     "SumExpression(1, +, MulExpression(2, *, 3))"
    /// );
    /// ```
    pub fn sexpr(&self) -> String {
        match &self.value {
            Some(value) if self.children.is_empty() => value.to_string(),
            _ => format!(
                "{}({})",
                self.tag,
                self.children.iter().map(MatchNode::sexpr).format(", ")
            ),
        }
    }
}

impl Display for MatchNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a MatchNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a MatchNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// The result of a full parse: the preprocessor structure of the raw source and the
/// shader program parsed from the retained source.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MatchTree {
    /// A `DirectiveProgram` node.
    pub directives: MatchNode,
    /// A `ShaderProgram` node.
    pub root: MatchNode,
}

impl Display for MatchTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.directives, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: usize) -> MatchNode {
        MatchNode::leaf(
            "Identifier",
            Span::new(start..start + name.len()),
            Value::Text(name.to_string()),
        )
    }

    #[test]
    fn navigation() {
        let chain = MatchNode::branch(
            "AccessorChain",
            Span::new(0..3),
            vec![ident("a", 0), ident("b", 2)],
        );
        let root = MatchNode::branch("Root", Span::new(0..3), vec![chain]);

        assert_eq!(root.child("AccessorChain").map(|n| n.span.range()), Some(0..3));
        assert!(root.child("Identifier").is_none());
        let names: Vec<_> = root.find_all("Identifier").filter_map(|n| n.text()).collect();
        assert_eq!(names, vec!["a", "b"]);
        let tags: Vec<_> = root.descendants().map(|n| n.tag).collect();
        assert_eq!(tags, vec!["AccessorChain", "Identifier", "Identifier"]);
        assert_eq!(root.find("Root").map(|n| n.tag), Some("Root"));
        assert_eq!(root.sexpr(), "Root(AccessorChain(a, b))");
        assert_eq!(ident("b", 2).slice("a.b"), "b");
    }

    #[test]
    fn display_is_indented() {
        let root = MatchNode::branch("Root", Span::new(0..1), vec![ident("a", 0)]);
        assert_eq!(root.to_string(), "Root 0..1\n  Identifier 0..1 a\n");
    }
}
