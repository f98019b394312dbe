//! The packrat interpreter for the [rule graph][crate::rule].
//!
//! Backtracking is the normal control flow here: a rule that does not match returns
//! `Ok(None)` and leaves no trace on the node stack. Only fatal conditions (an unterminated
//! directive, exceeding the recursion limit) are `Err`s, and they abort the whole parse.
//!
//! The recursion limit bounds the number of enclosing [`Rule::Nest`]s, that is the syntactic
//! nesting of the input, not the number of rules being matched.

use std::collections::HashMap;

use crate::{
    error::{Error, ParseError},
    lexer::{raw_line_end, token_at, unquote, NextToken, Token, Trivia},
    rule::{CommitError, Grammar, Rule, RuleId, Terminal},
    span::Span,
    tree::{MatchNode, Value},
};

/// `Ok(Some(end))` on a match, `Ok(None)` on a recoverable mismatch.
type Step = Result<Option<usize>, Error>;

#[derive(Clone)]
enum Memo {
    Fail,
    Success { end: usize, nodes: Vec<MatchNode> },
}

/// The deepest position where a terminal failed to match.
#[derive(Default)]
struct Failure {
    pos: usize,
    rule: &'static str,
    expected: Vec<String>,
    lexical: bool,
}

pub(crate) struct Matcher<'g, 's> {
    grammar: &'g Grammar,
    source: &'s str,
    recursion_limit: usize,
    depth: usize,
    nodes: Vec<MatchNode>,
    memo: HashMap<(RuleId, usize, Trivia, bool), Memo>,
    tokens: HashMap<usize, NextToken>,
    trivia: HashMap<(usize, Trivia), usize>,
    // > 0 inside lookaheads, which do not report failures.
    quiet: usize,
    rules: Vec<&'static str>,
    furthest: Failure,
}

impl<'g, 's> Matcher<'g, 's> {
    pub fn new(grammar: &'g Grammar, source: &'s str, recursion_limit: usize) -> Self {
        Self {
            grammar,
            source,
            recursion_limit,
            depth: 0,
            nodes: Vec::new(),
            memo: HashMap::new(),
            tokens: HashMap::new(),
            trivia: HashMap::new(),
            quiet: 0,
            rules: Vec::new(),
            furthest: Failure::default(),
        }
    }

    /// Matches the rule cell `entry` at the start of the source.
    ///
    /// The entry rule is responsible for anchoring at the end of input if it must.
    pub fn run(mut self, entry: RuleId, trivia: Trivia) -> Result<Vec<MatchNode>, Error> {
        let res = self.rule_ref(entry, 0, trivia)?;
        log::debug!(
            "matched `{}`: {} memo entries, {} cached tokens",
            self.grammar.name(entry),
            self.memo.len(),
            self.tokens.len()
        );
        match res {
            Some(_) => Ok(self.nodes),
            None => Err(self.failure_error()),
        }
    }

    fn failure_error(&mut self) -> Error {
        let pos = self.furthest.pos;
        let span = match self.token(pos) {
            Some((_, range)) => Span::new(range),
            None => Span::empty(pos),
        };
        if self.furthest.lexical {
            return Error::new(ParseError::LexicalMismatch, span);
        }
        let failure = std::mem::take(&mut self.furthest);
        let rule = match failure.rule {
            "" => self.grammar.name(RuleId(0)),
            rule => rule,
        };
        Error::new(
            ParseError::AlternativeExhausted {
                rule: rule.to_string(),
                expected: failure.expected,
            },
            span,
        )
    }

    fn token(&mut self, pos: usize) -> NextToken {
        if let Some(tok) = self.tokens.get(&pos) {
            return tok.clone();
        }
        let tok = token_at(self.source, pos);
        self.tokens.insert(pos, tok.clone());
        tok
    }

    fn skip_trivia(&mut self, pos: usize, mode: Trivia) -> usize {
        if let Some(end) = self.trivia.get(&(pos, mode)) {
            return *end;
        }
        let mut end = pos;
        while let Some((Ok(tok), range)) = self.token(end) {
            if !tok.is_trivia(mode, &self.source[range.clone()]) {
                break;
            }
            end = range.end;
        }
        self.trivia.insert((pos, mode), end);
        end
    }

    fn fail(&mut self, pos: usize, expected: impl FnOnce() -> String) {
        if self.quiet > 0 || pos < self.furthest.pos {
            return;
        }
        if pos > self.furthest.pos || self.furthest.rule.is_empty() {
            let lexical = matches!(self.token(pos), Some((Err(()), _)));
            self.furthest = Failure {
                pos,
                rule: self.rules.last().copied().unwrap_or_default(),
                expected: Vec::new(),
                lexical,
            };
        }
        let expected = expected();
        if !self.furthest.expected.contains(&expected) {
            self.furthest.expected.push(expected);
        }
    }

    fn rule(&mut self, rule: &'g Rule, pos: usize, trivia: Trivia) -> Step {
        match rule {
            Rule::Terminal(terminal) => self.terminal(*terminal, pos, trivia),
            Rule::Token { text, tag } => self.token_rule(*text, *tag, pos, trivia),
            Rule::Char(c) => self.char(*c, pos, trivia),
            Rule::Seq(rules) => self.seq(rules, pos, trivia),
            Rule::Alt(rules) => self.alt(rules, pos, trivia),
            Rule::Repeat { rule, min, sep } => self.repeat(rule, *min, sep.as_deref(), pos, trivia),
            Rule::Optional(rule) => self.optional(rule, pos, trivia),
            Rule::Not(rule) => self.lookahead(rule, pos, trivia, false),
            Rule::Peek(rule) => self.lookahead(rule, pos, trivia, true),
            Rule::Node(tag, rule) => self.node(*tag, rule, pos, trivia),
            Rule::Ref(id) => self.rule_ref(*id, pos, trivia),
            Rule::Nest(rule) => self.nest(rule, pos, trivia),
            Rule::Scope(trivia, rule) => self.rule(rule, pos, *trivia),
            Rule::Commit { head, tail, error } => self.commit(head, tail, *error, pos, trivia),
        }
    }

    fn seq(&mut self, rules: &'g [Rule], pos: usize, trivia: Trivia) -> Step {
        let mark = self.nodes.len();
        let mut end = pos;
        for rule in rules {
            match self.rule(rule, end, trivia)? {
                Some(e) => end = e,
                None => {
                    self.nodes.truncate(mark);
                    return Ok(None);
                }
            }
        }
        Ok(Some(end))
    }

    fn alt(&mut self, rules: &'g [Rule], pos: usize, trivia: Trivia) -> Step {
        let mark = self.nodes.len();
        for rule in rules {
            if let Some(end) = self.rule(rule, pos, trivia)? {
                return Ok(Some(end));
            }
            self.nodes.truncate(mark);
        }
        Ok(None)
    }

    fn repeat(
        &mut self,
        rule: &'g Rule,
        min: usize,
        sep: Option<&'g Rule>,
        pos: usize,
        trivia: Trivia,
    ) -> Step {
        let start = self.nodes.len();
        let mut count = 0;
        let mut end = pos;
        loop {
            let mark = self.nodes.len();
            let item = match (count, sep) {
                (0, _) | (_, None) => end,
                (_, Some(sep)) => match self.rule(sep, end, trivia)? {
                    Some(e) => e,
                    None => break,
                },
            };
            match self.rule(rule, item, trivia)? {
                // an item that consumes nothing would repeat forever
                Some(e) if e == end => {
                    if count < min {
                        count += 1;
                    } else {
                        self.nodes.truncate(mark);
                    }
                    break;
                }
                Some(e) => {
                    count += 1;
                    end = e;
                }
                None => {
                    self.nodes.truncate(mark);
                    break;
                }
            }
        }
        if count < min {
            self.nodes.truncate(start);
            return Ok(None);
        }
        Ok(Some(end))
    }

    fn optional(&mut self, rule: &'g Rule, pos: usize, trivia: Trivia) -> Step {
        let mark = self.nodes.len();
        match self.rule(rule, pos, trivia)? {
            Some(end) => Ok(Some(end)),
            None => {
                self.nodes.truncate(mark);
                Ok(Some(pos))
            }
        }
    }

    fn lookahead(&mut self, rule: &'g Rule, pos: usize, trivia: Trivia, expect: bool) -> Step {
        let mark = self.nodes.len();
        self.quiet += 1;
        let res = self.rule(rule, pos, trivia);
        self.quiet -= 1;
        self.nodes.truncate(mark);
        let matched = res?.is_some();
        Ok((matched == expect).then_some(pos))
    }

    fn node(&mut self, tag: &'static str, rule: &'g Rule, pos: usize, trivia: Trivia) -> Step {
        let mark = self.nodes.len();
        let Some(end) = self.rule(rule, pos, trivia)? else {
            return Ok(None);
        };
        let children = self.nodes.split_off(mark);
        // punctuation leaves no node, so the first child may start later than the match
        let start = self.skip_trivia(pos, trivia).min(end);
        self.nodes
            .push(MatchNode::branch(tag, Span::new(start..end), children));
        Ok(Some(end))
    }

    fn rule_ref(&mut self, id: RuleId, pos: usize, trivia: Trivia) -> Step {
        let key = (id, pos, trivia, self.quiet > 0);
        if let Some(memo) = self.memo.get(&key) {
            return Ok(match memo {
                Memo::Fail => None,
                Memo::Success { end, nodes } => {
                    let end = *end;
                    self.nodes.extend(nodes.iter().cloned());
                    Some(end)
                }
            });
        }

        let cell = self.grammar.cell(id);
        let mark = self.nodes.len();
        self.rules.push(cell.name);
        let res = self.rule(&cell.rule, pos, trivia);
        self.rules.pop();

        let memo = match res? {
            Some(end) => Memo::Success {
                end,
                nodes: self.nodes[mark..].to_vec(),
            },
            None => Memo::Fail,
        };
        let res = match &memo {
            Memo::Success { end, .. } => Some(*end),
            Memo::Fail => None,
        };
        self.memo.insert(key, memo);
        Ok(res)
    }

    fn nest(&mut self, rule: &'g Rule, pos: usize, trivia: Trivia) -> Step {
        if self.depth >= self.recursion_limit {
            let start = self.skip_trivia(pos, trivia);
            let span = match self.token(start) {
                Some((_, range)) => Span::new(range),
                None => Span::empty(start),
            };
            return Err(Error::new(
                ParseError::RecursionLimitExceeded(self.recursion_limit),
                span,
            ));
        }
        self.depth += 1;
        let res = self.rule(rule, pos, trivia);
        self.depth -= 1;
        res
    }

    fn commit(
        &mut self,
        head: &'g Rule,
        tail: &'g Rule,
        error: CommitError,
        pos: usize,
        trivia: Trivia,
    ) -> Step {
        let Some(end) = self.rule(head, pos, trivia)? else {
            return Ok(None);
        };
        if let Some(end) = self.rule(tail, end, trivia)? {
            return Ok(Some(end));
        }
        let start = self.skip_trivia(pos, trivia);
        let line_end = self.source[start..]
            .find('\n')
            .map(|n| start + n)
            .unwrap_or(self.source.len());
        let head_line = self.source[start..line_end].trim_end();
        let err = match error {
            CommitError::UnterminatedDirective => {
                ParseError::UnterminatedDirective(head_line.to_string())
            }
        };
        log::trace!("committed rule failed at {start}: {err}");
        Err(Error::new(err, Span::new(start..start + head_line.len())))
    }

    fn char(&mut self, c: char, pos: usize, trivia: Trivia) -> Step {
        let start = self.skip_trivia(pos, trivia);
        if self.source[start..].starts_with(c) {
            Ok(Some(start + c.len_utf8()))
        } else {
            self.fail(start, || format!("`{c}`"));
            Ok(None)
        }
    }

    fn token_rule(
        &mut self,
        text: &'static str,
        tag: Option<&'static str>,
        pos: usize,
        trivia: Trivia,
    ) -> Step {
        let start = self.skip_trivia(pos, trivia);
        match self.token(start) {
            Some((Ok(_), range)) if &self.source[range.clone()] == text => {
                if let Some(tag) = tag {
                    let value = Value::Text(text.to_string());
                    self.nodes.push(MatchNode::leaf(tag, Span::new(range.clone()), value));
                }
                Ok(Some(range.end))
            }
            _ => {
                self.fail(start, || format!("`{text}`"));
                Ok(None)
            }
        }
    }

    fn terminal(&mut self, terminal: Terminal, pos: usize, trivia: Trivia) -> Step {
        match terminal {
            Terminal::RawLine => return Ok(self.raw_line(pos)),
            Terminal::RestOfLine => return Ok(self.rest_of_line(pos)),
            Terminal::LineEnd => return Ok(self.line_end(pos)),
            _ => (),
        }

        let start = self.skip_trivia(pos, trivia);
        let token = self.token(start);
        if terminal == Terminal::End {
            return Ok(match token {
                None => Some(start),
                Some(_) => {
                    self.fail(start, || terminal.to_string());
                    None
                }
            });
        }

        let value = match (terminal, token.clone()) {
            (Terminal::Identifier, Some((Ok(Token::Ident), range)))
            | (Terminal::ScalarType, Some((Ok(Token::ScalarType), range)))
            | (Terminal::VectorType, Some((Ok(Token::VectorType), range)))
            | (Terminal::MatrixType, Some((Ok(Token::MatrixType), range))) => {
                Some(Value::Text(self.source[range].to_string()))
            }
            (Terminal::Integer, Some((Ok(Token::Int(n)), _)))
            | (Terminal::Hex, Some((Ok(Token::Hex(n)), _))) => Some(Value::Int(n)),
            (Terminal::Float, Some((Ok(Token::Float(n)), _))) => Some(Value::Float(n)),
            (Terminal::Bool, Some((Ok(Token::Bool(b)), _))) => Some(Value::Bool(b)),
            (Terminal::String, Some((Ok(Token::Str), range))) => {
                Some(Value::Str(unquote(&self.source[range])))
            }
            _ => None,
        };

        match (value, token) {
            (Some(value), Some((_, range))) => {
                let end = range.end;
                self.nodes
                    .push(MatchNode::leaf(terminal.tag(), Span::new(range), value));
                Ok(Some(end))
            }
            _ => {
                self.fail(start, || terminal.to_string());
                Ok(None)
            }
        }
    }

    /// Consumes a whole line, newline included. See [`raw_line_end`].
    fn raw_line(&mut self, pos: usize) -> Option<usize> {
        if pos >= self.source.len() {
            self.fail(pos, || Terminal::RawLine.to_string());
            return None;
        }
        Some(raw_line_end(self.source, pos))
    }

    fn rest_of_line(&mut self, pos: usize) -> Option<usize> {
        let start = self.skip_trivia(pos, Trivia::Line);
        let line_end = self.source[start..]
            .find('\n')
            .map(|n| start + n)
            .unwrap_or(self.source.len());
        let text = self.source[start..line_end].trim_end();
        if text.is_empty() {
            self.fail(start, || Terminal::RestOfLine.to_string());
            return None;
        }
        let end = start + text.len();
        let value = Value::Text(text.to_string());
        self.nodes.push(MatchNode::leaf(
            Terminal::RestOfLine.tag(),
            Span::new(start..end),
            value,
        ));
        Some(end)
    }

    fn line_end(&mut self, pos: usize) -> Option<usize> {
        let start = self.skip_trivia(pos, Trivia::Line);
        match self.token(start) {
            None => Some(start),
            Some((Ok(Token::Newline), range)) => Some(range.end),
            Some(_) => {
                self.fail(start, || Terminal::LineEnd.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::*;

    fn grammar() -> (Grammar, RuleId) {
        let mut b = GrammarBuilder::new();
        let expr = b.declare("Expr");
        let atom = b.rule(
            "Atom",
            alt([
                term(Terminal::Integer),
                node("Paren", seq([tok("("), r(expr), tok(")")])),
            ]),
        );
        b.define(
            expr,
            nest(alt([
                node("Sum", seq([r(atom), many1(seq([op(&["+"]), r(atom)]))])),
                r(atom),
            ])),
        );
        let entry = b.rule("Entry", seq([r(expr), term(Terminal::End)]));
        (b.finish().unwrap(), entry)
    }

    fn run(source: &str, limit: usize) -> Result<Vec<MatchNode>, Error> {
        let (grammar, entry) = grammar();
        Matcher::new(&grammar, source, limit).run(entry, Trivia::Code)
    }

    #[test]
    fn backtracking_leaves_no_nodes() {
        let nodes = run("1", 64).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag, "IntegerLiteral");

        let nodes = run(" 1 + (2 + 3) ", 64).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].sexpr(), "Sum(1, +, Paren(Sum(2, +, 3)))");
        assert_eq!(nodes[0].span.range(), 1..12);
    }

    #[test]
    fn furthest_failure() {
        let err = run("1 + (2 + )", 64).unwrap_err();
        assert_eq!(err.span.range(), 9..10);
        match err.error {
            ParseError::AlternativeExhausted { rule, expected } => {
                assert_eq!(rule, "Atom");
                assert!(expected.contains(&"integer literal".to_string()));
                assert!(expected.contains(&"`(`".to_string()));
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn lexical_failure() {
        let err = run("1 + $", 64).unwrap_err();
        assert_eq!(err.error, ParseError::LexicalMismatch);
        assert_eq!(err.span.range(), 4..5);
    }

    #[test]
    fn recursion_limit() {
        let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        let err = run(&source, 64).unwrap_err();
        assert_eq!(err.error, ParseError::RecursionLimitExceeded(64));
        assert_eq!(err.span.range(), 64..65);
        assert!(run(&source, 101).is_ok());
        assert!(run(&source, 100).is_err());
    }
}
