//! Evaluation of preprocessor conditions and computation of the retained source.
//!
//! The retained source has the same length and line structure as the original: bytes of
//! active `UnchangedCode` are kept as is, everything else (directive lines, inactive
//! branches, `#pragma` and other unknown directives) is replaced by spaces. Spans of the shader tree therefore point into the
//! original source.
//!
//! Conditions are evaluated on `i64`. An undefined identifier evaluates to `0`, a name
//! defined without a value to `1`, and a name defined with a value to the value of that
//! expression. Macros are never substituted in code.

use std::collections::HashMap;

use crate::{
    error::{Error, ParseError},
    grammar::{Entry, GRAMMAR},
    lexer::{raw_line_end, Trivia},
    matcher::Matcher,
    parser::ParseOptions,
    span::Span,
    tree::{MatchNode, Value},
};

/// How many times a macro can expand into another one while evaluating a condition.
const MAX_EXPANSION_DEPTH: usize = 32;

/// Computes the retained source of `source`, given its `DirectiveProgram` tree.
pub fn retain(source: &str, directives: &MatchNode, options: &ParseOptions) -> Result<String, Error> {
    let mut pp = Preprocessor::new(source, options);
    pp.walk(directives, true)?;

    let mut bytes: Vec<u8> = source
        .bytes()
        .map(|b| if b == b'\n' { b'\n' } else { b' ' })
        .collect();
    for range in &pp.keep {
        bytes[range.clone()].copy_from_slice(&source.as_bytes()[range.clone()]);
    }
    log::debug!(
        "retained {} code spans, {} defines at end of file",
        pp.keep.len(),
        pp.defines.len()
    );
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Evaluates a standalone condition, as it would appear after `#if`.
///
/// ```rust
/// # use sdsl_parse::{preprocess::evaluate, ParseOptions};
/// let options = ParseOptions::default()
///     .with_define("LEVEL", "3")
///     .with_define("FAST", "");
/// assert_eq!(evaluate("LEVEL * 2 > 5 && FAST", &options), Ok(1));
/// assert_eq!(evaluate("defined(SLOW) ? 1 : -1", &options), Ok(-1));
/// ```
pub fn evaluate(condition: &str, options: &ParseOptions) -> Result<i64, Error> {
    let root = parse_condition(condition, options.recursion_limit)?;
    let mut pp = Preprocessor::new(condition, options);
    pp.eval(&root, condition, None, 0)
}

fn parse_condition(text: &str, recursion_limit: usize) -> Result<MatchNode, Error> {
    let entry = GRAMMAR.entry(Entry::DirectiveExpression);
    let mut nodes = Matcher::new(&GRAMMAR.grammar, text, recursion_limit).run(entry, Trivia::Code)?;
    match nodes.len() {
        1 => Ok(nodes.remove(0)),
        _ => Err(Error::new(
            ParseError::InvalidCondition(format!("`{text}` is not a single expression")),
            Span::new(0..text.len()),
        )),
    }
}

struct Preprocessor<'a> {
    source: &'a str,
    recursion_limit: usize,
    defines: HashMap<String, String>,
    /// Values of the macros evaluated since the last `#define` or `#undef`.
    values: HashMap<String, i64>,
    keep: Vec<std::ops::Range<usize>>,
}

impl<'a> Preprocessor<'a> {
    fn new(source: &'a str, options: &ParseOptions) -> Self {
        Self {
            source,
            recursion_limit: options.recursion_limit,
            defines: options.defines.clone(),
            values: HashMap::new(),
            keep: Vec::new(),
        }
    }

    /// Walks the items of a `DirectiveProgram` or `GuardedCode` that is active.
    fn walk(&mut self, items: &MatchNode, active: bool) -> Result<(), Error> {
        for item in &items.children {
            match item.tag {
                "UnchangedCode" if active => self.keep_code(item.span.range()),
                "DefineDirective" if active => {
                    let name = identifier(item);
                    let value = item
                        .children
                        .get(1)
                        .map(|value| value.slice(self.source).to_string())
                        .unwrap_or_default();
                    log::trace!("#define {name} `{value}`");
                    self.defines.insert(name.to_string(), value);
                    self.values.clear();
                }
                "UndefDirective" if active => {
                    let name = identifier(item);
                    log::trace!("#undef {name}");
                    self.defines.remove(name);
                    self.values.clear();
                }
                "ConditionalDirective" if active => self.conditional(item)?,
                _ => (),
            }
        }
        Ok(())
    }

    /// Keeps the lines of `range`, except unknown directives such as `#pragma`.
    fn keep_code(&mut self, range: std::ops::Range<usize>) {
        let mut start = range.start;
        while start < range.end {
            let end = raw_line_end(self.source, start).min(range.end);
            let line = &self.source[start..end];
            if line.trim_start().starts_with('#') {
                log::trace!("ignoring `{}`", line.trim());
            } else {
                self.keep.push(start..end);
            }
            start = end;
        }
    }

    fn conditional(&mut self, node: &MatchNode) -> Result<(), Error> {
        let mut taken = false;
        for branch in &node.children {
            if taken {
                break;
            }
            let selected = match branch.tag {
                "IfDirective" | "ElifDirective" => {
                    let cond = branch.children.first().ok_or_else(|| {
                        Error::new(
                            ParseError::InvalidCondition("missing condition".to_string()),
                            branch.span.clone(),
                        )
                    })?;
                    self.eval(cond, self.source, None, 0)? != 0
                }
                "IfDefDirective" => self.defines.contains_key(identifier(branch)),
                "IfNDefDirective" => !self.defines.contains_key(identifier(branch)),
                "ElseDirective" => true,
                _ => false,
            };
            log::trace!(
                "{} at {}: {}",
                branch.tag,
                branch.span,
                if selected { "taken" } else { "skipped" }
            );
            if selected {
                taken = true;
                if let Some(guarded) = branch.child("GuardedCode") {
                    self.walk(guarded, true)?;
                }
            }
        }
        Ok(())
    }

    /// `text` is the source `node` was parsed from. `site` is the span errors are reported
    /// at when evaluating the value of a macro, whose spans do not point into the source.
    fn eval(
        &mut self,
        node: &MatchNode,
        text: &str,
        site: Option<&Span>,
        depth: usize,
    ) -> Result<i64, Error> {
        let invalid = |reason: String| {
            Error::new(
                ParseError::InvalidCondition(reason),
                site.unwrap_or(&node.span).clone(),
            )
        };
        let operand = |i: usize| {
            node.children
                .get(i)
                .ok_or_else(|| invalid(format!("incomplete `{}`", node.slice(text))))
        };

        match node.tag {
            "IntegerLiteral" | "HexLiteral" | "BoolLiteral" => match &node.value {
                Some(Value::Int(n)) => Ok(*n),
                Some(Value::Bool(b)) => Ok(*b as i64),
                _ => Err(invalid(format!("`{}` is not an integer", node.slice(text)))),
            },
            "Identifier" => self.identifier(node, site, depth),
            "DefinedExpression" => {
                let name = operand(0)?.text().unwrap_or_default();
                Ok(self.defines.contains_key(name) as i64)
            }
            "ParenthesisExpression" => self.eval(operand(0)?, text, site, depth),
            "CastExpression" => {
                let value = node.children.last().ok_or_else(|| invalid("empty cast".into()))?;
                self.eval(value, text, site, depth)
            }
            "PrefixExpression" => {
                let value = self.eval(operand(1)?, text, site, depth)?;
                match operand(0)?.text() {
                    Some("-") => Ok(value.wrapping_neg()),
                    Some("+") => Ok(value),
                    Some("!") => Ok((value == 0) as i64),
                    Some("~") => Ok(!value),
                    _ => Err(invalid(format!("unknown operator in `{}`", node.slice(text)))),
                }
            }
            "Ternary" => {
                if self.eval(operand(0)?, text, site, depth)? != 0 {
                    self.eval(operand(1)?, text, site, depth)
                } else {
                    self.eval(operand(2)?, text, site, depth)
                }
            }
            "MulExpression" | "SumExpression" | "ShiftExpression" | "BitwiseAndExpression"
            | "BitwiseXorExpression" | "BitwiseOrExpression" | "RelationalExpression"
            | "EqualityExpression" | "LogicalAndExpression" | "LogicalOrExpression" => {
                let mut acc = self.eval(operand(0)?, text, site, depth)?;
                for pair in node.children[1..].chunks(2) {
                    let [op, rhs] = pair else {
                        return Err(invalid(format!("incomplete `{}`", node.slice(text))));
                    };
                    let op = op.text().unwrap_or_default();
                    // short-circuit like C does, so `0 && 1 / 0` is fine
                    acc = match (op, acc) {
                        ("&&", 0) => 0,
                        ("||", acc) if acc != 0 => 1,
                        _ => {
                            let rhs = self.eval(rhs, text, site, depth)?;
                            binary(op, acc, rhs).map_err(invalid)?
                        }
                    };
                }
                Ok(acc)
            }
            _ => Err(invalid(format!(
                "`{}` is not allowed in a condition",
                node.slice(text).trim()
            ))),
        }
    }

    fn identifier(
        &mut self,
        node: &MatchNode,
        site: Option<&Span>,
        depth: usize,
    ) -> Result<i64, Error> {
        let name = node.text().unwrap_or_default();
        let site = site.unwrap_or(&node.span);
        let invalid = |reason: String| Error::new(ParseError::InvalidCondition(reason), site.clone());

        if let Some(value) = self.values.get(name) {
            return Ok(*value);
        }
        let value = match self.defines.get(name) {
            None => return Ok(0),
            Some(value) if value.trim().is_empty() => return Ok(1),
            Some(_) if depth >= MAX_EXPANSION_DEPTH => {
                return Err(invalid(format!("macro `{name}` expands recursively")));
            }
            Some(value) => value.clone(),
        };
        let root = parse_condition(&value, self.recursion_limit).map_err(|_| {
            invalid(format!("macro `{name}` does not expand to an expression"))
        })?;
        let res = self.eval(&root, &value, Some(site), depth + 1)?;
        self.values.insert(name.to_string(), res);
        Ok(res)
    }
}

fn identifier(node: &MatchNode) -> &str {
    node.child("Identifier")
        .and_then(MatchNode::text)
        .unwrap_or_default()
}

fn binary(op: &str, lhs: i64, rhs: i64) -> Result<i64, String> {
    let res = match op {
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => return Err("division by zero".to_string()),
        "/" => lhs.checked_div(rhs).ok_or("integer overflow")?,
        "%" => lhs.checked_rem(rhs).ok_or("integer overflow")?,
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "<<" | ">>" => {
            let shift = u32::try_from(rhs)
                .ok()
                .filter(|s| *s < 64)
                .ok_or("shift amount out of range")?;
            match op {
                "<<" => lhs << shift,
                _ => lhs >> shift,
            }
        }
        "&" => lhs & rhs,
        "^" => lhs ^ rhs,
        "|" => lhs | rhs,
        "<" => (lhs < rhs) as i64,
        "<=" => (lhs <= rhs) as i64,
        ">" => (lhs > rhs) as i64,
        ">=" => (lhs >= rhs) as i64,
        "==" => (lhs == rhs) as i64,
        "!=" => (lhs != rhs) as i64,
        "&&" => (lhs != 0 && rhs != 0) as i64,
        "||" => (lhs != 0 || rhs != 0) as i64,
        _ => return Err(format!("unknown operator `{op}`")),
    };
    Ok(res)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::Parser;

    fn retained(source: &str, options: &ParseOptions) -> String {
        let directives = Parser::parse_directives(source).unwrap();
        retain(source, &directives, options).unwrap()
    }

    #[test]
    fn selects_one_branch() {
        let source = indoc! {"
            #if MODE == 1
            one
            #elif MODE == 2
            two
            #else
            other
            #endif
        "};
        let pick = |mode: &str| {
            let options = ParseOptions::default().with_define("MODE", mode);
            retained(source, &options)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        };
        assert_eq!(pick("1"), "one");
        assert_eq!(pick("2"), "two");
        assert_eq!(pick("7"), "other");
    }

    #[test]
    fn keeps_offsets() {
        let source = "a\n#ifdef X\nbb\n#endif\nccc\n";
        let res = retained(source, &ParseOptions::default());
        assert_eq!(res.len(), source.len());
        assert_eq!(res, "a\n        \n  \n      \nccc\n");
    }

    #[test]
    fn unknown_directives_are_blanked() {
        let source = "#pragma once\nshader S {\n  #include \"x\"\n};\n";
        let res = retained(source, &ParseOptions::default());
        assert_eq!(res.split_whitespace().collect::<Vec<_>>(), ["shader", "S", "{", "};"]);
        assert_eq!(res.len(), source.len());
    }

    #[test]
    fn defines_apply_in_order() {
        let source = indoc! {"
            #define A
            #ifdef A
            first
            #endif
            #undef A
            #ifdef A
            second
            #endif
        "};
        let res = retained(source, &ParseOptions::default());
        assert_eq!(res.split_whitespace().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn inactive_defines_are_ignored() {
        let source = indoc! {"
            #if 0
            #define A 1
            #endif
            #if A
            yes
            #endif
        "};
        let res = retained(source, &ParseOptions::default());
        assert!(res.trim().is_empty());
    }

    #[test]
    fn macro_values() {
        let options = ParseOptions::default()
            .with_define("A", "B + 1")
            .with_define("B", "(2 << 2)")
            .with_define("LOOP", "LOOP");
        assert_eq!(evaluate("A", &options), Ok(9));
        assert_eq!(evaluate("UNDEFINED + 1", &options), Ok(1));
        assert_eq!(evaluate("0x10 | 1", &options), Ok(17));
        assert_eq!(evaluate("0 && 1 / 0", &options), Ok(0));
        assert_eq!(evaluate("(float)2", &options), Ok(2));

        let err = evaluate("LOOP", &options).unwrap_err();
        assert!(matches!(err.error, ParseError::InvalidCondition(_)));
        let err = evaluate("1 / 0", &options).unwrap_err();
        assert_eq!(
            err.error,
            ParseError::InvalidCondition("division by zero".to_string())
        );
        let err = evaluate("(-9223372036854775807 - 1) / -1", &options).unwrap_err();
        assert_eq!(
            err.error,
            ParseError::InvalidCondition("integer overflow".to_string())
        );
        let err = evaluate("1.5 > 1", &options).unwrap_err();
        assert!(matches!(err.error, ParseError::InvalidCondition(_)));
        assert_eq!(err.span.range(), 0..3);
    }

    #[test]
    fn macro_chains_evaluate_once() {
        // each level doubles the number of references to the next one
        let options = (0..40).fold(ParseOptions::default(), |options, i| {
            options.with_define(format!("M{i}"), format!("M{0} + M{0}", i + 1))
        });
        let options = options.with_define("M40", "1");
        assert_eq!(evaluate("M10", &options), Ok(1 << 30));
        assert_eq!(evaluate("M31 * 2", &options), Ok(1 << 10));

        let source = indoc! {"
            #define A 1
            #define B (A + A)
            #if B == 2
            two
            #endif
            #undef A
            #define A 2
            #if B == 4
            four
            #endif
        "};
        let res = retained(source, &ParseOptions::default());
        assert_eq!(res.split_whitespace().collect::<Vec<_>>(), ["two", "four"]);
    }

    #[test]
    fn directives_in_comments() {
        let source = indoc! {"
            a
            /* disabled:
            #ifdef X
            b
            */
            #if 0
            /* c
            #endif
            */
            #endif
            d
        "};
        let res = retained(source, &ParseOptions::default());
        assert_eq!(res.len(), source.len());
        assert_eq!(
            res.split_whitespace().collect::<Vec<_>>(),
            ["a", "/*", "disabled:", "#ifdef", "X", "b", "*/", "d"]
        );
    }
}
