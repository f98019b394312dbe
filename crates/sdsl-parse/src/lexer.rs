//! Token-level matching for the grammar terminals.
//!
//! The grammar is scannerless from the outside: terminals ask for the token starting at a
//! given byte offset with [`token_at`]. Longest-match lexing is what keeps `float3x3` a single
//! matrix type, `1.5f` a float and `return` a keyword rather than an identifier.

use logos::Logos;
use std::{num::NonZeroU8, ops::Range};

// don't have to be super strict, the lexer regex already did the heavy lifting
const DEC_FORMAT: u128 = lexical::NumberFormatBuilder::new().build();

const HEX_FORMAT: u128 = lexical::NumberFormatBuilder::new()
    .mantissa_radix(16)
    .base_prefix(NonZeroU8::new(b'x'))
    .build();

fn strip_suffix<'a>(str: &'a str, suffixes: &[char]) -> &'a str {
    str.strip_suffix(suffixes).unwrap_or(str)
}

fn parse_dec_int(lex: &mut logos::Lexer<Token>) -> Option<i64> {
    let options = &lexical::parse_integer_options::STANDARD;
    let str = strip_suffix(lex.slice(), &['u', 'U', 'l', 'L']);
    lexical::parse_with_options::<i64, _, DEC_FORMAT>(str, options).ok()
}

fn parse_hex_int(lex: &mut logos::Lexer<Token>) -> Option<i64> {
    let options = &lexical::parse_integer_options::STANDARD;
    let str = strip_suffix(lex.slice(), &['u', 'U', 'l', 'L']);
    // lexical wants a lowercase base prefix
    let str = str.replacen("0X", "0x", 1);
    lexical::parse_with_options::<u64, _, HEX_FORMAT>(str, options)
        .ok()
        .map(|n| n as i64)
}

fn parse_float(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    let options = &lexical::parse_float_options::STANDARD;
    let str = strip_suffix(lex.slice(), &['f', 'F', 'h', 'H', 'd', 'D']);
    lexical::parse_with_options::<f64, _, DEC_FORMAT>(str, options).ok()
}

fn parse_block_comment(lex: &mut logos::Lexer<Token>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

#[derive(Logos, Clone, Debug, PartialEq)]
pub enum Token {
    // trivia
    #[regex(r"[ \t\x0B\x0C]+")]
    Whitespace,
    #[regex(r"\r?\n")]
    Newline,
    #[regex(r"\\\r?\n")]
    Continuation,
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", parse_block_comment)]
    BlockComment,

    // symbols
    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token("{")]
    #[token("}")]
    #[token(";")]
    #[token(",")]
    #[token(".")]
    #[token(":")]
    #[token("?")]
    #[token("#")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token("++")]
    #[token("--")]
    #[token("<<")]
    #[token(">>")]
    #[token("<")]
    #[token(">")]
    #[token("<=")]
    #[token(">=")]
    #[token("==")]
    #[token("!=")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("~")]
    #[token("!")]
    #[token("&&")]
    #[token("||")]
    #[token("=")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    Symbol,

    // reserved words, an identifier can never be spelled like one of these.
    #[token("abstract")]
    #[token("break")]
    #[token("case")]
    #[token("cbuffer")]
    #[token("const")]
    #[token("continue")]
    #[token("default")]
    #[token("discard")]
    #[token("do")]
    #[token("else")]
    #[token("for")]
    #[token("if")]
    #[token("in")]
    #[token("inout")]
    #[token("namespace")]
    #[token("out")]
    #[token("override")]
    #[token("packoffset")]
    #[token("register")]
    #[token("return")]
    #[token("rgroup")]
    #[token("shader")]
    #[token("sizeof")]
    #[token("stage")]
    #[token("static")]
    #[token("stream")]
    #[token("struct")]
    #[token("switch")]
    #[token("typedef")]
    #[token("uniform")]
    #[token("void")]
    #[token("while")]
    Keyword,

    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),

    #[token("bool")]
    #[token("half")]
    #[token("float")]
    #[token("double")]
    #[token("int")]
    #[token("uint")]
    ScalarType,
    #[regex(r"(bool|half|float|double|int|uint)[1-4]")]
    VectorType,
    #[regex(r"(bool|half|float|double|int|uint)[1-4]x[1-4]")]
    MatrixType,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", priority = 1)]
    Ident,

    #[regex(r"0[xX][0-9a-fA-F]+[uUlL]?", parse_hex_int)]
    Hex(i64),
    #[regex(r"[0-9]+[uUlL]?", parse_dec_int)]
    Int(i64),
    #[regex(r"([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?[fFhHdD]?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+[fFhHdD]?", parse_float)]
    #[regex(r"[0-9]+[fFhHdD]", parse_float)]
    Float(f64),
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,
}

/// Which tokens are skipped in front of a terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trivia {
    /// Whitespace, newlines and comments.
    Code,
    /// Everything but line breaks: used on preprocessor directive lines.
    Line,
}

impl Token {
    pub fn is_trivia(&self, mode: Trivia, text: &str) -> bool {
        match (self, mode) {
            (Token::Whitespace | Token::Continuation | Token::LineComment, _) => true,
            (Token::Newline, Trivia::Code) => true,
            (Token::BlockComment, Trivia::Code) => true,
            (Token::BlockComment, Trivia::Line) => !text.contains('\n'),
            _ => false,
        }
    }
}

pub type NextToken = Option<(Result<Token, ()>, Range<usize>)>;

/// Lexes the single token starting at byte offset `pos`.
///
/// Returns `None` at the end of input. The range is absolute in `source`.
///
/// ```rust
/// # use sdsl_parse::lexer::{token_at, Token};
/// let (token, span) = token_at("x = float3x3(1);", 4).unwrap();
/// assert_eq!(token, Ok(Token::MatrixType));
/// assert_eq!(span, 4..12);
///
/// // integers followed by a dot or a suffix are floats
/// assert_eq!(token_at("1.5e3f", 0).unwrap().0, Ok(Token::Float(1500.0)));
/// assert_eq!(token_at("2f", 0).unwrap().0, Ok(Token::Float(2.0)));
/// assert_eq!(token_at("0x1F", 0).unwrap().0, Ok(Token::Hex(31)));
/// assert_eq!(token_at("", 0), None);
/// ```
pub fn token_at(source: &str, pos: usize) -> NextToken {
    let rest = source.get(pos..)?;
    let mut lexer = Token::lexer(rest);
    let token = lexer.next()?;
    let span = lexer.span();
    Some((token, pos + span.start..pos + span.end))
}

/// The end of the line starting at `pos`, after its newline.
///
/// A block comment that opens on the line extends it to the line where the comment
/// closes, so that directives inside comments are never seen as lines of their own.
///
/// ```rust
/// # use sdsl_parse::lexer::raw_line_end;
/// let source = "a /* b\n#endif */ c\nd";
/// assert_eq!(raw_line_end(source, 0), 19);
/// assert_eq!(raw_line_end(source, 19), source.len());
/// ```
pub fn raw_line_end(source: &str, pos: usize) -> usize {
    let mut end = pos;
    while let Some((token, range)) = token_at(source, end) {
        end = range.end;
        if token == Ok(Token::Newline) {
            break;
        }
    }
    end
}

/// Unescapes the body of a string literal token (without the quotes).
pub fn unquote(literal: &str) -> String {
    let body = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut res = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            res.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => res.push('\n'),
            Some('t') => res.push('\t'),
            Some('r') => res.push('\r'),
            Some('0') => res.push('\0'),
            Some(other) => res.push(other),
            None => res.push('\\'),
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<(Token, &str)> {
        let mut pos = 0;
        let mut res = Vec::new();
        while let Some((tok, span)) = token_at(source, pos) {
            let tok = tok.expect("lexer error");
            pos = span.end;
            if !tok.is_trivia(Trivia::Code, &source[span.clone()]) {
                res.push((tok, &source[span]));
            }
        }
        res
    }

    #[test]
    fn type_spellings() {
        let toks = lex_all("float float3 float3x3 int2x2 float5 uint4");
        assert_eq!(
            toks,
            vec![
                (Token::ScalarType, "float"),
                (Token::VectorType, "float3"),
                (Token::MatrixType, "float3x3"),
                (Token::MatrixType, "int2x2"),
                (Token::Ident, "float5"),
                (Token::VectorType, "uint4"),
            ]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        let toks = lex_all("return returned stage stages linear");
        assert_eq!(
            toks,
            vec![
                (Token::Keyword, "return"),
                (Token::Ident, "returned"),
                (Token::Keyword, "stage"),
                (Token::Ident, "stages"),
                (Token::Ident, "linear"),
            ]
        );
    }

    #[test]
    fn numbers() {
        let toks = lex_all("1 1. 1.5 .5 1e3 2u 0XfFu 3h");
        assert_eq!(
            toks.into_iter().map(|(t, _)| t).collect::<Vec<_>>(),
            vec![
                Token::Int(1),
                Token::Float(1.0),
                Token::Float(1.5),
                Token::Float(0.5),
                Token::Float(1000.0),
                Token::Int(2),
                Token::Hex(255),
                Token::Float(3.0),
            ]
        );
    }

    #[test]
    fn longest_operator() {
        let toks = lex_all("a+=b++<<=c");
        let texts: Vec<&str> = toks.iter().map(|(_, s)| *s).collect();
        assert_eq!(texts, vec!["a", "+=", "b", "++", "<<=", "c"]);
    }

    #[test]
    fn trivia_modes() {
        let src = "/* a\nb */";
        let (tok, span) = token_at(src, 0).unwrap();
        assert_eq!(tok, Ok(Token::BlockComment));
        assert!(tok.clone().unwrap().is_trivia(Trivia::Code, &src[span.clone()]));
        assert!(!tok.unwrap().is_trivia(Trivia::Line, &src[span]));
        assert_eq!(token_at("/* open", 0).unwrap().0, Err(()));
    }

    #[test]
    fn raw_lines() {
        let src = "x = 1; // #if\n/* start\n#endif\n*/ y;\n#else\n";
        let mut pos = 0;
        let mut lines = Vec::new();
        while pos < src.len() {
            let end = raw_line_end(src, pos);
            lines.push(&src[pos..end]);
            pos = end;
        }
        assert_eq!(
            lines,
            vec!["x = 1; // #if\n", "/* start\n#endif\n*/ y;\n", "#else\n"]
        );
        // an unclosed comment runs to the end of input
        assert_eq!(raw_line_end("a /* b\nc", 0), 9);
    }

    #[test]
    fn strings() {
        let src = r#""a\"b\n""#;
        let (tok, span) = token_at(src, 0).unwrap();
        assert_eq!(tok, Ok(Token::Str));
        assert_eq!(unquote(&src[span]), "a\"b\n");
    }
}
