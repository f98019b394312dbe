//! The [`Parser`] takes sdsl source code and returns a [match tree][crate::tree].
//!
//! A full parse runs in three stages: the directive grammar recognizes the preprocessor
//! structure of the raw text, the [preprocessor][crate::preprocess] computes the retained
//! source, and the shader grammar parses the retained source.

use std::{collections::HashMap, str::FromStr};

use crate::{
    error::{Error, SpannedError},
    grammar::{Entry, GRAMMAR},
    matcher::Matcher,
    preprocess,
    span::Span,
    tree::{MatchNode, MatchTree},
};

/// Parsing options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// How deeply the input can nest before the parse fails with
    /// [`ParseError::RecursionLimitExceeded`][crate::error::ParseError::RecursionLimitExceeded].
    ///
    /// Parentheses, casts, prefix operators, statements, generic arguments, array
    /// initializers and conditional blocks each count as one level. Each level uses stack,
    /// so a much higher limit may need a thread with a larger stack.
    pub recursion_limit: usize,
    /// Names defined before the first line of the source, with their values.
    /// An empty value defines the name without a value.
    pub defines: HashMap<String, String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            recursion_limit: 128,
            defines: HashMap::new(),
        }
    }
}

impl ParseOptions {
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_define(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.defines.insert(name.to_string(), value.to_string());
        self
    }
}

pub struct Parser;

impl Parser {
    pub fn parse_str(source: &str) -> Result<MatchTree, SpannedError> {
        Self::parse_with_options(source, &ParseOptions::default())
    }

    pub fn parse_with_options<'s>(
        source: &'s str,
        options: &ParseOptions,
    ) -> Result<MatchTree, SpannedError<'s>> {
        let res = parse_tree(source, options);
        res.map_err(|e| SpannedError::new(e, source))
    }

    /// Like [`Parser::parse_str`], discarding the tree.
    pub fn recognize_str(source: &str) -> Result<(), SpannedError> {
        Self::parse_str(source).map(|_| ())
    }

    /// Recognizes the preprocessor structure of the source, without evaluating it.
    pub fn parse_directives(source: &str) -> Result<MatchNode, SpannedError> {
        Self::parse_entry(Entry::Directives, source)
    }

    /// Parses a fragment of sdsl source with the given rule.
    ///
    /// The whole source must match. Preprocessor directives are only understood by
    /// [`Entry::Directives`] and by full parses.
    ///
    /// ```rust
    /// # use sdsl_parse::{Entry, Parser};
    /// let node = Parser::parse_entry(Entry::Statement, "a.b[0].c++;").unwrap();
    /// assert_eq!(node.tag, "EmptyStatement");
    /// assert_eq!(node.children[0].tag, "PostfixIncrement");
    /// ```
    pub fn parse_entry(entry: Entry, source: &str) -> Result<MatchNode, SpannedError> {
        let options = ParseOptions::default();
        let res = run(entry, source, &options);
        res.map_err(|e| SpannedError::new(e, source))
    }
}

fn run(entry: Entry, source: &str, options: &ParseOptions) -> Result<MatchNode, Error> {
    let grammar = &*GRAMMAR;
    let id = grammar.entry(entry);
    let matcher = Matcher::new(&grammar.grammar, source, options.recursion_limit);
    let mut nodes = matcher.run(id, entry.trivia())?;
    if nodes.len() == 1 {
        return Ok(nodes.remove(0));
    }
    let span = match (nodes.first(), nodes.last()) {
        (Some(first), Some(last)) => first.span.extend(&last.span),
        _ => Span::empty(0),
    };
    Ok(MatchNode::branch(grammar.grammar.name(id), span, nodes))
}

fn parse_tree(source: &str, options: &ParseOptions) -> Result<MatchTree, Error> {
    log::debug!("parsing {} bytes, {} predefined names", source.len(), options.defines.len());
    let directives = run(Entry::Directives, source, options)?;
    let retained = preprocess::retain(source, &directives, options)?;
    let root = run(Entry::Shader, &retained, options)?;
    Ok(MatchTree { directives, root })
}

impl FromStr for MatchTree {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parse_tree(source, &ParseOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::error::ParseError;

    fn expr(source: &str) -> String {
        Parser::parse_entry(Entry::Expression, source)
            .map(|node| node.sexpr())
            .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn precedence() {
        assert_eq!(expr("1 + 2 * 3"), "SumExpression(1, +, MulExpression(2, *, 3))");
        assert_eq!(
            expr("(1 + 2) * 3"),
            "MulExpression(ParenthesisExpression(SumExpression(1, +, 2)), *, 3)"
        );
        assert_eq!(expr("a - b - c"), "SumExpression(a, -, b, -, c)");
        assert_eq!(
            expr("a || b && c"),
            "LogicalOrExpression(a, ||, LogicalAndExpression(b, &&, c))"
        );
        assert_eq!(
            expr("x < 1 ? -y : z"),
            "Ternary(RelationalExpression(x, <, 1), PrefixExpression(-, y), z)"
        );
    }

    #[test]
    fn postfix_and_calls() {
        assert_eq!(
            expr("a.b[0].c++"),
            "PostfixIncrement(AccessorChain(a, b, Indexer(0), c), ++)"
        );
        assert_eq!(
            expr("float4(p.xyz, 1.0)"),
            "MethodCall(float4, AccessorChain(p, xyz), 1.0)"
        );
        assert_eq!(
            expr("t.Sample(s, uv).rgb"),
            "AccessorChain(t, MethodCall(Sample, s, uv), rgb)"
        );
        assert_eq!(expr("m[i][j]"), "ArrayAccess(m, Indexer(i), Indexer(j))");
        assert_eq!(expr("--i"), "PrefixIncrement(--, i)");
        assert_eq!(expr("sizeof(float4)"), "SizeOfExpression(Type(float4))");
    }

    #[test]
    fn casts() {
        assert_eq!(expr("(float)x"), "CastExpression(Type(float), x)");
        assert_eq!(expr("(MyType)x"), "CastExpression(Type(MyType), x)");
        assert_eq!(
            expr("(a) - b"),
            "SumExpression(ParenthesisExpression(a), -, b)"
        );
        assert_eq!(
            expr("(int)-x"),
            "CastExpression(Type(int), PrefixExpression(-, x))"
        );
    }

    #[test]
    fn statements() {
        let stmt = |source: &str| {
            Parser::parse_entry(Entry::Statement, source)
                .map(|n| n.tag)
                .map_err(SpannedError::into_owned)
        };
        assert_eq!(stmt("{ }"), Ok("Block"));
        assert_eq!(stmt("return;"), Ok("ReturnStatement"));
        assert_eq!(stmt("a.b.c += 1;"), Ok("ChainAssignment"));
        assert_eq!(stmt("a[2] = 1;"), Ok("ChainAssignment"));
        assert_eq!(stmt("o.Write(1);"), Ok("MethodCallStatement"));
        assert_eq!(stmt("Compute();"), Ok("MethodCallStatement"));
        assert_eq!(stmt("float3 p = mul(a, b);"), Ok("DeclareAssign"));
        assert_eq!(stmt("x = 2;"), Ok("Assignment"));
        assert_eq!(stmt("i++;"), Ok("EmptyStatement"));
        assert_eq!(stmt(";"), Ok("EmptyStatement"));
        assert_eq!(stmt("[unroll] for (int i = 0; i < 4; i++) x += i;"), Ok("ForStatement"));
        assert_eq!(stmt("do { } while (false);"), Ok("DoWhileStatement"));
        assert_eq!(stmt("discard;"), Ok("DiscardStatement"));
    }

    #[test]
    fn if_else_chain() {
        let node = Parser::parse_entry(
            Entry::Statement,
            "[branch] if (a) x = 1; else if (b) x = 2; else { x = 3; }",
        )
        .unwrap();
        assert_eq!(node.tag, "IfStatement");
        assert!(node.child("Attribute").is_some());
        assert_eq!(node.children_tagged("ElseIfStatement").count(), 1);
        assert!(node.child("ElseStatement").is_some());
    }

    #[test]
    fn unterminated_directive() {
        let err = Parser::parse_str("#ifdef FOO\nX").unwrap_err().into_owned();
        assert_eq!(
            err.error,
            ParseError::UnterminatedDirective("#ifdef FOO".to_string())
        );
        assert_eq!(err.span.range(), 0..10);
    }

    #[test]
    fn full_parse() {
        let source = indoc! {"
            #define USE_COLOR 1
            shader Colored : ShaderBase
            {
            #if USE_COLOR
                stage float4 Color;
            #else
                garbage that never parses
            #endif
                stage override float4 Shading()
                {
                    return Color;
                }
            };
        "};
        let tree = Parser::parse_str(source).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(tree.directives.tag, "DirectiveProgram");
        assert_eq!(tree.root.tag, "ShaderProgram");
        let color = tree.root.find("ValueDeclaration").unwrap();
        assert_eq!(color.slice(source), "stage float4 Color;");
        assert!(tree.root.find("MethodDeclaration").is_some());

        let source = source.replace("#define USE_COLOR 1\n", "");
        let options = ParseOptions::default().with_define("USE_COLOR", "0");
        assert!(Parser::parse_with_options(&source, &options).is_err());
        let options = options.with_define("USE_COLOR", "2");
        assert!(Parser::parse_with_options(&source, &options).is_ok());
    }
}
