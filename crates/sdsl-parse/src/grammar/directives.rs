//! The preprocessor structure of a source file.
//!
//! The whole file is matched line by line in [`Trivia::Line`][crate::lexer::Trivia::Line]
//! mode. Lines that are not directives are captured as `UnchangedCode`, conditional blocks
//! nest through `GuardedCode`. The shader grammar never sees directives: it parses the
//! retained source computed from this tree.
//!
//! A block comment joins all the lines it spans into one, so directives inside comments
//! are plain code.

use crate::rule::{
    alt, commit, many0, many1, nest, node, not, opt, peek, r, seq, term, tok, CommitError,
    GrammarBuilder, Rule, RuleId, Terminal,
};

use super::{
    expressions::{self, Flavor},
    terminals::{identifier, Types},
};

pub(super) struct Directives {
    pub program: RuleId,
    /// The directive flavor of `ConditionalExpression`.
    pub expression: RuleId,
}

fn directive(name: &'static str) -> Rule {
    seq([tok("#"), tok(name)])
}

fn line_end() -> Rule {
    term(Terminal::LineEnd)
}

pub(super) fn define(b: &mut GrammarBuilder, types: &Types) -> Directives {
    let exprs = expressions::define(b, types, Flavor::Directive);
    let expression = exprs.expression;

    let directive_start = b.rule(
        "DirectiveStart",
        seq([
            tok("#"),
            alt([
                tok("define"),
                tok("undef"),
                tok("if"),
                tok("ifdef"),
                tok("ifndef"),
                tok("elif"),
                tok("else"),
                tok("endif"),
            ]),
        ]),
    );

    let item = b.declare("DirectiveItem");
    let guarded = b.rule(
        "GuardedCode",
        nest(node("GuardedCode", many0(r(item)))),
    );

    let unchanged = b.rule(
        "UnchangedCode",
        node(
            "UnchangedCode",
            many1(seq([not(r(directive_start)), term(Terminal::RawLine)])),
        ),
    );

    let define = b.rule(
        "DefineDirective",
        node(
            "DefineDirective",
            seq([
                directive("define"),
                identifier(),
                opt(alt([
                    seq([r(expression), peek(line_end())]),
                    term(Terminal::RestOfLine),
                ])),
                line_end(),
            ]),
        ),
    );
    let undef = b.rule(
        "UndefDirective",
        node(
            "UndefDirective",
            seq([directive("undef"), identifier(), line_end()]),
        ),
    );

    let if_ = b.rule(
        "IfDirective",
        node(
            "IfDirective",
            seq([directive("if"), r(expression), line_end(), r(guarded)]),
        ),
    );
    let ifdef = b.rule(
        "IfDefDirective",
        node(
            "IfDefDirective",
            seq([directive("ifdef"), identifier(), line_end(), r(guarded)]),
        ),
    );
    let ifndef = b.rule(
        "IfNDefDirective",
        node(
            "IfNDefDirective",
            seq([directive("ifndef"), identifier(), line_end(), r(guarded)]),
        ),
    );
    let elif = b.rule(
        "ElifDirective",
        node(
            "ElifDirective",
            seq([directive("elif"), r(expression), line_end(), r(guarded)]),
        ),
    );
    let else_ = b.rule(
        "ElseDirective",
        node(
            "ElseDirective",
            seq([directive("else"), line_end(), r(guarded)]),
        ),
    );
    let endif = b.rule(
        "EndifDirective",
        node("EndifDirective", seq([directive("endif"), line_end()])),
    );

    // once the opening line matched, a missing `#endif` is fatal rather than a backtrack
    let conditional = b.rule(
        "ConditionalDirective",
        node(
            "ConditionalDirective",
            commit(
                alt([r(if_), r(ifdef), r(ifndef)]),
                seq([many0(r(elif)), opt(r(else_)), r(endif)]),
                CommitError::UnterminatedDirective,
            ),
        ),
    );

    b.define(
        item,
        alt([r(conditional), r(define), r(undef), r(unchanged)]),
    );

    let program = b.rule(
        "DirectiveProgram",
        node(
            "DirectiveProgram",
            seq([many0(r(item)), term(Terminal::End)]),
        ),
    );

    Directives {
        program,
        expression,
    }
}
