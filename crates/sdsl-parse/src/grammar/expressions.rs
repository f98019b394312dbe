//! The expression precedence cascade.
//!
//! Precedence is encoded by nesting: each binary level is `lower (op lower)*`, captured as
//! one flat node whose children alternate operands and `Operator` leaves, which keeps the
//! operators left-associative. A level with a single operand produces no node of its own.
//!
//! Every way an expression can contain another one goes through a nesting level: the
//! full expression, casts and prefix operators.
//!
//! From the tightest binding to the loosest: term, postfix, unary, cast, multiplicative,
//! additive, shift, bitwise and/xor/or, relational, equality, logical and/or, ternary.

use crate::rule::{
    alt, many0, many1, nest, node, not, op, opt, peek, r, sep_by1, seq, tok, GrammarBuilder,
    Rule, RuleId,
};

use super::terminals::{identifier, Types};

/// Code expressions and preprocessor conditions share the cascade, with small differences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flavor {
    Code,
    /// `defined(NAME)` is a term, casts are restricted to builtin types.
    Directive,
}

pub(super) struct Expressions {
    /// The loosest binding level, `ConditionalExpression`.
    pub expression: RuleId,
    pub method_call: RuleId,
    pub accessor_chain: RuleId,
    pub array_access: RuleId,
    pub indexer: RuleId,
    pub term: RuleId,
}

const BINARY_LEVELS: [(&str, &[&str]); 10] = [
    ("MulExpression", &["*", "/", "%"]),
    ("SumExpression", &["+", "-"]),
    ("ShiftExpression", &["<<", ">>"]),
    ("BitwiseAndExpression", &["&"]),
    ("BitwiseXorExpression", &["^"]),
    ("BitwiseOrExpression", &["|"]),
    ("RelationalExpression", &["<", "<=", ">", ">="]),
    ("EqualityExpression", &["==", "!="]),
    ("LogicalAndExpression", &["&&"]),
    ("LogicalOrExpression", &["||"]),
];

/// `lower (op lower)*` as one flat node, or just `lower`.
fn binary(tag: &'static str, ops: &[&'static str], lower: RuleId) -> Rule {
    alt([
        node(tag, seq([r(lower), many1(seq([op(ops), r(lower)]))])),
        r(lower),
    ])
}

pub(super) fn define(b: &mut GrammarBuilder, types: &Types, flavor: Flavor) -> Expressions {
    let expression = b.declare("ConditionalExpression");
    let term = b.declare("TermExpression");
    let method_call = b.declare("MethodCall");
    let indexer = b.declare("Indexer");
    let array_access = b.declare("ArrayAccess");
    let accessor_chain = b.declare("AccessorChain");
    let postfix = b.declare("PostfixExpression");
    let unary = b.declare("UnaryExpression");
    let cast = b.declare("CastExpression");

    let args = || opt(sep_by1(r(expression), tok(",")));

    b.define(
        method_call,
        node(
            "MethodCall",
            seq([
                alt([identifier(), r(types.builtin_type)]),
                tok("("),
                args(),
                tok(")"),
            ]),
        ),
    );

    let paren = b.rule(
        "ParenthesisExpression",
        node(
            "ParenthesisExpression",
            seq([tok("("), r(expression), tok(")")]),
        ),
    );
    let bare_identifier = b.rule("BareIdentifier", seq([identifier(), not(tok("("))]));

    let mut terms = vec![r(types.literal)];
    if flavor == Flavor::Directive {
        let defined = b.rule(
            "DefinedExpression",
            node(
                "DefinedExpression",
                seq([
                    tok("defined"),
                    alt([seq([tok("("), identifier(), tok(")")]), identifier()]),
                ]),
            ),
        );
        terms.push(r(defined));
    }
    terms.extend([r(bare_identifier), r(method_call), r(paren)]);
    b.define(term, Rule::Alt(terms));

    // postfix
    b.define(
        indexer,
        node("Indexer", seq([tok("["), r(expression), tok("]")])),
    );
    b.define(
        array_access,
        node("ArrayAccess", seq([r(term), many1(r(indexer))])),
    );
    b.define(
        accessor_chain,
        node(
            "AccessorChain",
            seq([
                alt([r(array_access), r(term)]),
                many1(seq([
                    tok("."),
                    alt([r(method_call), identifier()]),
                    many0(r(indexer)),
                ])),
            ]),
        ),
    );
    let increment = || op(&["++", "--"]);
    let postfix_increment = b.rule(
        "PostfixIncrement",
        node(
            "PostfixIncrement",
            seq([
                alt([r(accessor_chain), r(array_access), r(term)]),
                increment(),
            ]),
        ),
    );
    b.define(
        postfix,
        alt([
            r(postfix_increment),
            r(accessor_chain),
            r(array_access),
            seq([
                r(term),
                not(alt([tok("."), tok("["), tok("++"), tok("--")])),
            ]),
        ]),
    );

    // unary
    let prefix_increment = b.rule(
        "PrefixIncrement",
        nest(node("PrefixIncrement", seq([increment(), r(unary)]))),
    );
    let size_of = b.rule(
        "SizeOfExpression",
        node(
            "SizeOfExpression",
            seq([
                tok("sizeof"),
                tok("("),
                alt([seq([r(types.ty), peek(tok(")"))]), r(expression)]),
                tok(")"),
            ]),
        ),
    );
    let prefix = b.rule(
        "PrefixExpression",
        nest(node("PrefixExpression", seq([op(&["-", "+", "!", "~"]), r(cast)]))),
    );
    b.define(
        unary,
        alt([r(prefix_increment), r(size_of), r(prefix), r(postfix)]),
    );

    // cast
    let mut casts = vec![nest(node(
        "CastExpression",
        seq([
            tok("("),
            node("Type", r(types.builtin_type)),
            tok(")"),
            r(cast),
        ]),
    ))];
    if flavor == Flavor::Code {
        // `(a) - b` is a subtraction, not a cast of `-b`
        casts.push(nest(node(
            "CastExpression",
            seq([
                tok("("),
                r(types.type_name),
                tok(")"),
                not(alt([tok("+"), tok("-"), tok("++"), tok("--")])),
                r(cast),
            ]),
        )));
    }
    casts.push(r(unary));
    b.define(cast, Rule::Alt(casts));

    // binary levels
    let mut lower = cast;
    for (name, ops) in BINARY_LEVELS {
        let level = b.declare(name);
        b.define(level, binary(name, ops, lower));
        lower = level;
    }

    // ternary, branches stop at logical-or so that `?:` never dangles
    b.define(
        expression,
        nest(alt([
            node(
                "Ternary",
                seq([
                    r(lower),
                    tok("?"),
                    r(lower),
                    tok(":"),
                    r(lower),
                ]),
            ),
            seq([r(lower), not(tok("?"))]),
        ])),
    );

    Expressions {
        expression,
        method_call,
        accessor_chain,
        array_access,
        indexer,
        term,
    }
}
