//! Statements, in the order they are tried.

use crate::rule::{
    alt, many0, many1, nest, node, one_of, opt, peek, r, sep_by1, seq, tok, GrammarBuilder,
    Rule, RuleId,
};

use super::{
    expressions::Expressions,
    terminals::{identifier, Types},
};

pub(super) const ASSIGN_OPERATORS: [&str; 11] = [
    "=", "+=", "-=", "*=", "/=", "%=", "<<=", ">>=", "&=", "|=", "^=",
];

/// Words that can prefix a declared variable.
pub(super) const VARIABLE_MODIFIERS: [&str; 21] = [
    "stage",
    "stream",
    "patchstream",
    "static",
    "const",
    "uniform",
    "extern",
    "shared",
    "groupshared",
    "precise",
    "volatile",
    "linear",
    "centroid",
    "nointerpolation",
    "noperspective",
    "sample",
    "row_major",
    "column_major",
    "rowmajor",
    "columnmajor",
    "compose",
];

pub(super) struct Statements {
    pub statement: RuleId,
    pub block: RuleId,
    pub attribute: RuleId,
    pub array_size: RuleId,
    pub initializer: RuleId,
}

pub(super) fn variable_modifiers() -> Rule {
    many0(one_of(&VARIABLE_MODIFIERS, "Modifier"))
}

pub(super) fn define(b: &mut GrammarBuilder, types: &Types, exprs: &Expressions) -> Statements {
    let statement = b.declare("Statement");
    let expr = || r(exprs.expression);
    let assign_op = || one_of(&ASSIGN_OPERATORS, "AssignOperator");

    let attribute = b.rule(
        "Attribute",
        node(
            "Attribute",
            seq([
                tok("["),
                identifier(),
                opt(seq([tok("("), opt(sep_by1(expr(), tok(","))), tok(")")])),
                tok("]"),
            ]),
        ),
    );
    let attributes = || many0(r(attribute));
    let condition = || seq([tok("("), expr(), tok(")")]);

    let block = b.rule(
        "Block",
        node("Block", seq([tok("{"), many0(r(statement)), tok("}")])),
    );

    let array_size = b.rule(
        "ArraySize",
        node("ArraySize", seq([tok("["), opt(expr()), tok("]")])),
    );
    let initializer = b.declare("Initializer");
    let array_initializer = b.rule(
        "ArrayInitializer",
        nest(node(
            "ArrayInitializer",
            seq([
                tok("{"),
                opt(sep_by1(r(initializer), tok(","))),
                opt(tok(",")),
                tok("}"),
            ]),
        )),
    );
    b.define(initializer, alt([r(array_initializer), expr()]));

    // assignments
    let chain_target = || alt([r(exprs.accessor_chain), r(exprs.array_access)]);
    let chain_assignment = b.rule(
        "ChainAssignment",
        node(
            "ChainAssignment",
            seq([chain_target(), assign_op(), expr(), tok(";")]),
        ),
    );
    // `float a = 1, b[2];`, declarators after the first get their own node
    let declarator = b.rule(
        "LocalDeclarator",
        node(
            "Declarator",
            seq([
                identifier(),
                many0(r(array_size)),
                opt(seq([tok("="), r(initializer)])),
            ]),
        ),
    );
    let declare_assign = b.rule(
        "DeclareAssign",
        node(
            "DeclareAssign",
            seq([
                variable_modifiers(),
                r(types.ty),
                identifier(),
                many0(r(array_size)),
                opt(seq([assign_op(), r(initializer)])),
                many0(seq([tok(","), r(declarator)])),
                tok(";"),
            ]),
        ),
    );
    let assignment = b.rule(
        "Assignment",
        node(
            "Assignment",
            seq([identifier(), assign_op(), expr(), tok(";")]),
        ),
    );
    let empty = b.rule(
        "EmptyStatement",
        node("EmptyStatement", seq([opt(expr()), tok(";")])),
    );

    // `a.b().c.D();`, the chain must end with a call
    let call_chain = node(
        "AccessorChain",
        seq([
            alt([r(exprs.array_access), r(exprs.term)]),
            many0(seq([
                tok("."),
                alt([r(exprs.method_call), identifier()]),
                many0(r(exprs.indexer)),
                peek(tok(".")),
            ])),
            tok("."),
            r(exprs.method_call),
        ]),
    );
    let method_call_statement = b.rule(
        "MethodCallStatement",
        node(
            "MethodCallStatement",
            seq([alt([call_chain, r(exprs.method_call)]), tok(";")]),
        ),
    );

    // control flow
    let else_if = b.rule(
        "ElseIfStatement",
        node(
            "ElseIfStatement",
            seq([tok("else"), tok("if"), condition(), r(statement)]),
        ),
    );
    let else_ = b.rule(
        "ElseStatement",
        node("ElseStatement", seq([tok("else"), r(statement)])),
    );
    let if_ = b.rule(
        "IfStatement",
        node(
            "IfStatement",
            seq([
                attributes(),
                tok("if"),
                condition(),
                r(statement),
                many0(r(else_if)),
                opt(r(else_)),
            ]),
        ),
    );

    let assign_expression = b.rule(
        "AssignExpression",
        node(
            "AssignExpression",
            seq([
                alt([chain_target(), identifier()]),
                assign_op(),
                expr(),
            ]),
        ),
    );
    let for_ = b.rule(
        "ForStatement",
        node(
            "ForStatement",
            seq([
                attributes(),
                tok("for"),
                tok("("),
                alt([
                    r(declare_assign),
                    r(chain_assignment),
                    r(assignment),
                    r(empty),
                ]),
                opt(expr()),
                tok(";"),
                opt(sep_by1(alt([r(assign_expression), expr()]), tok(","))),
                tok(")"),
                r(statement),
            ]),
        ),
    );
    let while_ = b.rule(
        "WhileStatement",
        node(
            "WhileStatement",
            seq([attributes(), tok("while"), condition(), r(statement)]),
        ),
    );
    let do_while = b.rule(
        "DoWhileStatement",
        node(
            "DoWhileStatement",
            seq([
                attributes(),
                tok("do"),
                r(statement),
                tok("while"),
                condition(),
                tok(";"),
            ]),
        ),
    );
    // case labels are keywords, so a group's statements stop at the next label
    let case_label = b.rule(
        "CaseLabel",
        alt([
            node("CaseLabel", seq([tok("case"), expr(), tok(":")])),
            node("DefaultLabel", seq([tok("default"), tok(":")])),
        ]),
    );
    let switch_section = b.rule(
        "SwitchSection",
        node(
            "SwitchSection",
            seq([many1(r(case_label)), many0(r(statement))]),
        ),
    );
    let switch = b.rule(
        "SwitchStatement",
        node(
            "SwitchStatement",
            seq([
                attributes(),
                tok("switch"),
                condition(),
                tok("{"),
                many0(r(switch_section)),
                tok("}"),
            ]),
        ),
    );
    let jump = |tag: &'static str, keyword: &'static str| {
        node(tag, seq([attributes(), tok(keyword), tok(";")]))
    };
    let control_flow = b.rule(
        "ControlFlow",
        alt([
            r(if_),
            r(switch),
            r(for_),
            r(while_),
            r(do_while),
            jump("BreakStatement", "break"),
            jump("ContinueStatement", "continue"),
            jump("DiscardStatement", "discard"),
        ]),
    );

    let return_ = b.rule(
        "ReturnStatement",
        node("ReturnStatement", seq([tok("return"), opt(expr()), tok(";")])),
    );

    b.define(
        statement,
        nest(alt([
            r(control_flow),
            r(block),
            r(return_),
            r(chain_assignment),
            r(method_call_statement),
            r(declare_assign),
            r(assignment),
            r(empty),
        ])),
    );

    Statements {
        statement,
        block,
        attribute,
        array_size,
        initializer,
    }
}
