//! Literals, builtin types and type names.

use crate::rule::{
    alt, nest, node, opt, r, sep_by1, seq, term, tok, GrammarBuilder, Rule, RuleId, Terminal,
};

pub(super) struct Types {
    /// Any literal leaf.
    pub literal: RuleId,
    /// `float`, `float3`, `float4x4`...
    pub builtin_type: RuleId,
    /// `<arg, arg>`, args being literals or types.
    pub generics: RuleId,
    /// Generics that may also declare parameters: `<float3 Offset, T>`.
    pub generic_parameters: RuleId,
    /// A builtin or named type, optionally generic. Produces a `Type` node.
    pub ty: RuleId,
    /// A named type, optionally generic. Produces a `Type` node.
    pub type_name: RuleId,
}

/// Closes a generic argument list. Matches the first `>` of a `>>` token.
fn generics_end() -> Rule {
    Rule::Char('>')
}

pub(super) fn identifier() -> Rule {
    term(Terminal::Identifier)
}

pub(super) fn define(b: &mut GrammarBuilder) -> Types {
    let literal = b.rule(
        "Literal",
        alt([
            term(Terminal::Float),
            term(Terminal::Hex),
            term(Terminal::Integer),
            term(Terminal::Bool),
            term(Terminal::String),
        ]),
    );

    let builtin_type = b.rule(
        "BuiltinType",
        alt([
            term(Terminal::MatrixType),
            term(Terminal::VectorType),
            term(Terminal::ScalarType),
        ]),
    );

    let ty = b.declare("Type");
    let generics = b.rule(
        "Generics",
        nest(node(
            "Generics",
            seq([
                tok("<"),
                sep_by1(alt([r(literal), r(ty)]), tok(",")),
                generics_end(),
            ]),
        )),
    );

    b.define(
        ty,
        node(
            "Type",
            seq([alt([r(builtin_type), identifier()]), opt(r(generics))]),
        ),
    );
    let generic_parameter = b.rule(
        "GenericParameter",
        node("GenericParameter", seq([r(ty), identifier()])),
    );
    let generic_parameters = b.rule(
        "GenericParameters",
        node(
            "Generics",
            seq([
                tok("<"),
                sep_by1(
                    alt([r(generic_parameter), r(literal), r(ty)]),
                    tok(","),
                ),
                generics_end(),
            ]),
        ),
    );

    let type_name = b.rule(
        "TypeName",
        node("Type", seq([identifier(), opt(r(generics))])),
    );

    Types {
        literal,
        builtin_type,
        generics,
        generic_parameters,
        ty,
        type_name,
    }
}
