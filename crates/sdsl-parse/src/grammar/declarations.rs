//! Structs, constant buffers, variables and methods.

use crate::rule::{
    alt, many0, node, not, one_of, opt, peek, r, sep_by1, seq, term, tok, word, GrammarBuilder,
    Rule, RuleId, Terminal,
};

use super::{
    expressions::Expressions,
    statements::{variable_modifiers, Statements},
    terminals::{identifier, Types},
};

/// `abstract` is only accepted on methods without a body.
const METHOD_MODIFIERS: [&str; 4] = ["stage", "override", "static", "clone"];

const STORAGE_FLAGS: [&str; 10] = [
    "in",
    "out",
    "inout",
    "uniform",
    "const",
    "point",
    "line",
    "triangle",
    "lineadj",
    "triangleadj",
];

/// Stage entry points: method name and node tag.
pub(super) const ENTRY_POINTS: [(&str, &str); 7] = [
    ("VSMain", "VertexEntryPoint"),
    ("PSMain", "PixelEntryPoint"),
    ("GSMain", "GeometryEntryPoint"),
    ("CSMain", "ComputeEntryPoint"),
    ("HSMain", "HullEntryPoint"),
    ("HSConstantsMain", "HullConstantsEntryPoint"),
    ("DSMain", "DomainEntryPoint"),
];

pub(super) struct Declarations {
    pub struct_definition: RuleId,
    pub constant_buffer: RuleId,
    pub typedef: RuleId,
    pub value_declaration: RuleId,
    pub abstract_method: RuleId,
    pub method_declaration: RuleId,
    /// One cell per entry point, in the order of [`ENTRY_POINTS`].
    pub entry_points: Vec<RuleId>,
}

pub(super) fn define(
    b: &mut GrammarBuilder,
    types: &Types,
    exprs: &Expressions,
    stmts: &Statements,
) -> Declarations {
    let semantic = b.rule(
        "Semantic",
        node("Semantic", seq([tok(":"), identifier()])),
    );
    let pack_offset = b.rule(
        "PackOffset",
        node(
            "PackOffset",
            seq([
                tok(":"),
                tok("packoffset"),
                tok("("),
                identifier(),
                many0(seq([tok("."), identifier()])),
                tok(")"),
            ]),
        ),
    );
    let register = b.rule(
        "Register",
        node(
            "Register",
            seq([
                tok(":"),
                tok("register"),
                tok("("),
                sep_by1(alt([identifier(), term(Terminal::Integer)]), tok(",")),
                tok(")"),
            ]),
        ),
    );
    let array_sizes = || many0(r(stmts.array_size));

    let struct_member = b.rule(
        "StructMember",
        node(
            "StructMember",
            seq([
                variable_modifiers(),
                r(types.ty),
                identifier(),
                array_sizes(),
                opt(r(semantic)),
                tok(";"),
            ]),
        ),
    );
    let struct_definition = b.rule(
        "StructDefinition",
        node(
            "StructDefinition",
            seq([
                tok("struct"),
                identifier(),
                tok("{"),
                many0(r(struct_member)),
                tok("}"),
                opt(tok(";")),
            ]),
        ),
    );

    // `float a : A, b[2] = { 1, 2 };`, declarators after the first get their own node
    let declarator = b.rule(
        "Declarator",
        node(
            "Declarator",
            seq([
                identifier(),
                array_sizes(),
                opt(seq([tok("="), r(stmts.initializer)])),
                opt(alt([r(pack_offset), r(register), r(semantic)])),
            ]),
        ),
    );
    let value_declaration = b.rule(
        "ValueDeclaration",
        node(
            "ValueDeclaration",
            seq([
                variable_modifiers(),
                r(types.ty),
                identifier(),
                array_sizes(),
                opt(seq([tok("="), r(stmts.initializer)])),
                opt(alt([r(pack_offset), r(register), r(semantic)])),
                many0(seq([tok(","), r(declarator)])),
                tok(";"),
            ]),
        ),
    );

    let typedef = b.rule(
        "Typedef",
        node(
            "Typedef",
            seq([
                tok("typedef"),
                opt(word("const", "Modifier")),
                r(types.ty),
                sep_by1(
                    node("Declarator", seq([identifier(), array_sizes()])),
                    tok(","),
                ),
                tok(";"),
            ]),
        ),
    );

    let constant_buffer = b.rule(
        "ConstantBuffer",
        node(
            "ConstantBuffer",
            seq([
                one_of(&["cbuffer", "rgroup"], "BufferKind"),
                identifier(),
                tok("{"),
                many0(r(value_declaration)),
                tok("}"),
                opt(tok(";")),
            ]),
        ),
    );

    // methods
    // a flag directly followed by the parameter name is the type, as in `line l`
    let storage_flag = seq([
        one_of(&STORAGE_FLAGS, "StorageFlag"),
        not(seq([
            identifier(),
            alt([tok(","), tok(")"), tok("="), tok(":"), tok("[")]),
        ])),
    ]);
    let parameter = b.rule(
        "Parameter",
        node(
            "Parameter",
            seq([
                many0(storage_flag),
                r(types.ty),
                identifier(),
                array_sizes(),
                opt(r(semantic)),
                opt(seq([tok("="), r(exprs.expression)])),
            ]),
        ),
    );
    let parameter_list = b.rule(
        "ParameterList",
        node(
            "ParameterList",
            seq([
                tok("("),
                opt(sep_by1(r(parameter), tok(","))),
                tok(")"),
            ]),
        ),
    );
    let return_type = b.rule(
        "ReturnType",
        alt([word("void", "VoidType"), r(types.ty)]),
    );
    let modifiers = || one_of(&METHOD_MODIFIERS, "Modifier");
    let attributes = || many0(r(stmts.attribute));
    let method = |modifiers: Rule, name: Rule, body: Rule| {
        Rule::Seq(vec![
            attributes(),
            modifiers,
            r(return_type),
            name,
            opt(r(types.generic_parameters)),
            r(parameter_list),
            opt(r(semantic)),
            body,
        ])
    };

    let is_abstract = b.rule(
        "IsAbstract",
        seq([attributes(), many0(modifiers()), tok("abstract")]),
    );
    let abstract_method = b.rule(
        "AbstractMethod",
        node(
            "AbstractMethod",
            seq([
                peek(r(is_abstract)),
                method(
                    many0(alt([word("abstract", "Modifier"), modifiers()])),
                    identifier(),
                    tok(";"),
                ),
            ]),
        ),
    );
    let method_declaration = b.rule(
        "MethodDeclaration",
        node(
            "MethodDeclaration",
            method(many0(modifiers()), identifier(), r(stmts.block)),
        ),
    );

    let entry_points = ENTRY_POINTS
        .iter()
        .map(|&(name, tag)| {
            let name = word(name, "Identifier");
            let rule = node(tag, method(many0(modifiers()), name, r(stmts.block)));
            b.rule(tag, rule)
        })
        .collect();

    Declarations {
        struct_definition,
        constant_buffer,
        typedef,
        value_declaration,
        abstract_method,
        method_declaration,
        entry_points,
    }
}
