//! `shader Name<generics> : Bases { members };`

use crate::rule::{many0, node, opt, r, sep_by1, seq, tok, GrammarBuilder, Rule, RuleId};

use super::{
    declarations::Declarations,
    terminals::{identifier, Types},
};

pub(super) struct Shader {
    pub shader_program: RuleId,
    pub shader_member: RuleId,
}

pub(super) fn define(b: &mut GrammarBuilder, types: &Types, decls: &Declarations) -> Shader {
    let base_shader = b.rule(
        "BaseShader",
        node("BaseShader", seq([identifier(), opt(r(types.generics))])),
    );

    let mut members = vec![
        r(decls.struct_definition),
        r(decls.constant_buffer),
        r(decls.typedef),
    ];
    members.extend(decls.entry_points.iter().map(|id| r(*id)));
    members.extend([
        r(decls.abstract_method),
        r(decls.method_declaration),
        r(decls.value_declaration),
    ]);
    let shader_member = b.rule("ShaderMember", Rule::Alt(members));

    let shader_program = b.rule(
        "ShaderProgram",
        node(
            "ShaderProgram",
            seq([
                tok("shader"),
                identifier(),
                opt(r(types.generic_parameters)),
                opt(seq([tok(":"), sep_by1(r(base_shader), tok(","))])),
                tok("{"),
                many0(r(shader_member)),
                tok("}"),
                opt(tok(";")),
            ]),
        ),
    );

    Shader {
        shader_program,
        shader_member,
    }
}
