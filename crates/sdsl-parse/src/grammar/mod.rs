//! The sdsl rule graph.
//!
//! The grammar is assembled once, on first use, from the rule sets in the submodules. Each
//! submodule declares the cells it owns and receives the cells it depends on, so the
//! construction order below is the dependency order of the language:
//! terminals and types, expressions, statements, declarations, and the shader program.
//! The preprocessor grammar builds its own flavor of the expression rules.

mod declarations;
mod directives;
mod expressions;
mod shader;
mod statements;
mod terminals;

use std::sync::LazyLock;

use crate::{
    lexer::Trivia,
    rule::{line, r, seq, term, Grammar, GrammarBuilder, RuleId, Terminal, UndefinedRule},
};

use expressions::Flavor;

/// The rule cells a parse can start from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entry {
    /// A complete shader program, anchored at the end of input.
    Shader,
    /// The preprocessor structure of a source file.
    Directives,
    /// A single preprocessor condition or `#define` value.
    DirectiveExpression,
    Expression,
    Statement,
    /// A declaration that can appear in a shader body.
    ShaderMember,
    Type,
}

impl Entry {
    /// The trivia mode the entry starts in.
    pub(crate) fn trivia(&self) -> Trivia {
        match self {
            Entry::Directives => Trivia::Line,
            _ => Trivia::Code,
        }
    }
}

pub(crate) struct SdslGrammar {
    pub grammar: Grammar,
    shader: RuleId,
    directives: RuleId,
    directive_expression: RuleId,
    expression: RuleId,
    statement: RuleId,
    shader_member: RuleId,
    ty: RuleId,
}

impl SdslGrammar {
    pub fn entry(&self, entry: Entry) -> RuleId {
        match entry {
            Entry::Shader => self.shader,
            Entry::Directives => self.directives,
            Entry::DirectiveExpression => self.directive_expression,
            Entry::Expression => self.expression,
            Entry::Statement => self.statement,
            Entry::ShaderMember => self.shader_member,
            Entry::Type => self.ty,
        }
    }
}

fn build() -> Result<SdslGrammar, UndefinedRule> {
    let mut b = GrammarBuilder::new();

    // entries first, so that diagnostics at the top level name them.
    let shader = b.declare("Shader");
    let directives = b.declare("Directives");
    let directive_expression = b.declare("DirectiveExpressionEntry");
    let expression = b.declare("ExpressionEntry");
    let statement = b.declare("StatementEntry");
    let shader_member = b.declare("ShaderMemberEntry");
    let ty = b.declare("TypeEntry");

    let types = terminals::define(&mut b);
    let code = expressions::define(&mut b, &types, Flavor::Code);
    let stmts = statements::define(&mut b, &types, &code);
    let decls = declarations::define(&mut b, &types, &code, &stmts);
    let program = shader::define(&mut b, &types, &decls);
    let dirs = directives::define(&mut b, &types);

    let end = || term(Terminal::End);
    b.define(shader, seq([r(program.shader_program), end()]));
    b.define(directives, line(r(dirs.program)));
    b.define(directive_expression, seq([r(dirs.expression), end()]));
    b.define(expression, seq([r(code.expression), end()]));
    b.define(statement, seq([r(stmts.statement), end()]));
    b.define(shader_member, seq([r(program.shader_member), end()]));
    b.define(ty, seq([r(types.ty), end()]));

    let grammar = b.finish()?;
    log::debug!("built sdsl grammar with {} rules", grammar.len());

    Ok(SdslGrammar {
        grammar,
        shader,
        directives,
        directive_expression,
        expression,
        statement,
        shader_member,
        ty,
    })
}

pub(crate) static GRAMMAR: LazyLock<SdslGrammar> =
    LazyLock::new(|| build().expect("sdsl grammar is incomplete"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rule_is_defined() {
        let grammar = build().unwrap();
        assert!(grammar.grammar.find("ConditionalExpression").is_some());
        assert!(grammar.grammar.find("ShaderProgram").is_some());
        assert_eq!(grammar.grammar.name(grammar.entry(Entry::Shader)), "Shader");
    }
}
