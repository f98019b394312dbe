#![cfg_attr(not(test), allow(dead_code, unused_imports))]

use std::{
    fmt::Display,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

#[cfg(test)]
use indoc::indoc;
use serde::Deserialize;
use sdsl_parse::{Entry, Error, MatchNode, ParseError, ParseOptions, Parser};

fn sample_paths() -> Vec<PathBuf> {
    let dir = std::fs::read_dir("samples").expect("missing directory samples");
    let mut paths = Vec::new();
    for entry in dir {
        let entry = entry.expect("error reading entry");
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sdsl") {
            paths.push(path);
        }
    }
    paths.sort();
    paths
}

/// Children lie inside their parent, in order and without overlapping.
fn check_spans(node: &MatchNode) {
    let mut prev_end = node.span.start;
    for child in &node.children {
        assert!(
            node.span.contains_span(&child.span),
            "{} {} is not inside {} {}",
            child.tag,
            child.span,
            node.tag,
            node.span
        );
        assert!(
            child.span.start >= prev_end,
            "{} {} overlaps its previous sibling",
            child.tag,
            child.span
        );
        prev_end = child.span.end;
        check_spans(child);
    }
}

#[test]
fn samples() {
    let variants = [
        ParseOptions::default(),
        ParseOptions::default().with_define("USE_SHADOWS", ""),
    ];
    for path in sample_paths() {
        println!("testing sample `{}`", path.display());
        let source = std::fs::read_to_string(&path).expect("failed to read file");
        for options in &variants {
            let tree = Parser::parse_with_options(&source, options)
                .inspect_err(|err| eprintln!("{err}"))
                .expect("parse error");
            assert_eq!(tree.root.tag, "ShaderProgram");
            check_spans(&tree.directives);
            check_spans(&tree.root);
        }
    }
}

#[test]
fn sample_branches() {
    let source = std::fs::read_to_string("samples/shadowed_lighting.sdsl")
        .expect("missing sample shadowed_lighting");

    let tree = Parser::parse_str(&source).expect("parse error");
    let names = tree
        .root
        .find_all("ValueDeclaration")
        .filter_map(|decl| decl.child("Identifier").and_then(MatchNode::text))
        .collect::<Vec<_>>();
    assert_eq!(names, ["CascadeCount", "Albedo"]);
    assert!(tree.root.find("ChainAssignment").is_none());

    let options = ParseOptions::default()
        .with_define("USE_SHADOWS", "")
        .with_define("MAX_CASCADES", "2");
    let tree = Parser::parse_with_options(&source, &options).expect("parse error");
    let bias = tree
        .root
        .find_all("ValueDeclaration")
        .find(|decl| decl.child("Identifier").and_then(MatchNode::text) == Some("ShadowBias"))
        .expect("missing ShadowBias");
    // QUALITY expands to `(MAX_LIGHTS >> 1)`, which is 4
    assert_eq!(bias.slice(&source), "stage float ShadowBias = Bias * 0.5;");
    assert!(tree.root.find("ChainAssignment").is_some());
    assert!(!tree
        .root
        .find_all("Identifier")
        .any(|id| id.text() == Some("CascadeCount")));
}

#[test]
fn concurrent_parses() {
    let sources = sample_paths()
        .iter()
        .map(|path| std::fs::read_to_string(path).expect("failed to read file"))
        .collect::<Vec<_>>();
    let expected = sources
        .iter()
        .map(|source| Parser::parse_str(source).expect("parse error"))
        .collect::<Vec<_>>();

    std::thread::scope(|scope| {
        let handles = (0..8)
            .map(|i| {
                let sources = &sources;
                scope.spawn(move || {
                    sources
                        .iter()
                        .cycle()
                        .skip(i)
                        .take(sources.len() * 4)
                        .map(|source| Parser::parse_str(source).expect("parse error"))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        for (i, handle) in handles.into_iter().enumerate() {
            let trees = handle.join().expect("parser thread panicked");
            for (j, tree) in trees.iter().enumerate() {
                assert_eq!(tree, &expected[(i + j) % sources.len()]);
            }
        }
    });
}

#[derive(PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CaseEntry {
    /// A full parse, with the preprocessor.
    Shader,
    Directives,
    Condition,
    Expression,
    Statement,
    Member,
    Type,
}

impl CaseEntry {
    fn parse(&self, code: &str) -> Result<&'static str, Error> {
        let entry = match self {
            CaseEntry::Shader => {
                return Parser::parse_str(code)
                    .map(|tree| tree.root.tag)
                    .map_err(Error::from)
            }
            CaseEntry::Directives => Entry::Directives,
            CaseEntry::Condition => Entry::DirectiveExpression,
            CaseEntry::Expression => Entry::Expression,
            CaseEntry::Statement => Entry::Statement,
            CaseEntry::Member => Entry::ShaderMember,
            CaseEntry::Type => Entry::Type,
        };
        Parser::parse_entry(entry, code)
            .map(|node| node.tag)
            .map_err(Error::from)
    }
}

#[derive(Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum CaseExpect {
    Pass,
    Fail,
}

impl Display for CaseExpect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseExpect::Pass => f.write_str("Pass"),
            CaseExpect::Fail => f.write_str("Fail"),
        }
    }
}

#[derive(Deserialize)]
struct SyntaxCase {
    name: String,
    entry: CaseEntry,
    code: String,
    expect: CaseExpect,
    /// The tag of the root node, for passing cases.
    tag: Option<String>,
    /// The error variant, for failing cases.
    error: Option<String>,
}

fn error_kind(error: &ParseError) -> &'static str {
    match error {
        ParseError::LexicalMismatch => "LexicalMismatch",
        ParseError::AlternativeExhausted { .. } => "AlternativeExhausted",
        ParseError::UnterminatedDirective(_) => "UnterminatedDirective",
        ParseError::RecursionLimitExceeded(_) => "RecursionLimitExceeded",
        ParseError::InvalidCondition(_) => "InvalidCondition",
    }
}

#[test]
fn syntax_cases() {
    let dir = std::fs::read_dir("cases").expect("missing directory cases");
    let mut total_fails = 0;
    let mut total_count = 0;

    for entry in dir {
        let entry = entry.expect("error reading entry");
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            let (fails, count) = json_cases(&path);
            println!("{fails}/{count} failures");
            total_fails += fails;
            total_count += count;
        }
    }

    let total_pass = total_count - total_fails;
    println!("SUMMARY: {total_pass}/{total_count} Pass, {total_fails}/{total_count} Fails");
    assert!(total_fails == 0);
}

fn json_cases(path: &Path) -> (u32, u32) {
    let mut fails = 0;
    println!("testing json cases `{}`", path.display());

    let file = File::open(path).expect("failed to read file");
    let reader = BufReader::new(file);
    let json: Vec<SyntaxCase> = serde_json::from_reader(reader)
        .inspect_err(|err| eprintln!("{err}"))
        .expect("invalid json case file");

    for case in &json {
        let res = case.entry.parse(&case.code);
        let outcome = if res.is_ok() {
            CaseExpect::Pass
        } else {
            CaseExpect::Fail
        };
        print!(" * `{}` expect: {}, result: {outcome}", case.name, case.expect);

        let mismatch = match (&res, &case.tag, &case.error) {
            _ if outcome != case.expect => true,
            (Ok(tag), Some(expected), _) => *tag != expected.as_str(),
            (Err(err), _, Some(expected)) => error_kind(&err.error) != expected.as_str(),
            _ => false,
        };
        if mismatch {
            fails += 1;
            println!(
                "\n   CASE FAILED\n   * code: `{}`\n   * result: {:?}\n",
                case.code, res
            );
        } else {
            println!();
        }
    }

    (fails, json.len() as u32)
}

#[test]
fn matrix_type_is_one_token() {
    let node = Parser::parse_entry(Entry::Type, "float3x3").expect("parse error");
    assert_eq!(node.children.len(), 1);
    assert_eq!(node.children[0].tag, "MatrixType");
    assert_eq!(node.children[0].text(), Some("float3x3"));

    let node = Parser::parse_entry(Entry::Statement, "float4x4 m;").expect("parse error");
    let ty = node.child("Type").expect("missing type");
    assert_eq!(ty.children[0].tag, "MatrixType");
}

#[test]
fn postfix_increment_over_chain() {
    let node = Parser::parse_entry(Entry::Statement, "a.b[0].c++;").expect("parse error");
    assert_eq!(node.tag, "EmptyStatement");
    assert_eq!(node.children.len(), 1);
    let increment = &node.children[0];
    assert_eq!(increment.tag, "PostfixIncrement");
    assert_eq!(increment.children[0].tag, "AccessorChain");
    assert_eq!(increment.children[1].text(), Some("++"));
}

#[test]
fn nested_conditionals() {
    let source = indoc! {"
        #ifdef FOO
        X
        #else
        #if BAR
        Y
        #endif
        #endif
    "};
    let program = Parser::parse_directives(source).expect("parse error");
    let outer = program.child("ConditionalDirective").expect("missing outer block");
    assert!(outer.child("IfDefDirective").is_some());
    let else_ = outer.child("ElseDirective").expect("missing else");
    let inner = else_
        .find("ConditionalDirective")
        .expect("missing nested block");
    assert_eq!(inner.slice(source), "#if BAR\nY\n#endif\n");
    assert!(outer.child("EndifDirective").is_some());

    let err = Parser::parse_directives("#ifdef FOO\nX")
        .expect_err("missing #endif must fail")
        .into_owned();
    assert!(matches!(err.error, ParseError::UnterminatedDirective(_)));
}

#[test]
fn shader_bases() {
    let tree = Parser::parse_str("shader T : A, B<float> { float3 Position; };")
        .expect("parse error");
    let bases = tree.root.children_tagged("BaseShader").collect::<Vec<_>>();
    assert_eq!(bases.len(), 2);
    assert_eq!(bases[0].children[0].text(), Some("A"));
    assert!(bases[1].child("Generics").is_some());
    assert_eq!(tree.root.children_tagged("ValueDeclaration").count(), 1);
}

#[test]
fn abstract_method() {
    let node = Parser::parse_entry(
        Entry::ShaderMember,
        "abstract stage void Foo(in float3 p : POSITION);",
    )
    .expect("parse error");
    assert_eq!(node.tag, "AbstractMethod");
    let modifiers = node
        .children_tagged("Modifier")
        .filter_map(MatchNode::text)
        .collect::<Vec<_>>();
    assert_eq!(modifiers, ["abstract", "stage"]);

    let param = node.find("Parameter").expect("missing parameter");
    let flag = param.child("StorageFlag").expect("missing storage flag");
    assert_eq!(flag.text(), Some("in"));
    let semantic = param.child("Semantic").expect("missing semantic");
    assert_eq!(semantic.children[0].text(), Some("POSITION"));
}

/// Runs `f` on a thread with a stack large enough for the default recursion limit.
fn with_large_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(32 << 20)
        .spawn(f)
        .expect("failed to spawn parser thread")
        .join()
        .expect("parser thread panicked")
}

#[test]
fn recursion_limit() {
    let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));

    let source = nested(64);
    let node = with_large_stack(move || {
        Parser::parse_entry(Entry::Expression, &source).map_err(|e| e.into_owned())
    })
    .expect("64 levels of parentheses must parse");
    assert_eq!(node.tag, "ParenthesisExpression");

    let source = format!("void F() {}{}", "{".repeat(100), "}".repeat(100));
    let node = with_large_stack(move || {
        Parser::parse_entry(Entry::ShaderMember, &source).map_err(|e| e.into_owned())
    })
    .expect("100 nested blocks must parse");
    assert_eq!(node.tag, "MethodDeclaration");

    let source = nested(200);
    let err = with_large_stack(move || {
        Parser::parse_entry(Entry::Expression, &source).map_err(|e| e.into_owned())
    })
    .expect_err("deep nesting must fail");
    assert_eq!(err.error, ParseError::RecursionLimitExceeded(128));

    let options = ParseOptions::default().with_recursion_limit(8);
    let source = format!("shader T {{ float x = {}; }}", nested(10));
    let err = Parser::parse_with_options(&source, &options)
        .expect_err("limit must apply to full parses")
        .into_owned();
    assert_eq!(err.error, ParseError::RecursionLimitExceeded(8));
    let options = options.with_recursion_limit(16);
    assert!(Parser::parse_with_options(&source, &options).is_ok());
}

#[test]
fn directives_in_comments() {
    let source = indoc! {"
        shader S {
        /*
        #endif
        */
        /* disabled:
        #ifdef SKINNED
          float4x4 Bones[64];
        */
            float x;
        #if 0
            /* a comment that closes
        #else
            in the inactive branch */
        #endif
        };
    "};
    let tree = Parser::parse_str(source).expect("parse error");
    let names = tree
        .root
        .find_all("ValueDeclaration")
        .filter_map(|decl| decl.child("Identifier").and_then(MatchNode::text))
        .collect::<Vec<_>>();
    assert_eq!(names, ["x"]);
    assert_eq!(tree.directives.children_tagged("ConditionalDirective").count(), 1);
    let conditional = tree.directives.child("ConditionalDirective").expect("missing #if");
    assert!(conditional.child("ElseDirective").is_none());
}

#[test]
fn macro_chains() {
    // each macro references the next one twice
    let defines = (0..48)
        .map(|i| format!("#define M{} (M{1} + M{1})\n", i, i + 1))
        .collect::<String>();
    let source = format!("{defines}#define M48 1\n#if M20 == 1 << 28\nshader T {{ }}\n#endif\n");
    let tree = Parser::parse_str(&source).expect("parse error");
    assert_eq!(tree.root.tag, "ShaderProgram");
}

#[test]
fn switch_sections() {
    let node = Parser::parse_entry(
        Entry::Statement,
        "switch (mode) { case 0: case 1: x = 1; break; default: return; }",
    )
    .expect("parse error");
    let sections = node.children_tagged("SwitchSection").collect::<Vec<_>>();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].children_tagged("CaseLabel").count(), 2);
    assert!(sections[0].child("Assignment").is_some());
    assert!(sections[0].child("BreakStatement").is_some());
    assert!(sections[1].child("DefaultLabel").is_some());
    assert!(sections[1].child("ReturnStatement").is_some());
}

#[test]
fn declarator_lists() {
    let node = Parser::parse_entry(Entry::ShaderMember, "stage float a, b = 2, c[4] : C;")
        .expect("parse error");
    assert_eq!(node.child("Identifier").and_then(MatchNode::text), Some("a"));
    let declarators = node
        .children_tagged("Declarator")
        .filter_map(|d| d.child("Identifier").and_then(MatchNode::text))
        .collect::<Vec<_>>();
    assert_eq!(declarators, ["b", "c"]);

    let node = Parser::parse_entry(Entry::ShaderMember, "typedef float3 Normal, Tangents[2];")
        .expect("parse error");
    assert_eq!(node.tag, "Typedef");
    assert_eq!(node.children_tagged("Declarator").count(), 2);
}

#[test]
fn generic_methods() {
    let node = Parser::parse_entry(Entry::ShaderMember, "float4 F<T, float Scale>(T x) { return x; }")
        .expect("parse error");
    assert_eq!(node.tag, "MethodDeclaration");
    let generics = node.child("Generics").expect("missing generics");
    assert_eq!(generics.children[0].tag, "Type");
    assert_eq!(generics.children[1].tag, "GenericParameter");

    let node = Parser::parse_entry(Entry::ShaderMember, "void Draw(line l, triangle Vertex v[3]) { }")
        .expect("parse error");
    let params = node.find_all("Parameter").collect::<Vec<_>>();
    assert!(params[0].child("StorageFlag").is_none());
    assert_eq!(params[0].find("Identifier").and_then(MatchNode::text), Some("line"));
    assert_eq!(
        params[1].child("StorageFlag").and_then(MatchNode::text),
        Some("triangle")
    );
}

#[test]
fn error_location() {
    let source = indoc! {"
        shader T
        {
            float4 = 1;
        };"};
    let err = Parser::parse_str(source).expect_err("missing name").into_owned();
    assert_eq!(err.line_col(source), (3, 12));
    let rendered = Parser::parse_str(source).unwrap_err().to_string();
    assert!(rendered.contains("float4 = 1;"), "{rendered}");
}
