//! A parser for sdsl shader files, built as a packrat-interpreted rule graph.
//!
//! # Parsing a source file
//!
//! ```rust
//! let source = "shader T : A, B<float> { float3 Position; };";
//! let tree = sdsl_parse::Parser::parse_str(source).unwrap();
//! let bases = tree.root.children_tagged("BaseShader").count();
//! assert_eq!(bases, 2);
//! ```
//!
//! # Preprocessor
//!
//! Conditional blocks (`#if`, `#ifdef`, `#ifndef`, `#elif`, `#else`, `#endif`) are resolved
//! before the shader grammar runs, against the `#define`s of the file and the names given in
//! [`ParseOptions`]. The directive structure is kept in [`MatchTree::directives`].
//!
//! ```rust
//! # use sdsl_parse::{Parser, ParseOptions};
//! let source = "shader S {\n#ifdef SKINNED\n  stage float4x4 Bones[64];\n#endif\n};";
//! let options = ParseOptions::default().with_define("SKINNED", "");
//! let tree = Parser::parse_with_options(source, &options).unwrap();
//! assert!(tree.root.find("ValueDeclaration").is_some());
//!
//! let tree = Parser::parse_str(source).unwrap();
//! assert!(tree.root.find("ValueDeclaration").is_none());
//! ```
//!
//! # Match tree
//!
//! see [match tree]. Nodes are tagged with rule names and implement
//! [`Display`][std::fmt::Display] as an indented dump.
//!
//! [match tree]: tree

pub mod error;
pub mod lexer;
pub mod parser;
pub mod preprocess;
pub mod rule;
pub mod span;
pub mod tree;

mod grammar;
mod matcher;

pub use error::{Error, ParseError, SpannedError};
pub use grammar::Entry;
pub use parser::{ParseOptions, Parser};
pub use tree::{MatchNode, MatchTree, Value};

/// Parses a complete shader source with the default [`ParseOptions`].
pub fn parse(source: &str) -> Result<MatchTree, Error> {
    source.parse()
}
