//! gilt - incremental Go-to-Lua REPL compiler core
//!
//! Type checks each chunk of prompt input against everything declared
//! before it, resolves imports from bridge tables or foreign Go source,
//! and hands the checked result to a scripting runtime.

pub mod ast;
pub mod config;
pub mod constant;
pub mod env;
pub mod error;
pub mod import;
pub mod intrinsics;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod session;
pub mod stdlib;
pub mod typechecker;
pub mod types;
pub mod universe;

pub use error::{GiltError, Result};
pub use session::Session;
