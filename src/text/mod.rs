//! Reader for the WebAssembly text format.
//!
//! The pipeline: [`lexer::Tokenizer`] produces a lookahead-2 token stream,
//! the grammar reader builds a [`Module`] while binding names in a
//! [`names::Context`], and a final resolution pass rewrites symbolic
//! references to dense indices. The reader never stops at the first problem;
//! it resynchronizes at the closing `)` of the failed field and keeps
//! collecting diagnostics.
//!
//! # Example
//!
//! ```
//! use wader::features::Features;
//! use wader::text;
//!
//! let (module, errors) = text::read_module("(module (func $f (result i32) i32.const 42))", Features::new());
//! assert!(errors.is_empty());
//! assert_eq!(module.functions().count(), 1);
//! ```

pub mod cursor;
pub mod lexer;
pub mod literals;
pub mod names;
pub mod token;

mod reader;
mod resolve;

pub use lexer::{Lexer, Tokenizer};

use crate::error::Error;
use crate::features::Features;
use crate::module::Module;
use names::Context;

/// Read a module from text, collecting all diagnostics.
///
/// Accepts both the `(module ...)` wrapper and a bare field list. The module
/// is best-effort: fields that failed to parse are missing, and callers
/// should gate further work on `errors.is_empty()`.
pub fn read_module(source: &str, features: Features) -> (Module, Vec<Error>) {
    let mut tokenizer = Tokenizer::new(source);
    let mut ctx = Context::new(features);

    let mut module = reader::read_module(&mut tokenizer, &mut ctx);
    resolve::resolve_module(&mut module, &mut ctx);

    let mut errors = std::mem::take(&mut ctx.errors);
    for error in tokenizer.take_errors() {
        errors.push(error);
    }
    (module, errors.into_vec())
}
