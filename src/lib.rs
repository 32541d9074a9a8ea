//! wader — a reader for the WebAssembly text and binary formats.
//!
//! Both the S-expression text format (`.wat`) and the binary encoding
//! (`.wasm`) are parsed into one uniform, typed [`module::Module`] that
//! downstream validators, disassemblers, and code generators traverse.
//!
//! # Modules
//!
//! - [`text`] -- Text format reader: tokenizer, literal decoders, name
//!   tables, and the recursive-descent grammar reader.
//! - [`binary`] -- Binary format reader: LEB128 primitives, the section
//!   stream, instruction decoding, and "name" section decoding.
//! - [`module`], [`types`], [`instruction`] -- The shared typed AST.
//! - [`features`] -- Proposal switches gating opcodes, types, and
//!   constructs in both readers.
//! - [`error`] -- Located diagnostics and the error sink.
//!
//! # Example
//!
//! Read the same module from both encodings:
//!
//! ```
//! use wader::features::Features;
//! use wader::{binary, text};
//!
//! let (from_text, errors) = text::read_module("(module)", Features::new());
//! assert!(errors.is_empty());
//!
//! let bytes = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
//! let (from_binary, errors) = binary::read_module(&bytes, Features::new());
//! assert!(errors.is_empty());
//!
//! assert_eq!(from_text.items.len(), from_binary.items.len());
//! ```
//!
//! # Error handling
//!
//! Neither reader stops at the first problem. Both return a best-effort
//! `Module` plus every diagnostic collected along the way; gate downstream
//! work on the error list being empty.

pub mod binary;
pub mod error;
pub mod features;
pub mod instruction;
pub mod location;
pub mod module;
pub mod text;
pub mod types;

pub use error::Error;
pub use features::Features;
pub use location::Span;
pub use module::Module;
