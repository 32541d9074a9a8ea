//! Recursive-descent reader for the text format.
//!
//! Each function corresponds to a grammar production and returns
//! `Option<T>`: `None` means an error was recorded on the context's sink.
//! Callers bubble `None` up with `?` to the nearest resynchronization point
//! (the module-item loop skips to the closing `)` of the failed item).
//!
//! Two-token lookahead drives every disambiguation; no token is consumed
//! speculatively.

use super::lexer::Tokenizer;
use super::literals::{self, FloatType, IntType};
use super::names::{Context, NameMap, Namespace};
use super::token::{
    InstrClass, Keyword, LaneShape, LiteralInfo, Sign, Token, TokenKind,
};
use crate::error::Errors;
use crate::instruction::{
    BlockImmediate, BrOnExnImmediate, BrTableImmediate, CallIndirectImmediate, CopyImmediate,
    Immediate, InitImmediate, Instruction, MemArgImmediate, Opcode,
};
use crate::location::Span;
use crate::module::{
    ConstantExpression, DataSegment, ElementExpression, ElementList, ElementSegment, Event,
    EventAttribute, EventType, Export, Function, Global, GlobalType, Import, ImportDesc,
    InlineExport, InlineImport, Memory, MemoryType, Module, ModuleItem, SegmentMode, Start,
    Table, TableType, TypeEntry,
};
use crate::types::{
    BoundFunctionType, BoundValueType, ExternalKind, FunctionType, FunctionTypeUse, HeapKind,
    HeapType, Limits, Mutability, ReferenceType, Shared, ValueType, Var,
};

/// Read a whole module: either `(module $id? field*)` or a bare field list.
/// The caller runs name resolution afterwards.
pub fn read_module(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Module {
    ctx.begin_module();
    let mut module = Module::new();

    let wrapped = tokenizer.match_lpar_keyword(Keyword::Module).is_some();
    if wrapped {
        if matches!(tokenizer.peek(0).kind, TokenKind::Id(_)) {
            if let TokenKind::Id(name) = tokenizer.read().kind {
                module.name = Some(name);
            }
        }
    }

    loop {
        let kind = tokenizer.peek(0).kind.clone();
        match kind {
            TokenKind::Eof => break,
            TokenKind::Rpar if wrapped => break,
            TokenKind::Lpar => {
                let depth = tokenizer.paren_depth();
                if is_module_item(tokenizer) {
                    match read_module_item(tokenizer, ctx) {
                        Some(item) => module.push(item),
                        None => synchronize(tokenizer, depth),
                    }
                } else {
                    let token = tokenizer.peek(1);
                    let message = format!(
                        "Expected 'type', 'import', 'func', 'table', 'memory', 'global', \
                         'export', 'start', 'elem', 'data', or 'event', got {}",
                        token.kind.desc()
                    );
                    let span = token.span;
                    ctx.errors.on_error(span, message);
                    tokenizer.read();
                    synchronize(tokenizer, depth);
                }
            }
            _ => {
                let token = tokenizer.read();
                ctx.errors
                    .on_error(token.span, format!("Expected '(', got {}", token.kind.desc()));
            }
        }
    }

    if wrapped {
        expect_rpar(tokenizer, ctx);
        if tokenizer.peek(0).kind != TokenKind::Eof {
            let token = tokenizer.peek(0);
            let (span, desc) = (token.span, token.kind.desc());
            ctx.errors
                .on_error(span, format!("Expected end of input, got {}", desc));
        }
    }
    let end = tokenizer.here();

    // Synthesize the deferred inline types as real type entries.
    for ty in ctx.end_module() {
        module.push(ModuleItem::Type(TypeEntry {
            span: end,
            name: None,
            ty: ty.into(),
        }));
    }

    module
}

/// Skip tokens until the parenthesis depth drops back to `depth`.
fn synchronize(tokenizer: &mut Tokenizer, depth: i64) {
    while tokenizer.paren_depth() > depth && tokenizer.peek(0).kind != TokenKind::Eof {
        tokenizer.read();
    }
}

fn is_module_item(tokenizer: &mut Tokenizer) -> bool {
    if tokenizer.peek(0).kind != TokenKind::Lpar {
        return false;
    }
    matches!(
        tokenizer.peek(1).kind,
        TokenKind::Keyword(
            Keyword::Type
                | Keyword::Import
                | Keyword::Func
                | Keyword::Table
                | Keyword::Memory
                | Keyword::Global
                | Keyword::Export
                | Keyword::Start
                | Keyword::Elem
                | Keyword::Data
                | Keyword::Event
        )
    )
}

fn read_module_item(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<ModuleItem> {
    let kw = match &tokenizer.peek(1).kind {
        TokenKind::Keyword(kw) => *kw,
        _ => unreachable!("checked by is_module_item"),
    };
    match kw {
        Keyword::Type => read_type_entry(tokenizer, ctx).map(ModuleItem::Type),
        Keyword::Import => read_import(tokenizer, ctx).map(ModuleItem::Import),
        Keyword::Func => read_function(tokenizer, ctx).map(ModuleItem::Function),
        Keyword::Table => read_table(tokenizer, ctx).map(ModuleItem::Table),
        Keyword::Memory => read_memory(tokenizer, ctx).map(ModuleItem::Memory),
        Keyword::Global => read_global(tokenizer, ctx).map(ModuleItem::Global),
        Keyword::Export => read_export(tokenizer, ctx).map(ModuleItem::Export),
        Keyword::Start => read_start(tokenizer, ctx).map(ModuleItem::Start),
        Keyword::Elem => read_element_segment(tokenizer, ctx).map(ModuleItem::Element),
        Keyword::Data => read_data_segment(tokenizer, ctx).map(ModuleItem::Data),
        Keyword::Event => read_event(tokenizer, ctx).map(ModuleItem::Event),
        _ => unreachable!("checked by is_module_item"),
    }
}

// ----------------------------------------------------------------------
// Token-level helpers
// ----------------------------------------------------------------------

fn span_from(tokenizer: &Tokenizer, start: Span) -> Span {
    Span::new(start.start, tokenizer.last_end(), start.line, start.column)
}

fn expect_rpar(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Token> {
    if tokenizer.peek(0).kind == TokenKind::Rpar {
        Some(tokenizer.read())
    } else {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected ')', got {}", desc));
        None
    }
}

fn expect_lpar_keyword(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    kw: Keyword,
) -> Option<Token> {
    match tokenizer.match_lpar_keyword(kw) {
        Some(token) => Some(token),
        None => {
            let first = tokenizer.peek(0).kind.desc();
            let second = tokenizer.peek(1).kind.desc();
            let span = tokenizer.peek(0).span;
            ctx.errors.on_error(
                span,
                format!("Expected '(' '{}', got {} {}", kw.as_str(), first, second),
            );
            None
        }
    }
}

// ----------------------------------------------------------------------
// Literals and variables
// ----------------------------------------------------------------------

fn read_nat32(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<u32> {
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    match kind {
        TokenKind::Nat(info) => {
            let token = tokenizer.read();
            let text = token.text(tokenizer.source());
            match literals::str_to_nat::<u32>(info, text) {
                Some(value) => Some(value),
                None => {
                    ctx.errors
                        .on_error(span, format!("Invalid natural number, got {}", text));
                    None
                }
            }
        }
        other => {
            ctx.errors.on_error(
                span,
                format!("Expected a natural number, got {}", other.desc()),
            );
            None
        }
    }
}

fn read_int<T: IntType>(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<T> {
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    let info = match kind {
        TokenKind::Nat(info) | TokenKind::Int(info) => info,
        other => {
            ctx.errors
                .on_error(span, format!("Expected an integer, got {}", other.desc()));
            return None;
        }
    };
    let token = tokenizer.read();
    let text = token.text(tokenizer.source());
    match literals::str_to_int::<T>(info, text) {
        Some(value) => Some(value),
        None => {
            ctx.errors
                .on_error(span, format!("Invalid integer, got {}", text));
            None
        }
    }
}

fn read_float<T: FloatType>(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<T> {
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    let info = match kind {
        TokenKind::Nat(info) | TokenKind::Int(info) | TokenKind::Float(info) => info,
        other => {
            ctx.errors
                .on_error(span, format!("Expected a float, got {}", other.desc()));
            return None;
        }
    };
    let token = tokenizer.read();
    let text = token.text(tokenizer.source());
    match literals::str_to_float::<T>(info, text) {
        Some(value) => Some(value),
        None => {
            ctx.errors
                .on_error(span, format!("Invalid float, got {}", text));
            None
        }
    }
}

fn read_var_opt(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Var> {
    let kind = tokenizer.peek(0).kind.clone();
    match kind {
        TokenKind::Id(name) => {
            tokenizer.read();
            Some(Var::Name(name))
        }
        TokenKind::Nat(_) => read_nat32(tokenizer, ctx).map(Var::Index),
        _ => None,
    }
}

fn read_var(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Var> {
    let token = tokenizer.peek(0);
    let (span, desc) = (token.span, token.kind.desc());
    match read_var_opt(tokenizer, ctx) {
        Some(var) => Some(var),
        None => {
            // A malformed natural number was consumed and already reported.
            if tokenizer.here() == span {
                ctx.errors
                    .on_error(span, format!("Expected a variable, got {}", desc));
            }
            None
        }
    }
}

fn read_var_list(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Vec<Var> {
    let mut vars = Vec::new();
    while let Some(var) = read_var_opt(tokenizer, ctx) {
        vars.push(var);
    }
    vars
}

fn read_non_empty_var_list(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Vec<Var>> {
    let first = read_var(tokenizer, ctx)?;
    let mut vars = vec![first];
    vars.extend(read_var_list(tokenizer, ctx));
    Some(vars)
}

/// `(kw var)`, e.g. a `(type $t)`, `(table $t)`, or `(memory $m)` use.
fn read_var_use_opt(tokenizer: &mut Tokenizer, ctx: &mut Context, kw: Keyword) -> Option<Var> {
    tokenizer.match_lpar_keyword(kw)?;
    let var = read_var(tokenizer, ctx);
    expect_rpar(tokenizer, ctx)?;
    var
}

fn read_type_use_opt(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Var> {
    read_var_use_opt(tokenizer, ctx, Keyword::Type)
}

fn read_text(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Vec<u8>> {
    let token = tokenizer.peek(0);
    let (span, desc) = (token.span, token.kind.desc());
    if matches!(token.kind, TokenKind::Text(_)) {
        match tokenizer.read().kind {
            TokenKind::Text(bytes) => Some(bytes),
            _ => unreachable!(),
        }
    } else {
        ctx.errors
            .on_error(span, format!("Expected quoted text, got {}", desc));
        None
    }
}

fn read_utf8_text(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<String> {
    let span = tokenizer.peek(0).span;
    let bytes = read_text(tokenizer, ctx)?;
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(_) => {
            ctx.errors.on_error(span, "Invalid UTF-8 encoding");
            None
        }
    }
}

fn read_text_list(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Vec<Vec<u8>> {
    let mut texts = Vec::new();
    while matches!(tokenizer.peek(0).kind, TokenKind::Text(_)) {
        match read_text(tokenizer, ctx) {
            Some(bytes) => texts.push(bytes),
            None => break,
        }
    }
    texts
}

/// Read an optional `$id` bind. A duplicate name is an error; the slot is
/// created unbound so later indices stay dense.
fn read_bind_var_opt(
    tokenizer: &mut Tokenizer,
    errors: &mut Errors,
    map: &mut NameMap,
) -> Option<String> {
    if !matches!(tokenizer.peek(0).kind, TokenKind::Id(_)) {
        map.new_unbound();
        return None;
    }
    let token = tokenizer.read();
    let name = match token.kind {
        TokenKind::Id(name) => name,
        _ => unreachable!(),
    };
    if let Some(index) = map.get(&name) {
        errors.on_error(
            token.span,
            format!("Variable ${} is already bound to index {}", name, index),
        );
        map.new_unbound();
        return None;
    }
    map.new_bound(&name);
    Some(name)
}

// ----------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------

fn read_value_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<ValueType> {
    if is_ref_type_form(tokenizer) {
        return read_ref_form(tokenizer, ctx).map(ValueType::Reference);
    }
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    match kind {
        TokenKind::ValueType(vt) => {
            tokenizer.read();
            if !ctx.features.contains(vt.required_features()) {
                ctx.errors
                    .on_error(span, format!("value type {} not allowed", vt));
                return None;
            }
            Some(vt)
        }
        other => {
            ctx.errors
                .on_error(span, format!("Expected value type, got {}", other.desc()));
            None
        }
    }
}

fn is_value_type_start(tokenizer: &mut Tokenizer) -> bool {
    matches!(tokenizer.peek(0).kind, TokenKind::ValueType(_)) || is_ref_type_form(tokenizer)
}

fn is_ref_type_form(tokenizer: &mut Tokenizer) -> bool {
    tokenizer.peek(0).kind == TokenKind::Lpar
        && tokenizer.peek(1).kind == TokenKind::Keyword(Keyword::Ref)
}

/// `(ref null? heaptype)` from the function-references proposal.
fn read_ref_form(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<ReferenceType> {
    let lpar = expect_lpar_keyword(tokenizer, ctx, Keyword::Ref)?;
    if !ctx.features.function_references_enabled() {
        ctx.errors
            .on_error(lpar.span, "reference type (ref ...) not allowed");
        // Keep parsing for recovery; the item still fails.
        let _ = tokenizer.match_if(|k| *k == TokenKind::Keyword(Keyword::Null));
        let _ = read_heap_type(tokenizer, ctx);
        expect_rpar(tokenizer, ctx);
        return None;
    }
    let nullable = tokenizer
        .match_if(|k| *k == TokenKind::Keyword(Keyword::Null))
        .is_some();
    let heap_type = read_heap_type(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(ReferenceType::Ref {
        nullable,
        heap_type,
    })
}

fn read_heap_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<HeapType> {
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    match kind {
        TokenKind::Keyword(Keyword::Func) => {
            tokenizer.read();
            Some(HeapType::Kind(HeapKind::Func))
        }
        TokenKind::Keyword(Keyword::Extern) => {
            tokenizer.read();
            Some(HeapType::Kind(HeapKind::Extern))
        }
        TokenKind::Keyword(Keyword::Exn) => {
            tokenizer.read();
            if !ctx.features.exceptions_enabled() {
                ctx.errors.on_error(span, "heap type exn not allowed");
                return None;
            }
            Some(HeapType::Kind(HeapKind::Exn))
        }
        TokenKind::Id(_) | TokenKind::Nat(_) => {
            if !ctx.features.function_references_enabled() {
                ctx.errors
                    .on_error(span, "indexed heap types not allowed");
                return None;
            }
            read_var(tokenizer, ctx).map(HeapType::Index)
        }
        other => {
            ctx.errors
                .on_error(span, format!("Expected heap type, got {}", other.desc()));
            None
        }
    }
}

fn read_reference_type_opt(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<ReferenceType> {
    if is_ref_type_form(tokenizer) {
        return read_ref_form(tokenizer, ctx);
    }
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    match kind {
        TokenKind::ValueType(ValueType::Reference(rt)) => {
            tokenizer.read();
            if !ctx.features.contains(rt.required_features_as_element()) {
                ctx.errors
                    .on_error(span, format!("reference type {} not allowed", rt));
                return None;
            }
            Some(rt)
        }
        _ => None,
    }
}

fn read_reference_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<ReferenceType> {
    let token = tokenizer.peek(0);
    let (span, desc) = (token.span, token.kind.desc());
    let looked_like_one = matches!(
        tokenizer.peek(0).kind,
        TokenKind::ValueType(ValueType::Reference(_))
    ) || is_ref_type_form(tokenizer);
    match read_reference_type_opt(tokenizer, ctx) {
        Some(rt) => Some(rt),
        None => {
            if !looked_like_one {
                ctx.errors
                    .on_error(span, format!("Expected reference type, got {}", desc));
            }
            None
        }
    }
}

fn read_value_type_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    out: &mut Vec<ValueType>,
) -> Option<()> {
    while is_value_type_start(tokenizer) {
        out.push(read_value_type(tokenizer, ctx)?);
    }
    Some(())
}

/// `(kw valtype*)*`, flattened.
fn read_unbound_value_type_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    kw: Keyword,
) -> Option<Vec<ValueType>> {
    let mut out = Vec::new();
    while tokenizer.match_lpar_keyword(kw).is_some() {
        read_value_type_list(tokenizer, ctx, &mut out)?;
        expect_rpar(tokenizer, ctx)?;
    }
    Some(out)
}

fn read_result_list(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Vec<ValueType>> {
    read_unbound_value_type_list(tokenizer, ctx, Keyword::Result)
}

/// `(kw $id? valtype)*` or `(kw valtype*)*`. When `bind_locals` is set the
/// names land in the context's local namespace; otherwise they are checked
/// against a throwaway map (type entries bind nothing).
fn read_bound_value_type_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    kw: Keyword,
    bind_locals: bool,
) -> Option<Vec<BoundValueType>> {
    let mut dummy = NameMap::new();
    let mut out = Vec::new();
    while tokenizer.match_lpar_keyword(kw).is_some() {
        if matches!(tokenizer.peek(0).kind, TokenKind::Id(_)) {
            let name = if bind_locals {
                read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.local_names)
            } else {
                read_bind_var_opt(tokenizer, &mut ctx.errors, &mut dummy)
            };
            let value_type = read_value_type(tokenizer, ctx)?;
            out.push(BoundValueType { name, value_type });
        } else {
            let mut types = Vec::new();
            read_value_type_list(tokenizer, ctx, &mut types)?;
            for value_type in types {
                if bind_locals {
                    ctx.local_names.new_unbound();
                } else {
                    dummy.new_unbound();
                }
                out.push(BoundValueType {
                    name: None,
                    value_type,
                });
            }
        }
        expect_rpar(tokenizer, ctx)?;
    }
    Some(out)
}

fn read_bound_function_type(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    bind_locals: bool,
) -> Option<BoundFunctionType> {
    let params = read_bound_value_type_list(tokenizer, ctx, Keyword::Param, bind_locals)?;
    let results = read_result_list(tokenizer, ctx)?;
    Some(BoundFunctionType { params, results })
}

fn read_function_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<FunctionType> {
    let params = read_unbound_value_type_list(tokenizer, ctx, Keyword::Param)?;
    let results = read_result_list(tokenizer, ctx)?;
    Some(FunctionType::new(params, results))
}

/// A type use plus inline signature; records the use for type synthesis.
fn read_function_type_use(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<FunctionTypeUse> {
    let type_use = read_type_use_opt(tokenizer, ctx);
    let ty = read_function_type(tokenizer, ctx)?;
    ctx.function_type_map.use_type(type_use.is_some(), &ty);
    Some(FunctionTypeUse { type_use, ty })
}

fn read_limits(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Limits> {
    let span = tokenizer.peek(0).span;
    let min = read_nat32(tokenizer, ctx)?;
    let max = if matches!(tokenizer.peek(0).kind, TokenKind::Nat(_)) {
        Some(read_nat32(tokenizer, ctx)?)
    } else {
        None
    };

    let mut shared = Shared::No;
    if tokenizer.peek(0).kind == TokenKind::Keyword(Keyword::Shared) {
        let token = tokenizer.read();
        if !ctx.features.threads_enabled() {
            ctx.errors.on_error(token.span, "Shared memory not allowed");
            return None;
        }
        shared = Shared::Yes;
    }

    if let Some(max) = max {
        if max < min {
            ctx.errors.on_error(
                span,
                format!("Expected max >= min, got min {} max {}", min, max),
            );
            return None;
        }
    }

    Some(Limits { min, max, shared })
}

fn read_table_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<TableType> {
    let limits = read_limits(tokenizer, ctx)?;
    let element = read_reference_type(tokenizer, ctx)?;
    Some(TableType { limits, element })
}

fn read_memory_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<MemoryType> {
    let limits = read_limits(tokenizer, ctx)?;
    Some(MemoryType { limits })
}

fn read_global_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<GlobalType> {
    if tokenizer.match_lpar_keyword(Keyword::Mut).is_some() {
        let value_type = read_value_type(tokenizer, ctx)?;
        expect_rpar(tokenizer, ctx)?;
        Some(GlobalType {
            value_type,
            mutability: Mutability::Var,
        })
    } else {
        let value_type = read_value_type(tokenizer, ctx)?;
        Some(GlobalType {
            value_type,
            mutability: Mutability::Const,
        })
    }
}

fn read_event_type(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<EventType> {
    let ty = read_function_type_use(tokenizer, ctx)?;
    Some(EventType {
        attribute: EventAttribute::Exception,
        ty,
    })
}

// ----------------------------------------------------------------------
// Module items
// ----------------------------------------------------------------------

fn read_type_entry(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<TypeEntry> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Type)?;
    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.type_names);
    expect_lpar_keyword(tokenizer, ctx, Keyword::Func)?;

    // Bound names inside a type declaration are not module locals.
    let ty = read_bound_function_type(tokenizer, ctx, false)?;
    ctx.function_type_map.define(ty.to_function_type());

    expect_rpar(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(TypeEntry {
        span: span_from(tokenizer, start),
        name,
        ty,
    })
}

/// `(import "m" "n")` inside a func/table/memory/global/event.
fn read_inline_import_opt(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<InlineImport> {
    let import_token = tokenizer.match_lpar_keyword(Keyword::Import)?;

    let ordered = !ctx.seen_non_import;
    if !ordered {
        ctx.errors.on_error(
            import_token.span,
            "Imports must occur before all non-import definitions",
        );
    }
    let module = read_utf8_text(tokenizer, ctx);
    let name = read_utf8_text(tokenizer, ctx);
    expect_rpar(tokenizer, ctx);
    if !ordered {
        return None;
    }
    Some(InlineImport {
        module: module?,
        name: name?,
    })
}

fn read_inline_export(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<InlineExport> {
    expect_lpar_keyword(tokenizer, ctx, Keyword::Export)?;
    let name = read_utf8_text(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(InlineExport { name })
}

fn read_inline_export_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<Vec<InlineExport>> {
    let mut exports = Vec::new();
    while tokenizer.peek(0).kind == TokenKind::Lpar
        && tokenizer.peek(1).kind == TokenKind::Keyword(Keyword::Export)
    {
        exports.push(read_inline_export(tokenizer, ctx)?);
    }
    Some(exports)
}

fn read_import(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Import> {
    let start = tokenizer.here();
    let import_token = expect_lpar_keyword(tokenizer, ctx, Keyword::Import)?;

    if ctx.seen_non_import {
        ctx.errors.on_error(
            import_token.span,
            "Imports must occur before all non-import definitions",
        );
        return None;
    }

    let module = read_utf8_text(tokenizer, ctx)?;
    let name = read_utf8_text(tokenizer, ctx)?;

    if tokenizer.peek(0).kind != TokenKind::Lpar {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected '(', got {}", desc));
        return None;
    }

    let kw_token = tokenizer.peek(1);
    let (kw_span, kw) = (kw_token.span, kw_token.kind.clone());
    let desc = match kw {
        TokenKind::Keyword(Keyword::Func) => {
            tokenizer.read();
            tokenizer.read();
            let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.function_names);
            let type_use = read_type_use_opt(tokenizer, ctx);
            let ty = read_bound_function_type(tokenizer, ctx, false)?;
            ctx.function_type_map
                .use_type(type_use.is_some(), &ty.to_function_type());
            ImportDesc::Function {
                name,
                type_use,
                ty,
            }
        }
        TokenKind::Keyword(Keyword::Table) => {
            tokenizer.read();
            tokenizer.read();
            let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.table_names);
            let ty = read_table_type(tokenizer, ctx)?;
            ImportDesc::Table { name, ty }
        }
        TokenKind::Keyword(Keyword::Memory) => {
            tokenizer.read();
            tokenizer.read();
            let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.memory_names);
            let ty = read_memory_type(tokenizer, ctx)?;
            ImportDesc::Memory { name, ty }
        }
        TokenKind::Keyword(Keyword::Global) => {
            tokenizer.read();
            tokenizer.read();
            let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.global_names);
            let ty = read_global_type(tokenizer, ctx)?;
            ImportDesc::Global { name, ty }
        }
        TokenKind::Keyword(Keyword::Event) => {
            if !ctx.features.exceptions_enabled() {
                ctx.errors.on_error(kw_span, "Events not allowed");
                return None;
            }
            tokenizer.read();
            tokenizer.read();
            let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.event_names);
            let ty = read_event_type(tokenizer, ctx)?;
            ImportDesc::Event { name, ty }
        }
        other => {
            ctx.errors.on_error(
                kw_span,
                format!("Expected an import external kind, got {}", other.desc()),
            );
            return None;
        }
    };

    expect_rpar(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(Import {
        span: span_from(tokenizer, start),
        module,
        name,
        desc,
    })
}

fn read_function(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Function> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Func)?;

    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.function_names);
    let exports = read_inline_export_list(tokenizer, ctx)?;
    let import = read_inline_import_opt(tokenizer, ctx);
    ctx.seen_non_import |= import.is_none();

    ctx.begin_function();

    let type_use = read_type_use_opt(tokenizer, ctx);
    let ty = read_bound_function_type(tokenizer, ctx, true)?;
    ctx.function_type_map
        .use_type(type_use.is_some(), &ty.to_function_type());

    let mut locals = Vec::new();
    let mut body = Vec::new();
    if import.is_none() {
        locals = read_bound_value_type_list(tokenizer, ctx, Keyword::Local, true)?;
        read_instruction_list(tokenizer, ctx, &mut body)?;
    }

    expect_rpar(tokenizer, ctx)?;
    Some(Function {
        span: span_from(tokenizer, start),
        name,
        exports,
        import,
        type_use,
        ty,
        locals,
        body,
    })
}

fn read_table(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Table> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Table)?;

    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.table_names);
    let exports = read_inline_export_list(tokenizer, ctx)?;
    let import = read_inline_import_opt(tokenizer, ctx);
    ctx.seen_non_import |= import.is_none();

    if import.is_some() {
        // Imported table.
        let ty = read_table_type(tokenizer, ctx)?;
        expect_rpar(tokenizer, ctx)?;
        return Some(Table {
            span: span_from(tokenizer, start),
            name,
            exports,
            import,
            ty,
            elements: None,
        });
    }

    if let Some(element) = read_reference_type_opt(tokenizer, ctx) {
        // Inline element segment: the table type is implied by the count.
        expect_lpar_keyword(tokenizer, ctx, Keyword::Elem)?;

        let elements = if ctx.features.bulk_memory_enabled() && is_expression(tokenizer) {
            let exprs = read_element_expression_list(tokenizer, ctx)?;
            ElementList::Expressions {
                element_type: element.clone(),
                exprs,
            }
        } else {
            let vars = read_var_list(tokenizer, ctx);
            ElementList::Indices {
                kind: ExternalKind::Function,
                vars,
            }
        };
        let size = elements.len() as u32;

        expect_rpar(tokenizer, ctx)?;
        expect_rpar(tokenizer, ctx)?;
        return Some(Table {
            span: span_from(tokenizer, start),
            name,
            exports,
            import: None,
            ty: TableType {
                limits: Limits::exact(size),
                element,
            },
            elements: Some(elements),
        });
    }

    // Defined table.
    let ty = read_table_type(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(Table {
        span: span_from(tokenizer, start),
        name,
        exports,
        import: None,
        ty,
        elements: None,
    })
}

fn read_memory(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Memory> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Memory)?;

    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.memory_names);
    let exports = read_inline_export_list(tokenizer, ctx)?;
    let import = read_inline_import_opt(tokenizer, ctx);
    ctx.seen_non_import |= import.is_none();

    if import.is_some() {
        let ty = read_memory_type(tokenizer, ctx)?;
        expect_rpar(tokenizer, ctx)?;
        return Some(Memory {
            span: span_from(tokenizer, start),
            name,
            exports,
            import,
            ty,
            data: None,
        });
    }

    if tokenizer.match_lpar_keyword(Keyword::Data).is_some() {
        // Inline data segment: the memory type covers the decoded bytes.
        let data = read_text_list(tokenizer, ctx);
        let size: u32 = data.iter().map(|d| d.len() as u32).sum();

        expect_rpar(tokenizer, ctx)?;
        expect_rpar(tokenizer, ctx)?;
        return Some(Memory {
            span: span_from(tokenizer, start),
            name,
            exports,
            import: None,
            ty: MemoryType {
                limits: Limits::exact(size),
            },
            data: Some(data),
        });
    }

    let ty = read_memory_type(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(Memory {
        span: span_from(tokenizer, start),
        name,
        exports,
        import: None,
        ty,
        data: None,
    })
}

fn read_constant_expression(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<ConstantExpression> {
    let mut instructions = Vec::new();
    read_instruction_list(tokenizer, ctx, &mut instructions)?;
    Some(ConstantExpression { instructions })
}

fn read_global(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Global> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Global)?;

    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.global_names);
    let exports = read_inline_export_list(tokenizer, ctx)?;
    let import = read_inline_import_opt(tokenizer, ctx);
    ctx.seen_non_import |= import.is_none();

    let ty = read_global_type(tokenizer, ctx)?;

    let init = if import.is_none() {
        Some(read_constant_expression(tokenizer, ctx)?)
    } else {
        None
    };

    expect_rpar(tokenizer, ctx)?;
    Some(Global {
        span: span_from(tokenizer, start),
        name,
        exports,
        import,
        ty,
        init,
    })
}

fn read_export(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Export> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Export)?;

    let name = read_utf8_text(tokenizer, ctx)?;

    if tokenizer.peek(0).kind != TokenKind::Lpar {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected '(', got {}", desc));
        return None;
    }
    let kw_token = tokenizer.peek(1);
    let (kw_span, kw_kind) = (kw_token.span, kw_token.kind.clone());
    let kind = match kw_kind {
        TokenKind::Keyword(Keyword::Func) => ExternalKind::Function,
        TokenKind::Keyword(Keyword::Table) => ExternalKind::Table,
        TokenKind::Keyword(Keyword::Memory) => ExternalKind::Memory,
        TokenKind::Keyword(Keyword::Global) => ExternalKind::Global,
        TokenKind::Keyword(Keyword::Event) => {
            if !ctx.features.exceptions_enabled() {
                ctx.errors.on_error(kw_span, "Events not allowed");
                return None;
            }
            ExternalKind::Event
        }
        other => {
            ctx.errors.on_error(
                kw_span,
                format!("Expected an export external kind, got {}", other.desc()),
            );
            return None;
        }
    };
    tokenizer.read();
    tokenizer.read();

    let var = read_var(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(Export {
        span: span_from(tokenizer, start),
        name,
        kind,
        var,
    })
}

fn read_start(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Start> {
    let start = tokenizer.here();
    let start_token = expect_lpar_keyword(tokenizer, ctx, Keyword::Start)?;

    if ctx.seen_start {
        ctx.errors
            .on_error(start_token.span, "Multiple start functions");
        return None;
    }
    ctx.seen_start = true;

    let var = read_var(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(Start {
        span: span_from(tokenizer, start),
        var,
    })
}

// ----------------------------------------------------------------------
// Element and data segments
// ----------------------------------------------------------------------

fn read_offset_expression(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<ConstantExpression> {
    if tokenizer.match_lpar_keyword(Keyword::Offset).is_some() {
        let mut instructions = Vec::new();
        read_instruction_list(tokenizer, ctx, &mut instructions)?;
        expect_rpar(tokenizer, ctx)?;
        Some(ConstantExpression { instructions })
    } else if is_expression(tokenizer) {
        let mut instructions = Vec::new();
        read_expression(tokenizer, ctx, &mut instructions)?;
        Some(ConstantExpression { instructions })
    } else {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected offset expression, got {}", desc));
        None
    }
}

fn is_element_expression(tokenizer: &mut Tokenizer) -> bool {
    is_expression(tokenizer)
        || (tokenizer.peek(0).kind == TokenKind::Lpar
            && tokenizer.peek(1).kind == TokenKind::Keyword(Keyword::Item))
}

fn read_element_expression(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<ElementExpression> {
    // The only valid instructions inside element expressions come from the
    // reference-types proposal, but their text forms are reachable through
    // bulk memory alone; read them with reference types forced on.
    let saved = ctx.features;
    let mut forced = saved;
    forced.enable_reference_types();
    ctx.features = forced;

    let result = (|| {
        let mut instructions = Vec::new();
        if tokenizer.match_lpar_keyword(Keyword::Item).is_some() {
            read_instruction_list(tokenizer, ctx, &mut instructions)?;
            expect_rpar(tokenizer, ctx)?;
        } else if is_expression(tokenizer) {
            read_expression(tokenizer, ctx, &mut instructions)?;
        } else {
            let token = tokenizer.peek(0);
            let (span, desc) = (token.span, token.kind.desc());
            ctx.errors
                .on_error(span, format!("Expected element expression, got {}", desc));
            return None;
        }
        Some(ElementExpression { instructions })
    })();

    ctx.features = saved;
    result
}

fn read_element_expression_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<Vec<ElementExpression>> {
    let mut exprs = Vec::new();
    while is_element_expression(tokenizer) {
        exprs.push(read_element_expression(tokenizer, ctx)?);
    }
    Some(exprs)
}

/// The element list: `func var*` or `reftype elem-expr*`.
fn read_element_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<ElementList> {
    if tokenizer.peek(0).kind == TokenKind::Keyword(Keyword::Func) {
        tokenizer.read();
        let vars = read_var_list(tokenizer, ctx);
        Some(ElementList::Indices {
            kind: ExternalKind::Function,
            vars,
        })
    } else {
        let element_type = read_reference_type(tokenizer, ctx)?;
        let exprs = read_element_expression_list(tokenizer, ctx)?;
        Some(ElementList::Expressions {
            element_type,
            exprs,
        })
    }
}

fn read_element_segment(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
) -> Option<ElementSegment> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Elem)?;

    if !ctx.features.bulk_memory_enabled() {
        // MVP forms: LPAR ELEM var? offset var_list RPAR
        let table = read_var_opt(tokenizer, ctx);
        let offset = read_offset_expression(tokenizer, ctx)?;
        let vars = read_var_list(tokenizer, ctx);
        expect_rpar(tokenizer, ctx)?;
        ctx.element_segment_names.new_unbound();
        return Some(ElementSegment {
            span: span_from(tokenizer, start),
            name: None,
            mode: SegmentMode::Active {
                target: table,
                offset,
            },
            elements: ElementList::Indices {
                kind: ExternalKind::Function,
                vars,
            },
        });
    }

    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.element_segment_names);
    let table_use = read_var_use_opt(tokenizer, ctx, Keyword::Table);

    let mode;
    if let Some(table) = table_use {
        // Active with explicit table use.
        let offset = read_offset_expression(tokenizer, ctx)?;
        mode = SegmentMode::Active {
            target: Some(table),
            offset,
        };
    } else if tokenizer.peek(0).kind == TokenKind::Keyword(Keyword::Declare) {
        tokenizer.read();
        mode = SegmentMode::Declared;
    } else if tokenizer.peek(0).kind == TokenKind::Lpar {
        // Active with implicit table 0.
        let offset = read_offset_expression(tokenizer, ctx)?;

        // Sugar: a bare var list after the offset means funcref indices.
        if matches!(
            tokenizer.peek(0).kind,
            TokenKind::Nat(_) | TokenKind::Id(_) | TokenKind::Rpar
        ) {
            let vars = read_var_list(tokenizer, ctx);
            expect_rpar(tokenizer, ctx)?;
            return Some(ElementSegment {
                span: span_from(tokenizer, start),
                name,
                mode: SegmentMode::Active {
                    target: None,
                    offset,
                },
                elements: ElementList::Indices {
                    kind: ExternalKind::Function,
                    vars,
                },
            });
        }
        mode = SegmentMode::Active {
            target: None,
            offset,
        };
    } else {
        mode = SegmentMode::Passive;
    }

    let list_span = tokenizer.peek(0).span;
    let elements = read_element_list(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;

    // A declared segment with an expression list needs reference types
    // proper, not just the bulk-memory encoding of it.
    if mode == SegmentMode::Declared
        && matches!(elements, ElementList::Expressions { .. })
        && !ctx.features.reference_types_enabled()
    {
        ctx.errors.on_error(
            list_span,
            "Declared element segments with expressions require reference types",
        );
        return None;
    }

    Some(ElementSegment {
        span: span_from(tokenizer, start),
        name,
        mode,
        elements,
    })
}

fn read_data_segment(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<DataSegment> {
    let start = tokenizer.here();
    expect_lpar_keyword(tokenizer, ctx, Keyword::Data)?;

    if !ctx.features.bulk_memory_enabled() {
        // MVP forms: LPAR DATA var? offset string_list RPAR
        let memory = read_var_opt(tokenizer, ctx);
        let offset = read_offset_expression(tokenizer, ctx)?;
        let data = read_text_list(tokenizer, ctx);
        expect_rpar(tokenizer, ctx)?;
        ctx.data_segment_names.new_unbound();
        return Some(DataSegment {
            span: span_from(tokenizer, start),
            name: None,
            mode: SegmentMode::Active {
                target: memory,
                offset,
            },
            data,
        });
    }

    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.data_segment_names);
    let memory_use = read_var_use_opt(tokenizer, ctx, Keyword::Memory);

    let mode = if memory_use.is_some() || tokenizer.peek(0).kind == TokenKind::Lpar {
        let offset = read_offset_expression(tokenizer, ctx)?;
        SegmentMode::Active {
            target: memory_use,
            offset,
        }
    } else {
        SegmentMode::Passive
    };

    let data = read_text_list(tokenizer, ctx);
    expect_rpar(tokenizer, ctx)?;
    Some(DataSegment {
        span: span_from(tokenizer, start),
        name,
        mode,
        data,
    })
}

fn read_event(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Event> {
    let start = tokenizer.here();
    let event_token = expect_lpar_keyword(tokenizer, ctx, Keyword::Event)?;

    if !ctx.features.exceptions_enabled() {
        ctx.errors.on_error(event_token.span, "Events not allowed");
        return None;
    }

    let name = read_bind_var_opt(tokenizer, &mut ctx.errors, &mut ctx.event_names);
    let exports = read_inline_export_list(tokenizer, ctx)?;
    let import = read_inline_import_opt(tokenizer, ctx);
    ctx.seen_non_import |= import.is_none();

    let ty = read_event_type(tokenizer, ctx)?;
    expect_rpar(tokenizer, ctx)?;
    Some(Event {
        span: span_from(tokenizer, start),
        name,
        exports,
        import,
        ty,
    })
}

// ----------------------------------------------------------------------
// Instructions
// ----------------------------------------------------------------------

fn is_plain_instruction(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Instr(class, _) if *class != InstrClass::Block)
}

fn is_block_instruction(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Instr(InstrClass::Block, _))
}

fn is_expression(tokenizer: &mut Tokenizer) -> bool {
    tokenizer.peek(0).kind == TokenKind::Lpar
        && matches!(tokenizer.peek(1).kind, TokenKind::Instr(_, _))
}

fn is_instruction(tokenizer: &mut Tokenizer) -> bool {
    matches!(tokenizer.peek(0).kind, TokenKind::Instr(_, _)) || is_expression(tokenizer)
}

fn check_opcode_enabled(ctx: &mut Context, op: Opcode, span: Span) -> Option<()> {
    if !ctx.features.contains(op.required_features()) {
        ctx.errors.on_error(
            span,
            format!("{} instruction not allowed", op.mnemonic()),
        );
        return None;
    }
    Some(())
}

/// Resolve a label var to its relative depth immediately; labels are scoped
/// and their stack is gone once the function ends.
fn read_label_var(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Var> {
    let span = tokenizer.peek(0).span;
    match read_var(tokenizer, ctx)? {
        Var::Index(i) => Some(Var::Index(i)),
        Var::Name(name) => match ctx.resolve_label(&name) {
            Some(depth) => Some(Var::Index(depth)),
            None => {
                ctx.errors
                    .on_error(span, format!("Undefined label: ${}", name));
                None
            }
        },
    }
}

/// Resolve a local var against the current function's scope.
fn read_local_var(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Var> {
    let span = tokenizer.peek(0).span;
    match read_var(tokenizer, ctx)? {
        Var::Index(i) => Some(Var::Index(i)),
        Var::Name(name) => match ctx.local_names.get(&name) {
            Some(index) => Some(Var::Index(index)),
            None => {
                ctx.errors
                    .on_error(span, format!("Undefined local: ${}", name));
                None
            }
        },
    }
}

fn read_offset_opt(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<u32> {
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    if let TokenKind::OffsetEqNat(info) = kind {
        let token = tokenizer.read();
        let text = &token.text(tokenizer.source())["offset=".len()..];
        match literals::str_to_nat::<u32>(info, text) {
            Some(value) => Some(value),
            None => {
                ctx.errors
                    .on_error(span, format!("Invalid natural number, got {}", text));
                None
            }
        }
    } else {
        None
    }
}

fn read_align_opt(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<u32> {
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    if let TokenKind::AlignEqNat(info) = kind {
        let token = tokenizer.read();
        let text = &token.text(tokenizer.source())["align=".len()..];
        match literals::str_to_nat::<u32>(info, text) {
            Some(value) => {
                if value == 0 || !value.is_power_of_two() {
                    ctx.errors.on_error(
                        span,
                        format!("Alignment must be a power of two, got {}", value),
                    );
                    None
                } else {
                    Some(value)
                }
            }
            None => {
                ctx.errors
                    .on_error(span, format!("Invalid natural number, got {}", text));
                None
            }
        }
    } else {
        None
    }
}

/// Lane indices are read as u8 and never accept a leading `-`.
fn read_simd_lane(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<u8> {
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    if let TokenKind::Int(LiteralInfo {
        sign: Sign::Minus, ..
    }) = kind
    {
        ctx.errors
            .on_error(span, "Expected a positive integer, got a negative one");
        return None;
    }
    read_int::<u8>(tokenizer, ctx)
}

fn read_simd_shuffle(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<[u8; 16]> {
    let mut lanes = [0u8; 16];
    for lane in &mut lanes {
        *lane = read_simd_lane(tokenizer, ctx)?;
    }
    Some(lanes)
}

fn read_simd_const(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<crate::types::V128> {
    use crate::types::V128;
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    let shape = match kind {
        TokenKind::LaneShape(shape) => {
            tokenizer.read();
            shape
        }
        other => {
            ctx.errors.on_error(
                span,
                format!("Invalid SIMD constant token, got {}", other.desc()),
            );
            return None;
        }
    };
    match shape {
        LaneShape::I8X16 => {
            let mut lanes = [0u8; 16];
            for lane in &mut lanes {
                *lane = read_int::<u8>(tokenizer, ctx)?;
            }
            Some(V128::from_u8x16(lanes))
        }
        LaneShape::I16X8 => {
            let mut lanes = [0u16; 8];
            for lane in &mut lanes {
                *lane = read_int::<u16>(tokenizer, ctx)?;
            }
            Some(V128::from_u16x8(lanes))
        }
        LaneShape::I32X4 => {
            let mut lanes = [0u32; 4];
            for lane in &mut lanes {
                *lane = read_int::<u32>(tokenizer, ctx)?;
            }
            Some(V128::from_u32x4(lanes))
        }
        LaneShape::I64X2 => {
            let mut lanes = [0u64; 2];
            for lane in &mut lanes {
                *lane = read_int::<u64>(tokenizer, ctx)?;
            }
            Some(V128::from_u64x2(lanes))
        }
        LaneShape::F32X4 => {
            let mut lanes = [0f32; 4];
            for lane in &mut lanes {
                *lane = read_float::<f32>(tokenizer, ctx)?;
            }
            Some(V128::from_f32x4(lanes))
        }
        LaneShape::F64X2 => {
            let mut lanes = [0f64; 2];
            for lane in &mut lanes {
                *lane = read_float::<f64>(tokenizer, ctx)?;
            }
            Some(V128::from_f64x2(lanes))
        }
    }
}

fn read_plain_instruction(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<Instruction> {
    let start = tokenizer.here();
    let token = tokenizer.peek(0);
    let (span, kind) = (token.span, token.kind.clone());
    let (class, op) = match kind {
        TokenKind::Instr(class, op) if class != InstrClass::Block => (class, op),
        other => {
            ctx.errors.on_error(
                span,
                format!("Expected plain instruction, got {}", other.desc()),
            );
            return None;
        }
    };

    check_opcode_enabled(ctx, op, span)?;
    tokenizer.read();

    let immediate = match class {
        InstrClass::Bare => Immediate::None,
        InstrClass::I32Const => Immediate::S32(read_int::<i32>(tokenizer, ctx)?),
        InstrClass::I64Const => Immediate::S64(read_int::<i64>(tokenizer, ctx)?),
        InstrClass::F32Const => Immediate::F32(read_float::<f32>(tokenizer, ctx)?),
        InstrClass::F64Const => Immediate::F64(read_float::<f64>(tokenizer, ctx)?),
        InstrClass::SimdConst => Immediate::V128(read_simd_const(tokenizer, ctx)?),
        InstrClass::SimdLane => Immediate::SimdLane(read_simd_lane(tokenizer, ctx)?),
        InstrClass::SimdShuffle => Immediate::Shuffle(read_simd_shuffle(tokenizer, ctx)?),
        InstrClass::Select => {
            if ctx.features.reference_types_enabled() {
                let types = read_result_list(tokenizer, ctx)?;
                if types.is_empty() {
                    Immediate::None
                } else {
                    // Typed select has a different opcode.
                    return Some(Instruction::new(
                        Opcode::SelectT,
                        Immediate::SelectTypes(types),
                        span_from(tokenizer, start),
                    ));
                }
            } else {
                Immediate::None
            }
        }
        InstrClass::Memory => {
            let offset = read_offset_opt(tokenizer, ctx);
            let align = read_align_opt(tokenizer, ctx);
            Immediate::MemArg(MemArgImmediate { align, offset })
        }
        InstrClass::MemoryCopy => Immediate::Copy(CopyImmediate::default()),
        InstrClass::TableCopy => {
            if ctx.features.reference_types_enabled() {
                let dst = read_var_opt(tokenizer, ctx);
                let src = read_var_opt(tokenizer, ctx);
                Immediate::Copy(CopyImmediate { dst, src })
            } else {
                Immediate::Copy(CopyImmediate::default())
            }
        }
        InstrClass::MemoryInit => {
            let segment = read_var(tokenizer, ctx)?;
            Immediate::Init(InitImmediate { segment, dst: None })
        }
        InstrClass::TableInit => {
            let first = read_var(tokenizer, ctx)?;
            match read_var_opt(tokenizer, ctx) {
                // `table.init $table $elem`: vars arrive swapped.
                Some(segment) => Immediate::Init(InitImmediate {
                    segment,
                    dst: Some(first),
                }),
                // `table.init $elem`
                None => Immediate::Init(InitImmediate {
                    segment: first,
                    dst: None,
                }),
            }
        }
        InstrClass::RefNull => Immediate::HeapType(read_heap_type(tokenizer, ctx)?),
        InstrClass::RefFunc => Immediate::Index(read_var(tokenizer, ctx)?),
        InstrClass::Var => match op {
            Opcode::Br | Opcode::BrIf => Immediate::Index(read_label_var(tokenizer, ctx)?),
            Opcode::LocalGet | Opcode::LocalSet | Opcode::LocalTee => {
                Immediate::Index(read_local_var(tokenizer, ctx)?)
            }
            _ => Immediate::Index(read_var(tokenizer, ctx)?),
        },
        InstrClass::BrOnExn => {
            let target = read_label_var(tokenizer, ctx)?;
            let event = read_var(tokenizer, ctx)?;
            Immediate::BrOnExn(BrOnExnImmediate { target, event })
        }
        InstrClass::BrTable => {
            let mut vars = Vec::new();
            let first = read_label_var(tokenizer, ctx)?;
            vars.push(first);
            while matches!(
                tokenizer.peek(0).kind,
                TokenKind::Id(_) | TokenKind::Nat(_)
            ) {
                vars.push(read_label_var(tokenizer, ctx)?);
            }
            let default_target = vars.pop().unwrap();
            Immediate::BrTable(BrTableImmediate {
                targets: vars,
                default_target,
            })
        }
        InstrClass::CallIndirect => {
            let table = if ctx.features.reference_types_enabled() {
                read_var_opt(tokenizer, ctx)
            } else {
                None
            };
            let ty = read_function_type_use(tokenizer, ctx)?;
            Immediate::CallIndirect(CallIndirectImmediate { table, ty })
        }
        InstrClass::Block => unreachable!("rejected above"),
    };

    Some(Instruction::new(op, immediate, span_from(tokenizer, start)))
}

/// Push the optional block label onto the scoping stack. Labels may shadow;
/// no duplicate check.
fn read_label_opt(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<String> {
    if matches!(tokenizer.peek(0).kind, TokenKind::Id(_)) {
        let name = match tokenizer.read().kind {
            TokenKind::Id(name) => name,
            _ => unreachable!(),
        };
        ctx.label_names.replace_bound(&name);
        ctx.label_stack.push(Some(name.clone()));
        Some(name)
    } else {
        ctx.label_names.new_unbound();
        ctx.label_stack.push(None);
        None
    }
}

/// A trailing label after `end`/`else`/`catch` must match the block's label.
fn read_end_label_opt(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    label: &Option<String>,
) -> Option<()> {
    if matches!(tokenizer.peek(0).kind, TokenKind::Id(_)) {
        let token = tokenizer.read();
        let end_label = match token.kind {
            TokenKind::Id(name) => name,
            _ => unreachable!(),
        };
        match label {
            None => {
                ctx.errors
                    .on_error(token.span, format!("Unexpected label ${}", end_label));
                return None;
            }
            Some(label) if *label != end_label => {
                ctx.errors.on_error(
                    token.span,
                    format!("Expected label ${}, got ${}", label, end_label),
                );
                return None;
            }
            Some(_) => {}
        }
    }
    Some(())
}

fn read_block_immediate(tokenizer: &mut Tokenizer, ctx: &mut Context) -> Option<BlockImmediate> {
    let label = read_label_opt(tokenizer, ctx);

    // Unlike `read_function_type_use`, an inline void/single-result type is
    // not recorded: those encode directly without a type entry.
    let type_use = read_type_use_opt(tokenizer, ctx);
    let ty = read_function_type(tokenizer, ctx)?;
    let ftu = FunctionTypeUse { type_use, ty };
    if !ftu.is_inline_type() {
        ctx.function_type_map
            .use_type(ftu.type_use.is_some(), &ftu.ty);
    }
    Some(BlockImmediate { label, ty: ftu })
}

/// Consume the keyword if present, pushing its opcode as an instruction.
fn read_opcode_opt(
    tokenizer: &mut Tokenizer,
    instructions: &mut Vec<Instruction>,
    kw: Keyword,
    op: Opcode,
) -> bool {
    if tokenizer.peek(0).kind == TokenKind::Keyword(kw) {
        let token = tokenizer.read();
        instructions.push(Instruction::plain(op, token.span));
        true
    } else {
        false
    }
}

fn expect_opcode(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    instructions: &mut Vec<Instruction>,
    kw: Keyword,
    op: Opcode,
) -> Option<()> {
    if read_opcode_opt(tokenizer, instructions, kw, op) {
        Some(())
    } else {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected '{}', got {}", kw.as_str(), desc));
        None
    }
}

fn read_block_instruction(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    instructions: &mut Vec<Instruction>,
) -> Option<()> {
    let start = tokenizer.here();
    let token = tokenizer.read();
    let op = match token.kind {
        TokenKind::Instr(InstrClass::Block, op) => op,
        _ => unreachable!("caller checked"),
    };
    check_opcode_enabled(ctx, op, token.span)?;

    let block = read_block_immediate(tokenizer, ctx)?;
    let label = block.label.clone();
    instructions.push(Instruction::new(
        op,
        Immediate::Block(block),
        span_from(tokenizer, start),
    ));
    read_instruction_list(tokenizer, ctx, instructions)?;

    match op {
        Opcode::If => {
            if read_opcode_opt(tokenizer, instructions, Keyword::Else, Opcode::Else) {
                read_end_label_opt(tokenizer, ctx, &label)?;
                read_instruction_list(tokenizer, ctx, instructions)?;
            }
        }
        Opcode::Try => {
            expect_opcode(tokenizer, ctx, instructions, Keyword::Catch, Opcode::Catch)?;
            read_end_label_opt(tokenizer, ctx, &label)?;
            read_instruction_list(tokenizer, ctx, instructions)?;
        }
        Opcode::Block | Opcode::Loop => {}
        _ => unreachable!("not a block opcode"),
    }

    expect_opcode(tokenizer, ctx, instructions, Keyword::End, Opcode::End)?;
    read_end_label_opt(tokenizer, ctx, &label)?;
    ctx.end_block();
    Some(())
}

fn read_instruction(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    instructions: &mut Vec<Instruction>,
) -> Option<()> {
    let kind = tokenizer.peek(0).kind.clone();
    if is_plain_instruction(&kind) {
        let instruction = read_plain_instruction(tokenizer, ctx)?;
        instructions.push(instruction);
        Some(())
    } else if is_block_instruction(&kind) {
        read_block_instruction(tokenizer, ctx, instructions)
    } else if is_expression(tokenizer) {
        read_expression(tokenizer, ctx, instructions)
    } else {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected instruction, got {}", desc));
        None
    }
}

fn read_instruction_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    instructions: &mut Vec<Instruction>,
) -> Option<()> {
    while is_instruction(tokenizer) {
        read_instruction(tokenizer, ctx, instructions)?;
    }
    Some(())
}

/// A folded expression. Plain operands are reordered so `(A (B) (C))`
/// flattens to `B C A`; for `if`, the condition expressions precede the `if`
/// opcode and the closing `)` synthesizes the `end`.
fn read_expression(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    instructions: &mut Vec<Instruction>,
) -> Option<()> {
    if tokenizer.peek(0).kind != TokenKind::Lpar {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected '(', got {}", desc));
        return None;
    }
    tokenizer.read();

    let kind = tokenizer.peek(0).kind.clone();
    if is_plain_instruction(&kind) {
        let plain = read_plain_instruction(tokenizer, ctx)?;
        read_expression_list(tokenizer, ctx, instructions)?;
        instructions.push(plain);
        expect_rpar(tokenizer, ctx)?;
        Some(())
    } else if is_block_instruction(&kind) {
        let start = tokenizer.here();
        let token = tokenizer.read();
        let op = match token.kind {
            TokenKind::Instr(InstrClass::Block, op) => op,
            _ => unreachable!(),
        };
        check_opcode_enabled(ctx, op, token.span)?;

        let block = read_block_immediate(tokenizer, ctx)?;
        let label = block.label.clone();
        let block_instr = Instruction::new(op, Immediate::Block(block), span_from(tokenizer, start));

        match op {
            Opcode::Block | Opcode::Loop => {
                instructions.push(block_instr);
                read_instruction_list(tokenizer, ctx, instructions)?;
            }
            Opcode::If => {
                // Condition expressions, if any; the folded `if` is lenient.
                read_expression_list(tokenizer, ctx, instructions)?;

                // The `if` opcode comes after its condition.
                instructions.push(block_instr);

                expect_lpar_keyword(tokenizer, ctx, Keyword::Then)?;
                read_instruction_list(tokenizer, ctx, instructions)?;
                expect_rpar(tokenizer, ctx)?;

                if tokenizer.peek(0).kind == TokenKind::Lpar {
                    tokenizer.read();
                    expect_opcode(tokenizer, ctx, instructions, Keyword::Else, Opcode::Else)?;
                    read_end_label_opt(tokenizer, ctx, &label)?;
                    read_instruction_list(tokenizer, ctx, instructions)?;
                    expect_rpar(tokenizer, ctx)?;
                }
            }
            Opcode::Try => {
                instructions.push(block_instr);
                read_instruction_list(tokenizer, ctx, instructions)?;

                if tokenizer.peek(0).kind != TokenKind::Lpar {
                    let token = tokenizer.peek(0);
                    let (span, desc) = (token.span, token.kind.desc());
                    ctx.errors
                        .on_error(span, format!("Expected '(', got {}", desc));
                    return None;
                }
                tokenizer.read();
                expect_opcode(tokenizer, ctx, instructions, Keyword::Catch, Opcode::Catch)?;
                read_end_label_opt(tokenizer, ctx, &label)?;
                read_instruction_list(tokenizer, ctx, instructions)?;
                expect_rpar(tokenizer, ctx)?;
            }
            _ => unreachable!("not a block opcode"),
        }

        // The closing `)` stands in for `end`.
        let rpar = tokenizer.peek(0).span;
        expect_rpar(tokenizer, ctx)?;
        instructions.push(Instruction::plain(Opcode::End, rpar));
        ctx.end_block();
        Some(())
    } else {
        let token = tokenizer.peek(0);
        let (span, desc) = (token.span, token.kind.desc());
        ctx.errors
            .on_error(span, format!("Expected expression, got {}", desc));
        None
    }
}

fn read_expression_list(
    tokenizer: &mut Tokenizer,
    ctx: &mut Context,
    instructions: &mut Vec<Instruction>,
) -> Option<()> {
    while is_expression(tokenizer) {
        read_expression(tokenizer, ctx, instructions)?;
    }
    Some(())
}

// Namespace mapping shared with the resolver.
pub(crate) fn module_var_namespace(op: Opcode) -> Option<Namespace> {
    match op {
        Opcode::Call | Opcode::ReturnCall | Opcode::RefFunc => Some(Namespace::Function),
        Opcode::GlobalGet | Opcode::GlobalSet => Some(Namespace::Global),
        Opcode::TableGet
        | Opcode::TableSet
        | Opcode::TableGrow
        | Opcode::TableSize
        | Opcode::TableFill => Some(Namespace::Table),
        Opcode::Throw => Some(Namespace::Event),
        Opcode::DataDrop => Some(Namespace::Data),
        Opcode::ElemDrop => Some(Namespace::Elem),
        _ => None,
    }
}
