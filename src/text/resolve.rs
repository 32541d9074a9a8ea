//! Post-parse name resolution.
//!
//! The grammar reader leaves module-level `$name` references as `Var::Name`
//! so that forward references work; once the whole module has been read (and
//! every namespace map is fully populated) this pass rewrites them to dense
//! indices. Labels and locals are lexically scoped and were already resolved
//! during the grammar walk.
//!
//! Functions, events, blocks, and `call_indirect` uses with an inline
//! signature also get their type reference filled in here, pointing at the
//! matching (possibly synthesized) type entry.

use super::names::{Context, Namespace};
use super::reader::module_var_namespace;
use crate::instruction::{Immediate, Instruction, Opcode};
use crate::location::Span;
use crate::module::{ElementList, ImportDesc, Module, ModuleItem, SegmentMode};
use crate::types::{
    BoundFunctionType, ExternalKind, FunctionType, FunctionTypeUse, HeapType, ReferenceType,
    ValueType, Var,
};

pub(crate) fn resolve_module(module: &mut Module, ctx: &mut Context) {
    for item in &mut module.items {
        let span = item.span();
        match item {
            ModuleItem::Type(entry) => {
                resolve_bound_function_type(&mut entry.ty, ctx, span);
            }
            ModuleItem::Import(import) => match &mut import.desc {
                ImportDesc::Function { type_use, ty, .. } => {
                    resolve_bound_function_type(ty, ctx, span);
                    resolve_type_use(type_use, &ty.to_function_type(), ctx, span);
                }
                ImportDesc::Table { ty, .. } => {
                    resolve_reference_type(&mut ty.element, ctx, span);
                }
                ImportDesc::Memory { .. } => {}
                ImportDesc::Global { ty, .. } => {
                    resolve_value_type(&mut ty.value_type, ctx, span);
                }
                ImportDesc::Event { ty, .. } => {
                    resolve_function_type_use(&mut ty.ty, ctx, span);
                }
            },
            ModuleItem::Function(function) => {
                resolve_bound_function_type(&mut function.ty, ctx, span);
                resolve_type_use(
                    &mut function.type_use,
                    &function.ty.to_function_type(),
                    ctx,
                    span,
                );
                for local in &mut function.locals {
                    resolve_value_type(&mut local.value_type, ctx, span);
                }
                resolve_instructions(&mut function.body, ctx);
            }
            ModuleItem::Table(table) => {
                resolve_reference_type(&mut table.ty.element, ctx, span);
                if let Some(elements) = &mut table.elements {
                    resolve_element_list(elements, ctx, span);
                }
            }
            ModuleItem::Memory(_) => {}
            ModuleItem::Global(global) => {
                resolve_value_type(&mut global.ty.value_type, ctx, span);
                if let Some(init) = &mut global.init {
                    resolve_instructions(&mut init.instructions, ctx);
                }
            }
            ModuleItem::Export(export) => {
                let ns = match export.kind {
                    ExternalKind::Function => Namespace::Function,
                    ExternalKind::Table => Namespace::Table,
                    ExternalKind::Memory => Namespace::Memory,
                    ExternalKind::Global => Namespace::Global,
                    ExternalKind::Event => Namespace::Event,
                };
                resolve_var(&mut export.var, ns, ctx, span);
            }
            ModuleItem::Start(start) => {
                resolve_var(&mut start.var, Namespace::Function, ctx, span);
            }
            ModuleItem::Element(segment) => {
                if let SegmentMode::Active { target, offset } = &mut segment.mode {
                    if let Some(target) = target {
                        resolve_var(target, Namespace::Table, ctx, span);
                    }
                    resolve_instructions(&mut offset.instructions, ctx);
                }
                resolve_element_list(&mut segment.elements, ctx, span);
            }
            ModuleItem::Data(segment) => {
                if let SegmentMode::Active { target, offset } = &mut segment.mode {
                    if let Some(target) = target {
                        resolve_var(target, Namespace::Memory, ctx, span);
                    }
                    resolve_instructions(&mut offset.instructions, ctx);
                }
            }
            ModuleItem::Event(event) => {
                resolve_function_type_use(&mut event.ty.ty, ctx, span);
            }
            ModuleItem::Custom(_) => {}
        }
    }
}

fn resolve_var(var: &mut Var, ns: Namespace, ctx: &mut Context, span: Span) {
    let name = match var {
        Var::Name(name) => name.clone(),
        Var::Index(_) => return,
    };
    match ctx.names(ns).get(&name) {
        Some(index) => *var = Var::Index(index),
        None => {
            ctx.errors
                .on_error(span, format!("Undefined {}: ${}", ns.desc(), name));
        }
    }
}

/// Resolve an explicit `(type $t)` reference, or point an inline signature
/// at its (possibly synthesized) type entry.
fn resolve_type_use(
    type_use: &mut Option<Var>,
    ty: &FunctionType,
    ctx: &mut Context,
    span: Span,
) {
    match type_use {
        Some(var) => resolve_var(var, Namespace::Type, ctx, span),
        None => {
            if let Some(index) = ctx.function_type_map.get_index(ty) {
                *type_use = Some(Var::Index(index));
            }
        }
    }
}

fn resolve_function_type_use(ftu: &mut FunctionTypeUse, ctx: &mut Context, span: Span) {
    for param in &mut ftu.ty.params {
        resolve_value_type(param, ctx, span);
    }
    for result in &mut ftu.ty.results {
        resolve_value_type(result, ctx, span);
    }
    let ty = ftu.ty.clone();
    resolve_type_use(&mut ftu.type_use, &ty, ctx, span);
}

fn resolve_bound_function_type(ty: &mut BoundFunctionType, ctx: &mut Context, span: Span) {
    for param in &mut ty.params {
        resolve_value_type(&mut param.value_type, ctx, span);
    }
    for result in &mut ty.results {
        resolve_value_type(result, ctx, span);
    }
}

fn resolve_value_type(vt: &mut ValueType, ctx: &mut Context, span: Span) {
    if let ValueType::Reference(rt) = vt {
        resolve_reference_type(rt, ctx, span);
    }
}

fn resolve_reference_type(rt: &mut ReferenceType, ctx: &mut Context, span: Span) {
    if let ReferenceType::Ref { heap_type, .. } = rt {
        resolve_heap_type(heap_type, ctx, span);
    }
}

fn resolve_heap_type(ht: &mut HeapType, ctx: &mut Context, span: Span) {
    if let HeapType::Index(var) = ht {
        resolve_var(var, Namespace::Type, ctx, span);
    }
}

fn resolve_element_list(elements: &mut ElementList, ctx: &mut Context, span: Span) {
    match elements {
        ElementList::Indices { vars, .. } => {
            for var in vars {
                resolve_var(var, Namespace::Function, ctx, span);
            }
        }
        ElementList::Expressions { element_type, exprs } => {
            resolve_reference_type(element_type, ctx, span);
            for expr in exprs {
                resolve_instructions(&mut expr.instructions, ctx);
            }
        }
    }
}

fn resolve_instructions(instructions: &mut [Instruction], ctx: &mut Context) {
    for instruction in instructions {
        let span = instruction.span;
        let op = instruction.opcode;
        match &mut instruction.immediate {
            Immediate::Index(var) => {
                if let Some(ns) = module_var_namespace(op) {
                    resolve_var(var, ns, ctx, span);
                }
            }
            Immediate::Block(block) => {
                if !block.ty.is_inline_type() {
                    resolve_function_type_use(&mut block.ty, ctx, span);
                }
            }
            Immediate::CallIndirect(imm) => {
                if let Some(table) = &mut imm.table {
                    resolve_var(table, Namespace::Table, ctx, span);
                }
                resolve_function_type_use(&mut imm.ty, ctx, span);
            }
            Immediate::BrOnExn(imm) => {
                resolve_var(&mut imm.event, Namespace::Event, ctx, span);
            }
            Immediate::Copy(imm) => {
                let ns = if op == Opcode::TableCopy {
                    Namespace::Table
                } else {
                    Namespace::Memory
                };
                if let Some(dst) = &mut imm.dst {
                    resolve_var(dst, ns, ctx, span);
                }
                if let Some(src) = &mut imm.src {
                    resolve_var(src, ns, ctx, span);
                }
            }
            Immediate::Init(imm) => {
                let (segment_ns, dst_ns) = if op == Opcode::TableInit {
                    (Namespace::Elem, Namespace::Table)
                } else {
                    (Namespace::Data, Namespace::Memory)
                };
                resolve_var(&mut imm.segment, segment_ns, ctx, span);
                if let Some(dst) = &mut imm.dst {
                    resolve_var(dst, dst_ns, ctx, span);
                }
            }
            Immediate::HeapType(ht) => {
                resolve_heap_type(ht, ctx, span);
            }
            Immediate::SelectTypes(types) => {
                for vt in types {
                    resolve_value_type(vt, ctx, span);
                }
            }
            _ => {}
        }
    }
}
