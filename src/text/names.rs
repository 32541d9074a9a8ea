//! Name tables and the transient parse context.
//!
//! WebAssembly has separate index spaces for each kind of definition; the
//! [`Context`] holds one [`NameMap`] per namespace for the duration of a
//! single module, plus the [`FunctionTypeMap`] that deduplicates inline
//! function types and synthesizes real type entries at module end. The
//! context is discarded once reading (and name resolution) completes.

use crate::error::Errors;
use crate::features::Features;
use crate::types::FunctionType;
use std::collections::HashMap;

/// An ordered namespace: each entry is bound (named) or unbound (anonymous).
///
/// Within a non-label map a name may be bound at most once; the duplicate
/// check lives in the reader so it can report the prior index. Labels use
/// [`NameMap::replace_bound`] instead, which shadows.
#[derive(Debug, Default)]
pub struct NameMap {
    entries: Vec<Option<String>>,
    lookup: HashMap<String, u32>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bound entry, returning its index.
    pub fn new_bound(&mut self, name: &str) -> u32 {
        let index = self.entries.len() as u32;
        self.entries.push(Some(name.to_string()));
        self.lookup.insert(name.to_string(), index);
        index
    }

    /// Append an anonymous entry, returning its index.
    pub fn new_unbound(&mut self) -> u32 {
        let index = self.entries.len() as u32;
        self.entries.push(None);
        index
    }

    /// Append a bound entry, shadowing any previous binding of the same
    /// name. Only labels use this.
    pub fn replace_bound(&mut self, name: &str) -> u32 {
        let index = self.entries.len() as u32;
        self.entries.push(Some(name.to_string()));
        self.lookup.insert(name.to_string(), index);
        index
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.lookup.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.lookup.clear();
    }
}

/// Records every function type used or defined in a module, deduplicating
/// inline uses so they can be synthesized as real type entries at module end.
#[derive(Debug, Default)]
pub struct FunctionTypeMap {
    defined: Vec<FunctionType>,
    uses: Vec<FunctionType>,
    drained: bool,
}

impl FunctionTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an explicit `(type ...)` entry. Each gets its own index, even
    /// when signatures repeat.
    pub fn define(&mut self, ty: FunctionType) {
        self.defined.push(ty);
    }

    /// Record a use site. Only inline uses (no explicit `(type $t)`) are
    /// deferred for synthesis.
    pub fn use_type(&mut self, has_type_use: bool, ty: &FunctionType) {
        if !has_type_use {
            self.uses.push(ty.clone());
        }
    }

    /// Drain the deferred inline types: every use whose signature is not
    /// already defined (or already synthesized) becomes a new entry, in
    /// first-use order. The synthesized types are appended to the defined
    /// list so later lookups see the final index space.
    pub fn end_module(&mut self) -> Vec<FunctionType> {
        let mut synthesized: Vec<FunctionType> = Vec::new();
        for ty in self.uses.drain(..) {
            if self.defined.contains(&ty) || synthesized.contains(&ty) {
                continue;
            }
            synthesized.push(ty.clone());
        }
        self.defined.extend(synthesized.iter().cloned());
        self.drained = true;
        synthesized
    }

    /// The index of the first type matching this signature. Only meaningful
    /// after [`FunctionTypeMap::end_module`].
    #[must_use]
    pub fn get_index(&self, ty: &FunctionType) -> Option<u32> {
        debug_assert!(self.drained);
        self.defined.iter().position(|t| t == ty).map(|i| i as u32)
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.defined.len() as u32
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defined.is_empty()
    }

    pub fn reset(&mut self) {
        self.defined.clear();
        self.uses.clear();
        self.drained = false;
    }
}

/// The module-level index namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Type,
    Function,
    Table,
    Memory,
    Global,
    Event,
    Elem,
    Data,
    Local,
}

impl Namespace {
    #[must_use]
    pub fn desc(self) -> &'static str {
        match self {
            Namespace::Type => "type",
            Namespace::Function => "function",
            Namespace::Table => "table",
            Namespace::Memory => "memory",
            Namespace::Global => "global",
            Namespace::Event => "event",
            Namespace::Elem => "element segment",
            Namespace::Data => "data segment",
            Namespace::Local => "local",
        }
    }
}

/// Transient state for reading one module from text.
#[derive(Debug)]
pub struct Context {
    pub features: Features,
    pub errors: Errors,

    pub type_names: NameMap,
    pub function_names: NameMap,
    pub table_names: NameMap,
    pub memory_names: NameMap,
    pub global_names: NameMap,
    pub event_names: NameMap,
    pub element_segment_names: NameMap,
    pub data_segment_names: NameMap,
    /// Reset per function; params first, then locals.
    pub local_names: NameMap,
    /// Append-only record of block labels; resolution uses the stack below.
    pub label_names: NameMap,
    /// Innermost label last. `None` entries are unlabeled blocks.
    pub label_stack: Vec<Option<String>>,

    pub function_type_map: FunctionTypeMap,

    pub seen_start: bool,
    pub seen_non_import: bool,
}

impl Context {
    pub fn new(features: Features) -> Self {
        Self {
            features,
            errors: Errors::new(),
            type_names: NameMap::new(),
            function_names: NameMap::new(),
            table_names: NameMap::new(),
            memory_names: NameMap::new(),
            global_names: NameMap::new(),
            event_names: NameMap::new(),
            element_segment_names: NameMap::new(),
            data_segment_names: NameMap::new(),
            local_names: NameMap::new(),
            label_names: NameMap::new(),
            label_stack: Vec::new(),
            function_type_map: FunctionTypeMap::new(),
            seen_start: false,
            seen_non_import: false,
        }
    }

    /// Reset all per-module state.
    pub fn begin_module(&mut self) {
        self.type_names.reset();
        self.function_names.reset();
        self.table_names.reset();
        self.memory_names.reset();
        self.global_names.reset();
        self.event_names.reset();
        self.element_segment_names.reset();
        self.data_segment_names.reset();
        self.local_names.reset();
        self.label_names.reset();
        self.label_stack.clear();
        self.function_type_map.reset();
        self.seen_start = false;
        self.seen_non_import = false;
    }

    /// Finish the module, draining the deferred inline types the caller must
    /// append as synthesized type entries.
    pub fn end_module(&mut self) -> Vec<FunctionType> {
        self.function_type_map.end_module()
    }

    /// Reset per-function state for a new function body.
    pub fn begin_function(&mut self) {
        self.local_names.reset();
        self.label_stack.clear();
    }

    /// Pop the innermost block label.
    pub fn end_block(&mut self) {
        self.label_stack.pop();
    }

    pub fn names_mut(&mut self, ns: Namespace) -> &mut NameMap {
        match ns {
            Namespace::Type => &mut self.type_names,
            Namespace::Function => &mut self.function_names,
            Namespace::Table => &mut self.table_names,
            Namespace::Memory => &mut self.memory_names,
            Namespace::Global => &mut self.global_names,
            Namespace::Event => &mut self.event_names,
            Namespace::Elem => &mut self.element_segment_names,
            Namespace::Data => &mut self.data_segment_names,
            Namespace::Local => &mut self.local_names,
        }
    }

    #[must_use]
    pub fn names(&self, ns: Namespace) -> &NameMap {
        match ns {
            Namespace::Type => &self.type_names,
            Namespace::Function => &self.function_names,
            Namespace::Table => &self.table_names,
            Namespace::Memory => &self.memory_names,
            Namespace::Global => &self.global_names,
            Namespace::Event => &self.event_names,
            Namespace::Elem => &self.element_segment_names,
            Namespace::Data => &self.data_segment_names,
            Namespace::Local => &self.local_names,
        }
    }

    /// Resolve a label name to its branch depth (innermost match wins).
    #[must_use]
    pub fn resolve_label(&self, name: &str) -> Option<u32> {
        self.label_stack
            .iter()
            .rev()
            .position(|label| label.as_deref() == Some(name))
            .map(|depth| depth as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    fn ft(params: Vec<ValueType>, results: Vec<ValueType>) -> FunctionType {
        FunctionType::new(params, results)
    }

    #[test]
    fn name_map_binds_in_order() {
        let mut map = NameMap::new();
        assert_eq!(map.new_bound("a"), 0);
        assert_eq!(map.new_unbound(), 1);
        assert_eq!(map.new_bound("b"), 2);
        assert_eq!(map.get("a"), Some(0));
        assert_eq!(map.get("b"), Some(2));
        assert!(map.has("a"));
        assert!(!map.has("c"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn name_map_replace_bound_shadows() {
        let mut map = NameMap::new();
        map.replace_bound("l");
        map.replace_bound("l");
        assert_eq!(map.get("l"), Some(1));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn function_type_map_dedups_uses() {
        let mut map = FunctionTypeMap::new();
        map.define(ft(vec![ValueType::I32], vec![]));
        // Same signature used inline: no new entry.
        map.use_type(false, &ft(vec![ValueType::I32], vec![]));
        // New inline signature used twice: one synthesized entry.
        map.use_type(false, &ft(vec![], vec![ValueType::I64]));
        map.use_type(false, &ft(vec![], vec![ValueType::I64]));
        // A use with an explicit type reference defers nothing.
        map.use_type(true, &ft(vec![ValueType::F32], vec![]));

        let synthesized = map.end_module();
        assert_eq!(synthesized, vec![ft(vec![], vec![ValueType::I64])]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_index(&ft(vec![ValueType::I32], vec![])), Some(0));
        assert_eq!(map.get_index(&ft(vec![], vec![ValueType::I64])), Some(1));
        assert_eq!(map.get_index(&ft(vec![ValueType::F32], vec![])), None);
    }

    #[test]
    fn duplicate_defined_types_keep_both_entries() {
        let mut map = FunctionTypeMap::new();
        map.define(ft(vec![], vec![]));
        map.define(ft(vec![], vec![]));
        let synthesized = map.end_module();
        assert!(synthesized.is_empty());
        assert_eq!(map.len(), 2);
        // Lookup finds the first.
        assert_eq!(map.get_index(&ft(vec![], vec![])), Some(0));
    }

    #[test]
    fn label_resolution_is_innermost_first() {
        let mut ctx = Context::new(Features::new());
        ctx.label_stack.push(Some("outer".to_string()));
        ctx.label_stack.push(None);
        ctx.label_stack.push(Some("inner".to_string()));
        assert_eq!(ctx.resolve_label("inner"), Some(0));
        assert_eq!(ctx.resolve_label("outer"), Some(2));
        assert_eq!(ctx.resolve_label("missing"), None);

        // Shadowing: a nested label with the same name wins.
        ctx.label_stack.push(Some("outer".to_string()));
        assert_eq!(ctx.resolve_label("outer"), Some(0));
        ctx.end_block();
        assert_eq!(ctx.resolve_label("outer"), Some(3));
    }

    #[test]
    fn begin_module_resets_flags() {
        let mut ctx = Context::new(Features::new());
        ctx.seen_start = true;
        ctx.seen_non_import = true;
        ctx.function_names.new_bound("f");
        ctx.begin_module();
        assert!(!ctx.seen_start);
        assert!(!ctx.seen_non_import);
        assert!(ctx.function_names.is_empty());
    }
}
