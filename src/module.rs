//! The module-level AST.
//!
//! A [`Module`] is a flat, ordered list of [`ModuleItem`]s, in declaration
//! order. Both readers produce it: the text reader appends any
//! dedup-synthesized type entries at the end, and the binary reader flattens
//! its sections into items (merging the function and code sections into
//! uniform [`Function`] records).

use crate::instruction::Instruction;
use crate::location::Span;
use crate::types::{
    BoundFunctionType, BoundValueType, ExternalKind, FunctionTypeUse, Limits, Mutability,
    ReferenceType, ValueType, Var,
};

/// A parsed module.
#[derive(Debug, Default, PartialEq)]
pub struct Module {
    /// Optional `$name` from `(module $name ...)`.
    pub name: Option<String>,
    pub items: Vec<ModuleItem>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ModuleItem) {
        self.items.push(item);
    }

    /// Iterate over the function items (defined or inline-imported).
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.items.iter().filter_map(|item| match item {
            ModuleItem::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Iterate over the type entries, including synthesized ones.
    pub fn types(&self) -> impl Iterator<Item = &TypeEntry> {
        self.items.iter().filter_map(|item| match item {
            ModuleItem::Type(t) => Some(t),
            _ => None,
        })
    }
}

/// A single module field.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleItem {
    Type(TypeEntry),
    Import(Import),
    Function(Function),
    Table(Table),
    Memory(Memory),
    Global(Global),
    Export(Export),
    Start(Start),
    Element(ElementSegment),
    Data(DataSegment),
    Event(Event),
    Custom(Custom),
}

impl ModuleItem {
    /// The source span of the item.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            ModuleItem::Type(x) => x.span,
            ModuleItem::Import(x) => x.span,
            ModuleItem::Function(x) => x.span,
            ModuleItem::Table(x) => x.span,
            ModuleItem::Memory(x) => x.span,
            ModuleItem::Global(x) => x.span,
            ModuleItem::Export(x) => x.span,
            ModuleItem::Start(x) => x.span,
            ModuleItem::Element(x) => x.span,
            ModuleItem::Data(x) => x.span,
            ModuleItem::Event(x) => x.span,
            ModuleItem::Custom(x) => x.span,
        }
    }
}

/// `(type $id? (func ...))`, explicit or synthesized from an inline use.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeEntry {
    pub span: Span,
    pub name: Option<String>,
    pub ty: BoundFunctionType,
}

/// `(import "m" "n")` attached inline to a func/table/memory/global/event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImport {
    pub module: String,
    pub name: String,
}

/// `(export "e")` attached inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineExport {
    pub name: String,
}

/// The imported entity of an `(import "m" "n" (<kind> ...))` item.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    Function {
        name: Option<String>,
        type_use: Option<Var>,
        ty: BoundFunctionType,
    },
    Table {
        name: Option<String>,
        ty: TableType,
    },
    Memory {
        name: Option<String>,
        ty: MemoryType,
    },
    Global {
        name: Option<String>,
        ty: GlobalType,
    },
    Event {
        name: Option<String>,
        ty: EventType,
    },
}

impl ImportDesc {
    #[must_use]
    pub fn kind(&self) -> ExternalKind {
        match self {
            ImportDesc::Function { .. } => ExternalKind::Function,
            ImportDesc::Table { .. } => ExternalKind::Table,
            ImportDesc::Memory { .. } => ExternalKind::Memory,
            ImportDesc::Global { .. } => ExternalKind::Global,
            ImportDesc::Event { .. } => ExternalKind::Event,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub span: Span,
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

/// A function definition, or a function import written in the inline form.
///
/// When `import` is present the function contributes to the import index
/// space and `locals`/`body` are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub span: Span,
    pub name: Option<String>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub type_use: Option<Var>,
    pub ty: BoundFunctionType,
    pub locals: Vec<BoundValueType>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableType {
    pub limits: Limits,
    pub element: ReferenceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutability: Mutability,
}

/// The attribute of an event; exceptions are the only kind so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAttribute {
    Exception,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventType {
    pub attribute: EventAttribute,
    pub ty: FunctionTypeUse,
}

/// A table definition. `elements` carries the inline element segment of the
/// `(table $t? reftype (elem ...))` sugar; the table type is synthesized with
/// exact limits in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub span: Span,
    pub name: Option<String>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub ty: TableType,
    pub elements: Option<ElementList>,
}

/// A memory definition. `data` carries the inline data segment of the
/// `(memory $m? (data "..."))` sugar; the memory type is synthesized with
/// exact limits covering the decoded byte size.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    pub span: Span,
    pub name: Option<String>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub ty: MemoryType,
    pub data: Option<Vec<Vec<u8>>>,
}

/// A constant expression: the instruction list of a global initializer or an
/// active segment offset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantExpression {
    pub instructions: Vec<Instruction>,
}

/// A global definition or inline import. `init` is present iff the global is
/// not imported.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub span: Span,
    pub name: Option<String>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub ty: GlobalType,
    pub init: Option<ConstantExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub span: Span,
    pub name: String,
    pub kind: ExternalKind,
    pub var: Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Start {
    pub span: Span,
    pub var: Var,
}

/// How a segment is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentMode {
    Active {
        /// Explicit table/memory use; `None` means index 0.
        target: Option<Var>,
        offset: ConstantExpression,
    },
    Passive,
    Declared,
}

/// One initializer expression of an element segment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementExpression {
    pub instructions: Vec<Instruction>,
}

/// The payload of an element segment: either function indices (the
/// element-kind form) or typed expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementList {
    Indices {
        kind: ExternalKind,
        vars: Vec<Var>,
    },
    Expressions {
        element_type: ReferenceType,
        exprs: Vec<ElementExpression>,
    },
}

impl ElementList {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ElementList::Indices { vars, .. } => vars.len(),
            ElementList::Expressions { exprs, .. } => exprs.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub span: Span,
    pub name: Option<String>,
    pub mode: SegmentMode,
    pub elements: ElementList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub span: Span,
    pub name: Option<String>,
    pub mode: SegmentMode,
    /// The data strings; the binary reader yields a single entry.
    pub data: Vec<Vec<u8>>,
}

impl DataSegment {
    /// Total decoded byte size across all strings.
    #[must_use]
    pub fn byte_size(&self) -> u32 {
        self.data.iter().map(|d| d.len() as u32).sum()
    }
}

/// An exception event, gated by the exceptions feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub span: Span,
    pub name: Option<String>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub ty: EventType,
}

/// A custom section, preserved verbatim. `span` covers the whole section
/// record; `data_offset` is the absolute offset of `data` within the module,
/// so subsection decoders can attribute errors to real input positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Custom {
    pub span: Span,
    pub name: String,
    pub data: Vec<u8>,
    pub data_offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_iterators() {
        let mut module = Module::new();
        module.push(ModuleItem::Type(TypeEntry {
            span: Span::default(),
            name: None,
            ty: BoundFunctionType::default(),
        }));
        module.push(ModuleItem::Function(Function {
            span: Span::default(),
            name: Some("f".to_string()),
            exports: vec![],
            import: None,
            type_use: None,
            ty: BoundFunctionType::default(),
            locals: vec![],
            body: vec![],
        }));

        assert_eq!(module.types().count(), 1);
        assert_eq!(module.functions().count(), 1);
        assert_eq!(module.functions().next().unwrap().name.as_deref(), Some("f"));
    }

    #[test]
    fn element_list_len() {
        let list = ElementList::Indices {
            kind: ExternalKind::Function,
            vars: vec![Var::Index(0), Var::Index(1)],
        };
        assert_eq!(list.len(), 2);
        assert!(!list.is_empty());
    }

    #[test]
    fn data_segment_byte_size() {
        let segment = DataSegment {
            span: Span::default(),
            name: None,
            mode: SegmentMode::Passive,
            data: vec![b"abc".to_vec(), b"de".to_vec()],
        };
        assert_eq!(segment.byte_size(), 5);
    }
}
