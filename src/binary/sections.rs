//! Section-level reading of the binary format.
//!
//! A module is the 8-byte header followed by `(id, size, body)` sections.
//! Known sections must be unique and appear in the required order (which is
//! not numeric: the event section sits between memory and global, and the
//! data-count section between element and code). Each vectored section body
//! is wrapped in a [`LazySequence`] that yields elements on demand while the
//! underlying cursor advances.
//!
//! Errors never halt section reading (only a bad header does): the failed
//! section is skipped to its boundary and reading continues, so one pass
//! collects every problem.

use super::encoding;
use super::instructions::{read_constant_expression, read_function_body};
use super::reader::Cursor;
use crate::error::{Error, Errors};
use crate::features::Features;
use crate::location::Span;
use crate::module::{
    ConstantExpression, Custom, DataSegment, ElementExpression, ElementList, ElementSegment,
    Event, EventAttribute, EventType, Export, Function, Global, GlobalType, Import, ImportDesc,
    Memory, MemoryType, Module, ModuleItem, SegmentMode, Start, Table, TableType, TypeEntry,
};
use crate::types::{
    BoundValueType, ExternalKind, FunctionType, FunctionTypeUse, Limits, ReferenceType, Shared,
    ValueType, Var,
};

/// Implementation limit on expanded local declarations, so a tiny body
/// cannot request gigabytes of locals.
const MAX_FUNCTION_LOCALS: u64 = 50_000;

/// A lazily-consumed vector: the leading count is decoded eagerly, elements
/// on demand. Iterating one sequence must finish before the next section is
/// touched, since the cursor advance is the side effect.
pub struct LazySequence {
    count: u32,
    index: u32,
}

impl LazySequence {
    pub fn begin(cursor: &mut Cursor, errors: &mut Errors) -> Option<Self> {
        match cursor.read_count() {
            Ok(count) => Some(Self { count, index: 0 }),
            Err(e) => {
                errors.on_error(e.span, e.message);
                None
            }
        }
    }

    /// The next element index, or `None` when the sequence is done.
    pub fn next(&mut self) -> Option<u32> {
        if self.index < self.count {
            let index = self.index;
            self.index += 1;
            Some(index)
        } else {
            None
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Read a whole binary module, collecting all diagnostics.
pub fn read_module(bytes: &[u8], features: Features) -> (Module, Vec<Error>) {
    let mut reader = SectionReader::new(features);
    let mut cursor = Cursor::new(bytes);

    if reader.read_header(&mut cursor).is_some() {
        while !cursor.is_at_end() {
            if reader.read_section(&mut cursor).is_none() {
                break;
            }
        }
        reader.finish(&cursor);
    }

    (reader.module, reader.errors.into_vec())
}

struct SectionReader {
    features: Features,
    errors: Errors,
    module: Module,
    /// Type indices from the function section, waiting for code bodies.
    pending_functions: Vec<u32>,
    seen_code: bool,
    data_count: Option<u32>,
    seen: [bool; 14],
    last_rank: u32,
}

impl SectionReader {
    fn new(features: Features) -> Self {
        Self {
            features,
            errors: Errors::new(),
            module: Module::new(),
            pending_functions: Vec::new(),
            seen_code: false,
            data_count: None,
            seen: [false; 14],
            last_rank: 0,
        }
    }

    /// Run `f` with a context frame pushed; the pop runs on every exit path.
    fn with_frame<T>(
        &mut self,
        span: Span,
        desc: impl Into<String>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.errors.push_context(span, desc);
        let result = f(self);
        self.errors.pop_context();
        result
    }

    fn sink<T>(&mut self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.on_error(e.span, e.message);
                None
            }
        }
    }

    /// Verify `\0asm` and version 1. Any mismatch is fatal.
    fn read_header(&mut self, cursor: &mut Cursor) -> Option<()> {
        let span = cursor.here();
        let magic = match cursor.read_bytes(4) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.errors
                    .on_error(span, "Unable to read module header: input too short");
                return None;
            }
        };
        if magic != encoding::MAGIC {
            self.errors.on_error(
                span,
                format!(
                    "Magic mismatch: expected 0061736d, got {:02x}{:02x}{:02x}{:02x}",
                    magic[0], magic[1], magic[2], magic[3]
                ),
            );
            return None;
        }
        let span = cursor.here();
        let version = match cursor.read_bytes(4) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.errors
                    .on_error(span, "Unable to read module version: input too short");
                return None;
            }
        };
        if version != encoding::VERSION {
            self.errors.on_error(
                span,
                format!(
                    "Version mismatch: expected 01000000, got {:02x}{:02x}{:02x}{:02x}",
                    version[0], version[1], version[2], version[3]
                ),
            );
            return None;
        }
        Some(())
    }

    /// Read one `(id, size, body)` section. `None` halts the loop (framing
    /// is unrecoverable); per-section content errors skip to the boundary.
    fn read_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let section_start = cursor.pos();
        let id = self.sink(cursor.read_u8())?;
        let size = self.sink(cursor.read_u32_leb())?;
        if size as usize > cursor.remaining() {
            self.errors.on_error(
                cursor.span_from(section_start),
                format!(
                    "Section size {} exceeds remaining module length {}",
                    size,
                    cursor.remaining()
                ),
            );
            return None;
        }
        let body_start = cursor.pos();
        let body = self.sink(cursor.read_bytes(size as usize))?;
        let mut body_cursor = Cursor::with_base(body, body_start);
        let section_span = cursor.span_from(section_start);

        if id != encoding::SECTION_CUSTOM {
            if let Some(rank) = section_rank(id) {
                if self.seen[id as usize] {
                    self.errors.on_error(
                        section_span,
                        format!("Duplicate {} section", section_name(id)),
                    );
                } else if rank < self.last_rank {
                    self.errors.on_error(
                        section_span,
                        format!("{} section out of order", section_name(id)),
                    );
                }
                self.seen[id as usize] = true;
                self.last_rank = self.last_rank.max(rank);
            } else {
                // Unknown id: diagnose, preserve the body as a custom-like
                // blob, and keep going.
                self.errors
                    .on_error(section_span, format!("Unknown section id: {}", id));
                self.module.push(ModuleItem::Custom(Custom {
                    span: section_span,
                    name: String::new(),
                    data: body.to_vec(),
                    data_offset: body_start,
                }));
                return Some(());
            }
        }

        let before = self.errors.len();
        let desc = format!("{} section", section_name(id));
        let _ = self.with_frame(section_span, desc, |reader| match id {
            encoding::SECTION_CUSTOM => {
                reader.read_custom_section(&mut body_cursor, section_span)
            }
            encoding::SECTION_TYPE => reader.read_type_section(&mut body_cursor),
            encoding::SECTION_IMPORT => reader.read_import_section(&mut body_cursor),
            encoding::SECTION_FUNCTION => reader.read_function_section(&mut body_cursor),
            encoding::SECTION_TABLE => reader.read_table_section(&mut body_cursor),
            encoding::SECTION_MEMORY => reader.read_memory_section(&mut body_cursor),
            encoding::SECTION_GLOBAL => reader.read_global_section(&mut body_cursor),
            encoding::SECTION_EXPORT => reader.read_export_section(&mut body_cursor),
            encoding::SECTION_START => reader.read_start_section(&mut body_cursor),
            encoding::SECTION_ELEMENT => reader.read_element_section(&mut body_cursor),
            encoding::SECTION_CODE => reader.read_code_section(&mut body_cursor),
            encoding::SECTION_DATA => reader.read_data_section(&mut body_cursor),
            encoding::SECTION_DATA_COUNT => reader.read_data_count_section(&mut body_cursor),
            encoding::SECTION_EVENT => reader.read_event_section(&mut body_cursor),
            _ => unreachable!("unknown ids handled above"),
        });

        // Only flag trailing bytes when the section otherwise read cleanly;
        // a failed element already skipped to the boundary.
        if self.errors.len() == before && !body_cursor.is_at_end() {
            self.errors.on_error(
                body_cursor.here(),
                format!(
                    "{} extra bytes at end of {} section",
                    body_cursor.remaining(),
                    section_name(id)
                ),
            );
        }

        Some(())
    }

    fn finish(&mut self, cursor: &Cursor) {
        if !self.pending_functions.is_empty() && !self.seen_code {
            self.errors.on_error(
                cursor.here(),
                format!(
                    "Expected code section with {} function bodies",
                    self.pending_functions.len()
                ),
            );
        }
    }

    // ------------------------------------------------------------------
    // Shared element readers
    // ------------------------------------------------------------------

    fn read_value_type(&mut self, cursor: &mut Cursor) -> Option<ValueType> {
        let span = cursor.here();
        let byte = self.sink(cursor.read_u8())?;
        match encoding::decode_value_type(byte) {
            Some(vt) => {
                if !self.features.contains(vt.required_features()) {
                    self.errors
                        .on_error(span, format!("value type {} not allowed", vt));
                    return None;
                }
                Some(vt)
            }
            None => {
                self.errors
                    .on_error(span, format!("Unknown value type: {:#04x}", byte));
                None
            }
        }
    }

    fn read_value_type_vector(&mut self, cursor: &mut Cursor) -> Option<Vec<ValueType>> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        let mut types = Vec::with_capacity(seq.count() as usize);
        while seq.next().is_some() {
            types.push(self.read_value_type(cursor)?);
        }
        Some(types)
    }

    fn read_reference_type(&mut self, cursor: &mut Cursor) -> Option<ReferenceType> {
        let span = cursor.here();
        let byte = self.sink(cursor.read_u8())?;
        match encoding::decode_reference_type(byte) {
            Some(rt) => {
                if !self.features.contains(rt.required_features_as_element()) {
                    self.errors
                        .on_error(span, format!("reference type {} not allowed", rt));
                    return None;
                }
                Some(rt)
            }
            None => {
                self.errors
                    .on_error(span, format!("Unknown reference type: {:#04x}", byte));
                None
            }
        }
    }

    fn read_limits(&mut self, cursor: &mut Cursor) -> Option<Limits> {
        let span = cursor.here();
        let flags = self.sink(cursor.read_u8())?;
        let (has_max, shared) = match encoding::decode_limits_flags(flags) {
            Some(decoded) => decoded,
            None => {
                self.errors
                    .on_error(span, format!("Invalid limits flags: {:#04x}", flags));
                return None;
            }
        };
        if shared == Shared::Yes && !self.features.threads_enabled() {
            self.errors.on_error(span, "Shared memory not allowed");
            return None;
        }
        let min = self.sink(cursor.read_u32_leb())?;
        let max = if has_max {
            let max = self.sink(cursor.read_u32_leb())?;
            if max < min {
                self.errors.on_error(
                    span,
                    format!("Expected max >= min, got min {} max {}", min, max),
                );
                return None;
            }
            Some(max)
        } else {
            None
        };
        Some(Limits { min, max, shared })
    }

    fn read_utf8(&mut self, cursor: &mut Cursor) -> Option<String> {
        let span = cursor.here();
        let bytes = self.sink(cursor.read_string())?;
        match std::str::from_utf8(bytes) {
            Ok(s) => Some(s.to_string()),
            Err(_) => {
                self.errors.on_error(span, "Invalid UTF-8 encoding");
                None
            }
        }
    }

    fn read_index_vector(&mut self, cursor: &mut Cursor) -> Option<Vec<Var>> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        let mut vars = Vec::with_capacity(seq.count() as usize);
        while seq.next().is_some() {
            vars.push(Var::Index(self.sink(cursor.read_u32_leb())?));
        }
        Some(vars)
    }

    fn read_offset_expression(&mut self, cursor: &mut Cursor) -> Option<ConstantExpression> {
        let instructions = read_constant_expression(cursor, self.features, &mut self.errors)?;
        Some(ConstantExpression { instructions })
    }

    fn read_element_kind(&mut self, cursor: &mut Cursor) -> Option<ExternalKind> {
        let span = cursor.here();
        let byte = self.sink(cursor.read_u8())?;
        if byte != encoding::ELEMKIND_FUNCREF {
            self.errors
                .on_error(span, format!("Unknown element kind: {:#04x}", byte));
            return None;
        }
        Some(ExternalKind::Function)
    }

    fn read_element_expressions(
        &mut self,
        cursor: &mut Cursor,
    ) -> Option<Vec<ElementExpression>> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        let mut exprs = Vec::with_capacity(seq.count() as usize);
        // Element expressions reuse the reference-types opcodes even when
        // only bulk memory enabled their encoding.
        let mut features = self.features;
        features.enable_reference_types();
        while seq.next().is_some() {
            let instructions = read_constant_expression(cursor, features, &mut self.errors)?;
            exprs.push(ElementExpression { instructions });
        }
        Some(exprs)
    }

    // ------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------

    fn read_custom_section(&mut self, cursor: &mut Cursor, span: Span) -> Option<()> {
        let name = self.read_utf8(cursor).unwrap_or_default();
        // The payload starts after the section's own name string.
        let data_offset = cursor.pos();
        let data = self.sink(cursor.read_bytes(cursor.remaining()))?.to_vec();
        self.module.push(ModuleItem::Custom(Custom {
            span,
            name,
            data,
            data_offset,
        }));
        Some(())
    }

    fn read_type_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let span = cursor.here();
            let prefix = self.sink(cursor.read_u8())?;
            if prefix != encoding::TYPE_FUNC {
                self.errors.on_error(
                    span,
                    format!("Expected function type prefix 0x60, got {:#04x}", prefix),
                );
                return None;
            }
            let params = self.read_value_type_vector(cursor)?;
            let results = self.read_value_type_vector(cursor)?;
            self.module.push(ModuleItem::Type(TypeEntry {
                span: cursor.span_from(start),
                name: None,
                ty: FunctionType::new(params, results).into(),
            }));
        }
        Some(())
    }

    fn read_import_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let module = self.read_utf8(cursor)?;
            let name = self.read_utf8(cursor)?;
            let kind_span = cursor.here();
            let kind = self.sink(cursor.read_u8())?;
            let desc = match encoding::decode_external_kind(kind) {
                Some(ExternalKind::Function) => ImportDesc::Function {
                    name: None,
                    type_use: Some(Var::Index(self.sink(cursor.read_u32_leb())?)),
                    ty: Default::default(),
                },
                Some(ExternalKind::Table) => {
                    let element = self.read_reference_type(cursor)?;
                    let limits = self.read_limits(cursor)?;
                    ImportDesc::Table {
                        name: None,
                        ty: TableType { limits, element },
                    }
                }
                Some(ExternalKind::Memory) => ImportDesc::Memory {
                    name: None,
                    ty: MemoryType {
                        limits: self.read_limits(cursor)?,
                    },
                },
                Some(ExternalKind::Global) => {
                    let value_type = self.read_value_type(cursor)?;
                    let mut_span = cursor.here();
                    let mutability = self.sink(cursor.read_u8())?;
                    let mutability = match encoding::decode_mutability(mutability) {
                        Some(m) => m,
                        None => {
                            self.errors.on_error(
                                mut_span,
                                format!("Invalid mutability: {:#04x}", mutability),
                            );
                            return None;
                        }
                    };
                    ImportDesc::Global {
                        name: None,
                        ty: GlobalType {
                            value_type,
                            mutability,
                        },
                    }
                }
                Some(ExternalKind::Event) => {
                    if !self.features.exceptions_enabled() {
                        self.errors.on_error(kind_span, "Events not allowed");
                        return None;
                    }
                    ImportDesc::Event {
                        name: None,
                        ty: self.read_event_type(cursor)?,
                    }
                }
                None => {
                    self.errors
                        .on_error(kind_span, format!("Unknown import kind: {:#04x}", kind));
                    return None;
                }
            };
            self.module.push(ModuleItem::Import(Import {
                span: cursor.span_from(start),
                module,
                name,
                desc,
            }));
        }
        Some(())
    }

    fn read_event_type(&mut self, cursor: &mut Cursor) -> Option<EventType> {
        let span = cursor.here();
        let attribute = self.sink(cursor.read_u32_leb())?;
        if attribute != 0 {
            self.errors
                .on_error(span, format!("Unknown event attribute: {}", attribute));
            return None;
        }
        let type_index = self.sink(cursor.read_u32_leb())?;
        Some(EventType {
            attribute: EventAttribute::Exception,
            ty: FunctionTypeUse {
                type_use: Some(Var::Index(type_index)),
                ty: FunctionType::default(),
            },
        })
    }

    fn read_function_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let index = self.sink(cursor.read_u32_leb())?;
            self.pending_functions.push(index);
        }
        Some(())
    }

    fn read_table_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let element = self.read_reference_type(cursor)?;
            let limits = self.read_limits(cursor)?;
            self.module.push(ModuleItem::Table(Table {
                span: cursor.span_from(start),
                name: None,
                exports: vec![],
                import: None,
                ty: TableType { limits, element },
                elements: None,
            }));
        }
        Some(())
    }

    fn read_memory_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let limits = self.read_limits(cursor)?;
            self.module.push(ModuleItem::Memory(Memory {
                span: cursor.span_from(start),
                name: None,
                exports: vec![],
                import: None,
                ty: MemoryType { limits },
                data: None,
            }));
        }
        Some(())
    }

    fn read_global_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let value_type = self.read_value_type(cursor)?;
            let mut_span = cursor.here();
            let mutability = self.sink(cursor.read_u8())?;
            let mutability = match encoding::decode_mutability(mutability) {
                Some(m) => m,
                None => {
                    self.errors
                        .on_error(mut_span, format!("Invalid mutability: {:#04x}", mutability));
                    return None;
                }
            };
            let init = self.read_offset_expression(cursor)?;
            self.module.push(ModuleItem::Global(Global {
                span: cursor.span_from(start),
                name: None,
                exports: vec![],
                import: None,
                ty: GlobalType {
                    value_type,
                    mutability,
                },
                init: Some(init),
            }));
        }
        Some(())
    }

    fn read_export_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let name = self.read_utf8(cursor)?;
            let kind_span = cursor.here();
            let kind = self.sink(cursor.read_u8())?;
            let kind = match encoding::decode_external_kind(kind) {
                Some(ExternalKind::Event) if !self.features.exceptions_enabled() => {
                    self.errors.on_error(kind_span, "Events not allowed");
                    return None;
                }
                Some(kind) => kind,
                None => {
                    self.errors
                        .on_error(kind_span, format!("Unknown export kind: {:#04x}", kind));
                    return None;
                }
            };
            let index = self.sink(cursor.read_u32_leb())?;
            self.module.push(ModuleItem::Export(Export {
                span: cursor.span_from(start),
                name,
                kind,
                var: Var::Index(index),
            }));
        }
        Some(())
    }

    fn read_start_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let start = cursor.pos();
        let index = self.sink(cursor.read_u32_leb())?;
        self.module.push(ModuleItem::Start(Start {
            span: cursor.span_from(start),
            var: Var::Index(index),
        }));
        Some(())
    }

    fn read_element_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let flags_span = cursor.here();
            let flags = self.sink(cursor.read_u32_leb())?;

            if flags > encoding::ELEM_ACTIVE_FUNCS && !self.features.bulk_memory_enabled() {
                self.errors.on_error(
                    flags_span,
                    format!("Element segment flags {} require bulk memory", flags),
                );
                return None;
            }

            let (mode, elements) = match flags {
                encoding::ELEM_ACTIVE_FUNCS => {
                    let offset = self.read_offset_expression(cursor)?;
                    let vars = self.read_index_vector(cursor)?;
                    (
                        SegmentMode::Active {
                            target: None,
                            offset,
                        },
                        ElementList::Indices {
                            kind: ExternalKind::Function,
                            vars,
                        },
                    )
                }
                encoding::ELEM_PASSIVE_FUNCS => {
                    let kind = self.read_element_kind(cursor)?;
                    let vars = self.read_index_vector(cursor)?;
                    (SegmentMode::Passive, ElementList::Indices { kind, vars })
                }
                encoding::ELEM_ACTIVE_TABLE_FUNCS => {
                    let table = self.sink(cursor.read_u32_leb())?;
                    let offset = self.read_offset_expression(cursor)?;
                    let kind = self.read_element_kind(cursor)?;
                    let vars = self.read_index_vector(cursor)?;
                    (
                        SegmentMode::Active {
                            target: Some(Var::Index(table)),
                            offset,
                        },
                        ElementList::Indices { kind, vars },
                    )
                }
                encoding::ELEM_DECLARED_FUNCS => {
                    let kind = self.read_element_kind(cursor)?;
                    let vars = self.read_index_vector(cursor)?;
                    (SegmentMode::Declared, ElementList::Indices { kind, vars })
                }
                encoding::ELEM_ACTIVE_EXPRS => {
                    let offset = self.read_offset_expression(cursor)?;
                    let exprs = self.read_element_expressions(cursor)?;
                    (
                        SegmentMode::Active {
                            target: None,
                            offset,
                        },
                        ElementList::Expressions {
                            element_type: ReferenceType::FUNCREF,
                            exprs,
                        },
                    )
                }
                encoding::ELEM_PASSIVE_EXPRS => {
                    let element_type = self.read_reference_type(cursor)?;
                    let exprs = self.read_element_expressions(cursor)?;
                    (
                        SegmentMode::Passive,
                        ElementList::Expressions {
                            element_type,
                            exprs,
                        },
                    )
                }
                encoding::ELEM_ACTIVE_TABLE_EXPRS => {
                    let table = self.sink(cursor.read_u32_leb())?;
                    let offset = self.read_offset_expression(cursor)?;
                    let element_type = self.read_reference_type(cursor)?;
                    let exprs = self.read_element_expressions(cursor)?;
                    (
                        SegmentMode::Active {
                            target: Some(Var::Index(table)),
                            offset,
                        },
                        ElementList::Expressions {
                            element_type,
                            exprs,
                        },
                    )
                }
                encoding::ELEM_DECLARED_EXPRS => {
                    let element_type = self.read_reference_type(cursor)?;
                    let exprs = self.read_element_expressions(cursor)?;
                    (
                        SegmentMode::Declared,
                        ElementList::Expressions {
                            element_type,
                            exprs,
                        },
                    )
                }
                other => {
                    self.errors.on_error(
                        flags_span,
                        format!("Unknown element segment flags: {}", other),
                    );
                    return None;
                }
            };

            self.module.push(ModuleItem::Element(ElementSegment {
                span: cursor.span_from(start),
                name: None,
                mode,
                elements,
            }));
        }
        Some(())
    }

    fn read_data_count_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let span = cursor.here();
        if !self.features.bulk_memory_enabled() {
            self.errors
                .on_error(span, "Data count section requires bulk memory");
            return None;
        }
        self.data_count = Some(self.sink(cursor.read_u32_leb())?);
        Some(())
    }

    fn read_code_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        self.seen_code = true;
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        if seq.count() as usize != self.pending_functions.len() {
            self.errors.on_error(
                cursor.here(),
                format!(
                    "Function count mismatch: function section has {}, code section has {}",
                    self.pending_functions.len(),
                    seq.count()
                ),
            );
        }

        let pending = std::mem::take(&mut self.pending_functions);
        while let Some(index) = seq.next() {
            let type_index = match pending.get(index as usize) {
                Some(&type_index) => type_index,
                None => break,
            };
            let start = cursor.pos();
            let size = self.sink(cursor.read_u32_leb())?;
            if size as usize > cursor.remaining() {
                self.errors.on_error(
                    cursor.here(),
                    format!("Function body size {} exceeds section length", size),
                );
                return None;
            }
            let body_start = cursor.pos();
            let body = self.sink(cursor.read_bytes(size as usize))?;
            let mut body_cursor = Cursor::with_base(body, body_start);
            let span = cursor.span_from(start);

            let function = self.with_frame(span, format!("function body {}", index), |reader| {
                let locals = reader.read_locals(&mut body_cursor)?;
                let body =
                    read_function_body(&mut body_cursor, reader.features, &mut reader.errors)?;
                Some(Function {
                    span,
                    name: None,
                    exports: vec![],
                    import: None,
                    type_use: Some(Var::Index(type_index)),
                    ty: Default::default(),
                    locals,
                    body,
                })
            });

            match function {
                Some(function) => self.module.push(ModuleItem::Function(function)),
                // The body is size-delimited; skip it and continue with the
                // next one.
                None => continue,
            }
        }
        Some(())
    }

    fn read_locals(&mut self, cursor: &mut Cursor) -> Option<Vec<BoundValueType>> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        let mut locals = Vec::new();
        let mut total: u64 = 0;
        while seq.next().is_some() {
            let span = cursor.here();
            let count = self.sink(cursor.read_u32_leb())?;
            let value_type = self.read_value_type(cursor)?;
            total += count as u64;
            if total > MAX_FUNCTION_LOCALS {
                self.errors
                    .on_error(span, format!("Too many locals: {}", total));
                return None;
            }
            for _ in 0..count {
                locals.push(BoundValueType {
                    name: None,
                    value_type: value_type.clone(),
                });
            }
        }
        Some(locals)
    }

    fn read_data_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        if let Some(expected) = self.data_count {
            if expected != seq.count() {
                self.errors.on_error(
                    cursor.here(),
                    format!(
                        "Data count {} does not match data section count {}",
                        expected,
                        seq.count()
                    ),
                );
            }
        }
        while seq.next().is_some() {
            let start = cursor.pos();
            let flags_span = cursor.here();
            let flags = self.sink(cursor.read_u32_leb())?;
            let mode = match flags {
                encoding::DATA_ACTIVE => SegmentMode::Active {
                    target: None,
                    offset: self.read_offset_expression(cursor)?,
                },
                encoding::DATA_PASSIVE => {
                    if !self.features.bulk_memory_enabled() {
                        self.errors.on_error(
                            flags_span,
                            "Passive data segments require bulk memory",
                        );
                        return None;
                    }
                    SegmentMode::Passive
                }
                encoding::DATA_ACTIVE_MEMORY => {
                    let memory = self.sink(cursor.read_u32_leb())?;
                    SegmentMode::Active {
                        target: Some(Var::Index(memory)),
                        offset: self.read_offset_expression(cursor)?,
                    }
                }
                other => {
                    self.errors.on_error(
                        flags_span,
                        format!("Unknown data segment flags: {}", other),
                    );
                    return None;
                }
            };
            let bytes = self.sink(cursor.read_string())?.to_vec();
            self.module.push(ModuleItem::Data(DataSegment {
                span: cursor.span_from(start),
                name: None,
                mode,
                data: vec![bytes],
            }));
        }
        Some(())
    }

    fn read_event_section(&mut self, cursor: &mut Cursor) -> Option<()> {
        if !self.features.exceptions_enabled() {
            self.errors.on_error(cursor.here(), "Events not allowed");
            return None;
        }
        let mut seq = LazySequence::begin(cursor, &mut self.errors)?;
        while seq.next().is_some() {
            let start = cursor.pos();
            let ty = self.read_event_type(cursor)?;
            self.module.push(ModuleItem::Event(Event {
                span: cursor.span_from(start),
                name: None,
                exports: vec![],
                import: None,
                ty,
            }));
        }
        Some(())
    }
}

/// Ordering rank: the required section order is not numeric in id space.
fn section_rank(id: u8) -> Option<u32> {
    Some(match id {
        encoding::SECTION_TYPE => 10,
        encoding::SECTION_IMPORT => 20,
        encoding::SECTION_FUNCTION => 30,
        encoding::SECTION_TABLE => 40,
        encoding::SECTION_MEMORY => 50,
        encoding::SECTION_EVENT => 55,
        encoding::SECTION_GLOBAL => 60,
        encoding::SECTION_EXPORT => 70,
        encoding::SECTION_START => 80,
        encoding::SECTION_ELEMENT => 90,
        encoding::SECTION_DATA_COUNT => 95,
        encoding::SECTION_CODE => 100,
        encoding::SECTION_DATA => 110,
        _ => return None,
    })
}

fn section_name(id: u8) -> &'static str {
    match id {
        encoding::SECTION_CUSTOM => "custom",
        encoding::SECTION_TYPE => "type",
        encoding::SECTION_IMPORT => "import",
        encoding::SECTION_FUNCTION => "function",
        encoding::SECTION_TABLE => "table",
        encoding::SECTION_MEMORY => "memory",
        encoding::SECTION_GLOBAL => "global",
        encoding::SECTION_EXPORT => "export",
        encoding::SECTION_START => "start",
        encoding::SECTION_ELEMENT => "element",
        encoding::SECTION_CODE => "code",
        encoding::SECTION_DATA => "data",
        encoding::SECTION_DATA_COUNT => "data count",
        encoding::SECTION_EVENT => "event",
        _ => "unknown",
    }
}
