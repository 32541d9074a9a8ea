//! Reader for the binary format.
//!
//! A byte [`reader::Cursor`] feeds the section enumerator, which populates
//! the same typed [`Module`](crate::module::Module) the text reader builds.
//! Binary input only carries numeric indices, so no resolution pass runs.
//!
//! # Example
//!
//! ```
//! use wader::binary;
//! use wader::features::Features;
//!
//! // The empty module: magic plus version.
//! let bytes = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
//! let (module, errors) = binary::read_module(&bytes, Features::new());
//! assert!(errors.is_empty());
//! assert!(module.items.is_empty());
//! ```

pub mod encoding;
pub mod names;
pub mod reader;
pub mod sections;

mod instructions;

pub use sections::{read_module, LazySequence};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Features;
    use crate::instruction::{Immediate, Opcode};
    use crate::module::{ElementList, ImportDesc, ModuleItem, SegmentMode};
    use crate::types::{ExternalKind, Limits, ValueType, Var};

    const HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

    /// Assemble a module from sections.
    fn module_bytes(sections: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        for (id, body) in sections {
            bytes.push(*id);
            assert!(body.len() < 0x80, "test sections must stay short");
            bytes.push(body.len() as u8);
            bytes.extend_from_slice(body);
        }
        bytes
    }

    fn parse_ok(bytes: &[u8], features: Features) -> crate::module::Module {
        let (module, errors) = read_module(bytes, features);
        assert!(errors.is_empty(), "unexpected errors: {:#?}", errors);
        module
    }

    #[test]
    fn empty_module() {
        let module = parse_ok(&HEADER, Features::new());
        assert!(module.items.is_empty());
    }

    #[test]
    fn bad_magic_is_fatal() {
        let (_, errors) = read_module(b"\x01asm\x01\x00\x00\x00", Features::new());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Magic mismatch"));
    }

    #[test]
    fn bad_version_is_fatal() {
        let (_, errors) = read_module(b"\x00asm\x02\x00\x00\x00", Features::new());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Version mismatch"));
    }

    #[test]
    fn truncated_header() {
        let (_, errors) = read_module(b"\x00asm", Features::new());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("input too short"));
    }

    #[test]
    fn function_and_code_sections_merge() {
        // type () -> i32; one function; body: i32.const 7, end.
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x01, 0x7f]),
            (3, vec![0x01, 0x00]),
            (10, vec![0x01, 0x04, 0x00, 0x41, 0x07, 0x0b]),
        ]);
        let module = parse_ok(&bytes, Features::new());

        assert_eq!(module.types().count(), 1);
        let function = module.functions().next().unwrap();
        assert_eq!(function.type_use, Some(Var::Index(0)));
        assert!(function.locals.is_empty());
        assert_eq!(function.body.len(), 1);
        assert_eq!(function.body[0].opcode, Opcode::I32Const);
        assert_eq!(function.body[0].immediate, Immediate::S32(7));
    }

    #[test]
    fn locals_expand() {
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (3, vec![0x01, 0x00]),
            // 2 local groups: 2 x i32, 1 x i64; body: end.
            (10, vec![0x01, 0x06, 0x02, 0x02, 0x7f, 0x01, 0x7e, 0x0b]),
        ]);
        let module = parse_ok(&bytes, Features::new());
        let function = module.functions().next().unwrap();
        assert_eq!(function.locals.len(), 3);
        assert_eq!(function.locals[0].value_type, ValueType::I32);
        assert_eq!(function.locals[2].value_type, ValueType::I64);
    }

    #[test]
    fn imports() {
        // (import "m" "f" (func (type 0))) with type () -> ().
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (
                2,
                vec![0x01, 0x01, b'm', 0x01, b'f', 0x00, 0x00],
            ),
        ]);
        let module = parse_ok(&bytes, Features::new());
        let import = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Import(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(import.module, "m");
        assert_eq!(import.name, "f");
        match &import.desc {
            ImportDesc::Function { type_use, .. } => {
                assert_eq!(type_use, &Some(Var::Index(0)));
            }
            other => panic!("expected function import, got {:?}", other),
        }
    }

    #[test]
    fn invalid_utf8_import_name() {
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (2, vec![0x01, 0x01, 0xff, 0x01, b'f', 0x00, 0x00]),
        ]);
        let (_, errors) = read_module(&bytes, Features::new());
        assert!(errors.iter().any(|e| e.message == "Invalid UTF-8 encoding"));
    }

    #[test]
    fn tables_memories_globals() {
        let bytes = module_bytes(&[
            // table: funcref, min 1 max 2.
            (4, vec![0x01, 0x70, 0x01, 0x01, 0x02]),
            // memory: min 1, no max.
            (5, vec![0x01, 0x00, 0x01]),
            // global: i32 mut, init i32.const 0 end.
            (6, vec![0x01, 0x7f, 0x01, 0x41, 0x00, 0x0b]),
        ]);
        let module = parse_ok(&bytes, Features::new());

        let table = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Table(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(table.ty.limits, Limits::new(1, Some(2)));

        let memory = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Memory(m) => Some(m),
                _ => None,
            })
            .unwrap();
        assert_eq!(memory.ty.limits, Limits::new(1, None));

        let global = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Global(g) => Some(g),
                _ => None,
            })
            .unwrap();
        assert_eq!(global.init.as_ref().unwrap().instructions.len(), 1);
    }

    #[test]
    fn exports_and_start() {
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (3, vec![0x01, 0x00]),
            // export "f" func 0.
            (7, vec![0x01, 0x01, b'f', 0x00, 0x00]),
            (8, vec![0x00]),
            (10, vec![0x01, 0x02, 0x00, 0x0b]),
        ]);
        let module = parse_ok(&bytes, Features::new());
        let export = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Export(e) => Some(e),
                _ => None,
            })
            .unwrap();
        assert_eq!(export.name, "f");
        assert_eq!(export.kind, ExternalKind::Function);
        assert!(module
            .items
            .iter()
            .any(|item| matches!(item, ModuleItem::Start(_))));
    }

    #[test]
    fn element_segment_flag_forms() {
        let mut features = Features::new();
        features.enable_bulk_memory().enable_reference_types();

        // Flags 0: active, table 0, func indices.
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (3, vec![0x01, 0x00]),
            (4, vec![0x01, 0x70, 0x00, 0x01]),
            (9, vec![0x01, 0x00, 0x41, 0x00, 0x0b, 0x01, 0x00]),
            (10, vec![0x01, 0x02, 0x00, 0x0b]),
        ]);
        let module = parse_ok(&bytes, features);
        let segment = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Element(e) => Some(e),
                _ => None,
            })
            .unwrap();
        match (&segment.mode, &segment.elements) {
            (SegmentMode::Active { target: None, .. }, ElementList::Indices { vars, .. }) => {
                assert_eq!(vars, &vec![Var::Index(0)]);
            }
            other => panic!("unexpected segment: {:?}", other),
        }

        // Flags 1: passive func indices. Flags 5: passive expressions.
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (3, vec![0x01, 0x00]),
            (
                9,
                vec![
                    0x02, // two segments
                    0x01, 0x00, 0x01, 0x00, // passive, elemkind 0, [0]
                    0x05, 0x70, 0x01, 0xd0, 0x70, 0x0b, // passive, funcref, [(ref.null func)]
                ],
            ),
            (10, vec![0x01, 0x02, 0x00, 0x0b]),
        ]);
        let module = parse_ok(&bytes, features);
        let segments: Vec<_> = module
            .items
            .iter()
            .filter_map(|item| match item {
                ModuleItem::Element(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].mode, SegmentMode::Passive);
        match &segments[1].elements {
            ElementList::Expressions { exprs, .. } => {
                assert_eq!(exprs.len(), 1);
                assert_eq!(exprs[0].instructions[0].opcode, Opcode::RefNull);
            }
            other => panic!("expected expressions, got {:?}", other),
        }

        // Flags 3: declared func indices.
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (3, vec![0x01, 0x00]),
            (9, vec![0x01, 0x03, 0x00, 0x01, 0x00]),
            (10, vec![0x01, 0x02, 0x00, 0x0b]),
        ]);
        let module = parse_ok(&bytes, features);
        let segment = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Element(e) => Some(e),
                _ => None,
            })
            .unwrap();
        assert_eq!(segment.mode, SegmentMode::Declared);
    }

    #[test]
    fn element_flags_need_bulk_memory() {
        let bytes = module_bytes(&[(9, vec![0x01, 0x01, 0x00, 0x00])]);
        let (_, errors) = read_module(&bytes, Features::new());
        assert!(errors
            .iter()
            .any(|e| e.message.contains("require bulk memory")));
    }

    #[test]
    fn data_segments_and_count() {
        let mut features = Features::new();
        features.enable_bulk_memory();
        let bytes = module_bytes(&[
            (5, vec![0x01, 0x00, 0x01]),
            (12, vec![0x02]),
            (
                11,
                vec![
                    0x02, // two segments
                    0x00, 0x41, 0x00, 0x0b, 0x02, b'h', b'i', // active
                    0x01, 0x01, b'!', // passive
                ],
            ),
        ]);
        let module = parse_ok(&bytes, features);
        let segments: Vec<_> = module
            .items
            .iter()
            .filter_map(|item| match item {
                ModuleItem::Data(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].data, vec![b"hi".to_vec()]);
        assert_eq!(segments[1].mode, SegmentMode::Passive);
    }

    #[test]
    fn data_count_mismatch() {
        let mut features = Features::new();
        features.enable_bulk_memory();
        let bytes = module_bytes(&[
            (5, vec![0x01, 0x00, 0x01]),
            (12, vec![0x05]),
            (11, vec![0x01, 0x00, 0x41, 0x00, 0x0b, 0x00]),
        ]);
        let (_, errors) = read_module(&bytes, features);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("does not match data section count")));
    }

    #[test]
    fn custom_sections_are_preserved() {
        let mut body = vec![0x04];
        body.extend_from_slice(b"meta");
        body.extend_from_slice(&[1, 2, 3]);
        let bytes = module_bytes(&[(0, body)]);
        let module = parse_ok(&bytes, Features::new());
        let custom = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Custom(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(custom.name, "meta");
        assert_eq!(custom.data, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_section_id_preserved_as_blob() {
        let bytes = module_bytes(&[(42, vec![0xde, 0xad])]);
        let (module, errors) = read_module(&bytes, Features::new());
        assert!(errors.iter().any(|e| e.message == "Unknown section id: 42"));
        let custom = module
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Custom(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(custom.data, vec![0xde, 0xad]);
    }

    #[test]
    fn duplicate_section_rejected() {
        let bytes = module_bytes(&[
            (1, vec![0x00]),
            (1, vec![0x00]),
        ]);
        let (_, errors) = read_module(&bytes, Features::new());
        assert!(errors.iter().any(|e| e.message == "Duplicate type section"));
    }

    #[test]
    fn out_of_order_section_rejected() {
        let bytes = module_bytes(&[
            (3, vec![0x00]),
            (1, vec![0x00]),
        ]);
        let (_, errors) = read_module(&bytes, Features::new());
        assert!(errors
            .iter()
            .any(|e| e.message == "type section out of order"));
    }

    #[test]
    fn leb_overflow_in_type_count_skips_section() {
        // Type count encoded as six continuation bytes: LEB128 too long.
        let bytes = module_bytes(&[
            (1, vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x00]),
            (5, vec![0x01, 0x00, 0x01]),
        ]);
        let (module, errors) = read_module(&bytes, Features::new());
        assert!(errors.iter().any(|e| e.message == "LEB128 too long"));
        // The type section is skipped; the memory section still parses.
        assert_eq!(module.types().count(), 0);
        assert!(module
            .items
            .iter()
            .any(|item| matches!(item, ModuleItem::Memory(_))));
    }

    #[test]
    fn section_size_beyond_input_is_fatal() {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(&[1, 0x7f, 0x00]);
        let (_, errors) = read_module(&bytes, Features::new());
        assert!(errors
            .iter()
            .any(|e| e.message.contains("exceeds remaining module length")));
    }

    #[test]
    fn missing_code_section_reported() {
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (3, vec![0x01, 0x00]),
        ]);
        let (_, errors) = read_module(&bytes, Features::new());
        assert!(errors
            .iter()
            .any(|e| e.message.contains("Expected code section")));
    }

    #[test]
    fn function_body_error_reports_context_frame() {
        // Body contains the unassigned opcode 0x27.
        let bytes = module_bytes(&[
            (1, vec![0x01, 0x60, 0x00, 0x00]),
            (3, vec![0x01, 0x00]),
            (10, vec![0x01, 0x03, 0x00, 0x27, 0x0b]),
        ]);
        let (_, errors) = read_module(&bytes, Features::new());
        let error = errors
            .iter()
            .find(|e| e.message.contains("Unknown opcode"))
            .unwrap();
        assert!(error
            .context
            .iter()
            .any(|frame| frame.desc == "function body 0"));
        assert!(error
            .context
            .iter()
            .any(|frame| frame.desc == "code section"));
    }

    #[test]
    fn whole_input_is_consumed() {
        // Trailing garbage after the last section is a framing error, never
        // silently dropped.
        let mut bytes = module_bytes(&[(1, vec![0x00])]);
        bytes.push(0xff);
        let (_, errors) = read_module(&bytes, Features::new());
        assert!(!errors.is_empty());
    }
}
