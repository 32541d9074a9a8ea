//! End-to-end tests for the text reader.

use rstest::rstest;
use wader::features::Features;
use wader::instruction::{Immediate, Opcode};
use wader::module::{Module, ModuleItem};
use wader::text;
use wader::types::{HeapType, ReferenceType, ValueType, Var};

fn parse(source: &str) -> (Module, Vec<wader::Error>) {
    text::read_module(source, Features::new())
}

fn parse_ok(source: &str) -> Module {
    let (module, errors) = parse(source);
    assert!(errors.is_empty(), "unexpected errors: {:#?}", errors);
    module
}

fn parse_all_features(source: &str) -> Module {
    let (module, errors) = text::read_module(source, Features::all());
    assert!(errors.is_empty(), "unexpected errors: {:#?}", errors);
    module
}

#[test]
fn empty_module_has_no_items_and_no_errors() {
    let module = parse_ok("(module)");
    assert!(module.items.is_empty());
}

#[test]
fn inline_import_export_function() {
    let module = parse_ok(
        r#"(module (func $f (export "e") (import "m" "n") (param i32) (result i32)))"#,
    );
    let function = module.functions().next().unwrap();
    assert_eq!(function.name.as_deref(), Some("f"));
    assert_eq!(function.exports[0].name, "e");
    let import = function.import.as_ref().unwrap();
    assert_eq!((import.module.as_str(), import.name.as_str()), ("m", "n"));
    assert!(function.locals.is_empty() && function.body.is_empty());
    assert_eq!(function.ty.to_function_type().params, vec![ValueType::I32]);
    assert_eq!(function.ty.results, vec![ValueType::I32]);
}

#[test]
fn folded_if_instruction_order() {
    let module = parse_ok("(module (func (if (i32.const 1) (then (nop)) (else (nop)))))");
    let function = module.functions().next().unwrap();
    let opcodes: Vec<Opcode> = function.body.iter().map(|i| i.opcode).collect();
    assert_eq!(
        opcodes,
        vec![
            Opcode::I32Const,
            Opcode::If,
            Opcode::Nop,
            Opcode::Else,
            Opcode::Nop,
            Opcode::End,
        ]
    );
}

#[test]
fn duplicate_bind_keeps_function_as_anonymous() {
    let (module, errors) = parse("(module (func $a) (func $a))");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Variable $a is already bound to index 0");
    let functions: Vec<_> = module.functions().collect();
    assert_eq!(functions.len(), 2);
    assert_eq!(functions[1].name, None);
}

#[test]
fn second_start_function_rejected() {
    let (module, errors) = parse("(module (func $a) (start $a) (start $a))");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Multiple start functions");
    let starts = module
        .items
        .iter()
        .filter(|i| matches!(i, ModuleItem::Start(_)))
        .count();
    assert_eq!(starts, 1);
}

#[rstest]
#[case("(module (func (i32.const 0x100000000)))", "Invalid integer")]
#[case("(module (func (i64.const 18446744073709551616)))", "Invalid integer")]
#[case("(module (func (f32.const 1e40)))", "Invalid float")]
#[case("(module (memory 1) (func i32.const 0 i32.load align=5 drop))", "power of two")]
fn numeric_constraints(#[case] source: &str, #[case] message: &str) {
    let (_, errors) = parse(source);
    assert!(
        errors.iter().any(|e| e.message.contains(message)),
        "expected {:?} in {:#?}",
        message,
        errors
    );
}

#[rstest]
#[case("(module (func i32.const 1))", Immediate::S32(1))]
#[case("(module (func i32.const -1))", Immediate::S32(-1))]
#[case("(module (func i32.const 0xffffffff))", Immediate::S32(-1))]
#[case("(module (func i64.const -0x8000000000000000))", Immediate::S64(i64::MIN))]
#[case("(module (func f32.const 0x1.8p1))", Immediate::F32(3.0))]
#[case("(module (func f64.const -0.5))", Immediate::F64(-0.5))]
fn constant_immediates(#[case] source: &str, #[case] expected: Immediate) {
    let module = parse_ok(source);
    let function = module.functions().next().unwrap();
    assert_eq!(function.body[0].immediate, expected);
}

#[test]
fn nan_payload_is_bit_exact() {
    let module = parse_ok("(module (func f32.const nan:0x200000 f64.const -nan drop drop))");
    let function = module.functions().next().unwrap();
    match function.body[0].immediate {
        Immediate::F32(f) => assert_eq!(f.to_bits(), 0x7fa00000),
        ref other => panic!("expected f32, got {:?}", other),
    }
    match function.body[1].immediate {
        Immediate::F64(f) => assert_eq!(f.to_bits(), 0xfff8000000000000),
        ref other => panic!("expected f64, got {:?}", other),
    }
}

#[test]
fn every_module_level_name_resolves_to_an_index() {
    // Invariant: no symbolic names survive in a successfully parsed module.
    let module = parse_all_features(
        r#"(module
             (type $t (func (param i32)))
             (func $f (type $t))
             (table $tab 1 funcref)
             (memory $mem 1)
             (global $g i32 (i32.const 0))
             (export "f" (func $f))
             (export "t" (table $tab))
             (export "m" (memory $mem))
             (export "g" (global $g))
             (elem $e (table $tab) (offset i32.const 0) func $f)
             (data $d (memory $mem) (offset i32.const 0) "x")
             (start $f))"#,
    );
    for item in &module.items {
        if let ModuleItem::Export(e) = item {
            assert!(matches!(e.var, Var::Index(_)), "unresolved: {:?}", e);
        }
    }
}

#[test]
fn undefined_references_are_reported() {
    let (_, errors) = parse(r#"(module (export "f" (func $nope)))"#);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Undefined function: $nope");
}

#[test]
fn errors_recover_per_item() {
    // Three broken items, one good one: all three diagnosed.
    let (module, errors) = parse(
        "(module
           (func (i32.const))
           (start $missing)
           (func $ok)
           (frobnicate))",
    );
    assert!(errors.len() >= 3, "expected >= 3 errors, got {:#?}", errors);
    assert!(module.functions().any(|f| f.name.as_deref() == Some("ok")));
}

#[test]
fn block_with_multi_value_type_synthesizes_entry() {
    let mut features = Features::new();
    features.enable_multi_value();
    let (module, errors) = text::read_module(
        "(module (func (block (result i32 i32) i32.const 1 i32.const 2) drop drop))",
        features,
    );
    assert!(errors.is_empty(), "{:#?}", errors);
    // The multi-value block type became a real type entry.
    assert_eq!(module.types().count(), 2);
    let function = module.functions().next().unwrap();
    match &function.body[0].immediate {
        Immediate::Block(block) => {
            assert_eq!(block.ty.type_use, Some(Var::Index(1)));
        }
        other => panic!("expected block, got {:?}", other),
    }
}

#[test]
fn void_block_type_stays_inline() {
    let module = parse_ok("(module (func (block nop)))");
    assert_eq!(module.types().count(), 1); // only the function's own type
    let function = module.functions().next().unwrap();
    match &function.body[0].immediate {
        Immediate::Block(block) => assert!(block.ty.is_inline_type()),
        other => panic!("expected block, got {:?}", other),
    }
}

#[test]
fn try_catch_requires_exceptions() {
    let (_, errors) = parse("(module (func (try (do))))");
    assert!(errors
        .iter()
        .any(|e| e.message == "try instruction not allowed"));

    let mut features = Features::new();
    features.enable_exceptions();
    let (module, errors) = text::read_module(
        "(module (event $e) (func try nop catch nop end))",
        features,
    );
    assert!(errors.is_empty(), "{:#?}", errors);
    let function = module.functions().next().unwrap();
    let opcodes: Vec<Opcode> = function.body.iter().map(|i| i.opcode).collect();
    assert_eq!(
        opcodes,
        vec![
            Opcode::Try,
            Opcode::Nop,
            Opcode::Catch,
            Opcode::Nop,
            Opcode::End,
        ]
    );
}

#[test]
fn br_on_exn_resolves_label_and_event() {
    let mut features = Features::new();
    features.enable_exceptions();
    let (module, errors) = text::read_module(
        "(module (event $e (param i32))
           (func (block $l (br_on_exn $l $e) drop)))",
        features,
    );
    assert!(errors.is_empty(), "{:#?}", errors);
    let function = module.functions().next().unwrap();
    let br = function
        .body
        .iter()
        .find(|i| i.opcode == Opcode::BrOnExn)
        .unwrap();
    match &br.immediate {
        Immediate::BrOnExn(imm) => {
            assert_eq!(imm.target, Var::Index(0));
            assert_eq!(imm.event, Var::Index(0));
        }
        other => panic!("expected br_on_exn, got {:?}", other),
    }
}

#[test]
fn table_init_operand_order() {
    let mut features = Features::new();
    features.enable_bulk_memory().enable_reference_types();
    let (module, errors) = text::read_module(
        "(module (table $t 1 funcref) (func $f) (elem $e func $f)
           (func i32.const 0 i32.const 0 i32.const 1 table.init $t $e))",
        features,
    );
    assert!(errors.is_empty(), "{:#?}", errors);
    let init = module
        .functions()
        .flat_map(|f| &f.body)
        .find(|i| i.opcode == Opcode::TableInit)
        .unwrap();
    match &init.immediate {
        Immediate::Init(imm) => {
            // `table.init $t $e`: the segment is the second var.
            assert_eq!(imm.segment, Var::Index(0));
            assert_eq!(imm.dst, Some(Var::Index(0)));
        }
        other => panic!("expected init immediate, got {:?}", other),
    }
}

#[test]
fn feature_gating_is_monotone() {
    // Anything accepted under the MVP parses identically with everything on.
    let source = r#"(module
        (type (func (param i32) (result i32)))
        (func $id (type 0) local.get 0)
        (table 2 funcref)
        (memory 1)
        (global $g (mut i32) (i32.const 0))
        (export "id" (func $id))
        (elem (i32.const 0) $id)
        (data (i32.const 0) "hello")
        (start $id))"#;
    let (mvp_module, mvp_errors) = text::read_module(source, Features::new());
    let (all_module, all_errors) = text::read_module(source, Features::all());
    assert!(mvp_errors.is_empty(), "{:#?}", mvp_errors);
    assert!(all_errors.is_empty(), "{:#?}", all_errors);
    assert_eq!(mvp_module, all_module);
}

#[test]
fn simd_instructions_parse() {
    let mut features = Features::new();
    features.enable_simd();
    let (module, errors) = text::read_module(
        "(module (memory 1) (func
            i32.const 0
            v128.load
            v128.const i8x16 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
            i8x16.add
            i32x4.extract_lane 2
            drop))",
        features,
    );
    assert!(errors.is_empty(), "{:#?}", errors);
    let function = module.functions().next().unwrap();
    let lane = function
        .body
        .iter()
        .find(|i| i.opcode == Opcode::I32X4ExtractLane)
        .unwrap();
    assert_eq!(lane.immediate, Immediate::SimdLane(2));
}

#[test]
fn shuffle_lane_rejects_negative() {
    let mut features = Features::new();
    features.enable_simd();
    let (_, errors) = text::read_module(
        "(module (func
            v128.const i64x2 0 0
            v128.const i64x2 0 0
            i8x16.shuffle 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 -1
            drop))",
        features,
    );
    assert!(errors
        .iter()
        .any(|e| e.message.contains("Expected a positive integer")));
}

#[test]
fn select_result_ref_type_resolves() {
    let mut features = Features::new();
    features
        .enable_reference_types()
        .enable_function_references();
    let (module, errors) = text::read_module(
        "(module
           (type $t (func))
           (func (param i32 (ref null $t) (ref null $t)) (result (ref null $t))
             local.get 1
             local.get 2
             local.get 0
             select (result (ref null $t))))",
        features,
    );
    assert!(errors.is_empty(), "{:#?}", errors);
    let function = module.functions().next().unwrap();
    let select = function.body.last().unwrap();
    assert_eq!(select.opcode, Opcode::SelectT);
    match &select.immediate {
        Immediate::SelectTypes(types) => match &types[0] {
            ValueType::Reference(ReferenceType::Ref { heap_type, .. }) => {
                // The `$t` in the select's result list resolves like every
                // other heap-type-bearing immediate.
                assert_eq!(heap_type, &HeapType::Index(Var::Index(0)));
            }
            other => panic!("expected a typed reference, got {:?}", other),
        },
        other => panic!("expected select types, got {:?}", other),
    }
}

#[test]
fn select_result_undefined_ref_type_reported() {
    let mut features = Features::new();
    features
        .enable_reference_types()
        .enable_function_references();
    let (_, errors) = text::read_module(
        "(module (func (param i32 externref externref) (result externref)
           local.get 1
           local.get 2
           local.get 0
           select (result (ref null $missing))))",
        features,
    );
    assert!(
        errors
            .iter()
            .any(|e| e.message == "Undefined type: $missing"),
        "{:#?}",
        errors
    );
}

#[test]
fn string_escapes_decode_into_data() {
    let module = parse_ok(r#"(module (data (i32.const 0) "a\n\00\u{263a}"))"#);
    let data = module
        .items
        .iter()
        .find_map(|item| match item {
            ModuleItem::Data(d) => Some(d),
            _ => None,
        })
        .unwrap();
    let mut expected = b"a\n\0".to_vec();
    expected.extend("\u{263a}".as_bytes());
    assert_eq!(data.data, vec![expected]);
}

#[test]
fn comments_and_whitespace_are_invisible() {
    let module = parse_ok(
        "(; header ;)(module ;; trailing comment
           (func $f (; inline ;) nop))",
    );
    assert_eq!(module.functions().count(), 1);
}

#[test]
fn lexical_error_still_yields_module() {
    let (module, errors) = parse("(module (func $f)) \u{1}");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("unexpected character"));
    assert_eq!(module.functions().count(), 1);
}
