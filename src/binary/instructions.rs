//! Instruction decoding for the binary format.
//!
//! An opcode is one byte, or a prefix byte (`0xFC`, `0xFD`, `0xFE`) followed
//! by a LEB128 sub-opcode. The pair maps through the shared opcode table,
//! which also supplies the immediate shape to decode and the features the
//! opcode needs.

use super::encoding;
use super::reader::Cursor;
use crate::error::{Error, Errors};
use crate::features::Features;
use crate::instruction::{
    BlockImmediate, BrOnExnImmediate, BrTableImmediate, CallIndirectImmediate, CopyImmediate,
    Immediate, ImmediateKind, InitImmediate, Instruction, MemArgImmediate, Opcode,
};
use crate::types::{FunctionType, FunctionTypeUse, HeapType, ValueType, Var, V128};

/// Record a cursor-level error on the sink, keeping its position.
fn sink<T>(errors: &mut Errors, result: Result<T, Error>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.on_error(e.span, e.message);
            None
        }
    }
}

fn read_value_type(
    cursor: &mut Cursor,
    features: Features,
    errors: &mut Errors,
) -> Option<ValueType> {
    let span = cursor.here();
    let byte = sink(errors, cursor.read_u8())?;
    match encoding::decode_value_type(byte) {
        Some(vt) => {
            if !features.contains(vt.required_features()) {
                errors.on_error(span, format!("value type {} not allowed", vt));
                return None;
            }
            Some(vt)
        }
        None => {
            errors.on_error(span, format!("Unknown value type: {:#04x}", byte));
            None
        }
    }
}

fn read_block_type(
    cursor: &mut Cursor,
    features: Features,
    errors: &mut Errors,
) -> Option<BlockImmediate> {
    let span = cursor.here();
    let byte = match cursor.peek_u8() {
        Some(byte) => byte,
        None => {
            errors.on_error(span, "Unable to read block type: unexpected end of input");
            return None;
        }
    };

    if byte == encoding::BLOCK_TYPE_EMPTY {
        let _ = cursor.read_u8();
        return Some(BlockImmediate::default());
    }

    if let Some(vt) = encoding::decode_value_type(byte) {
        let _ = cursor.read_u8();
        if !features.contains(vt.required_features()) {
            errors.on_error(span, format!("value type {} not allowed", vt));
            return None;
        }
        return Some(BlockImmediate {
            label: None,
            ty: FunctionTypeUse {
                type_use: None,
                ty: FunctionType::new(vec![], vec![vt]),
            },
        });
    }

    // Otherwise a signed 33-bit type index; multi-value blocks need it.
    let index = sink(errors, cursor.read_s33_leb())?;
    if index < 0 || index > u32::MAX as i64 {
        errors.on_error(span, format!("Invalid block type index {}", index));
        return None;
    }
    if !features.multi_value_enabled() {
        errors.on_error(span, "Block type index requires multi-value");
        return None;
    }
    Some(BlockImmediate {
        label: None,
        ty: FunctionTypeUse {
            type_use: Some(Var::Index(index as u32)),
            ty: FunctionType::default(),
        },
    })
}

fn read_mem_arg(cursor: &mut Cursor, errors: &mut Errors) -> Option<MemArgImmediate> {
    let span = cursor.here();
    let align_log2 = sink(errors, cursor.read_u32_leb())?;
    // The wire encodes alignment as log2(bytes); the shared AST stores the
    // byte alignment the text format writes.
    let align = match 1u32.checked_shl(align_log2) {
        Some(bytes) => bytes,
        None => {
            errors.on_error(span, format!("Alignment too large: 2^{}", align_log2));
            return None;
        }
    };
    let offset = sink(errors, cursor.read_u32_leb())?;
    Some(MemArgImmediate {
        align: Some(align),
        offset: Some(offset),
    })
}

fn read_heap_type(
    cursor: &mut Cursor,
    features: Features,
    errors: &mut Errors,
) -> Option<HeapType> {
    let span = cursor.here();
    let byte = match cursor.peek_u8() {
        Some(byte) => byte,
        None => {
            errors.on_error(span, "Unable to read heap type: unexpected end of input");
            return None;
        }
    };
    if let Some(ht) = encoding::decode_heap_kind(byte) {
        let _ = cursor.read_u8();
        return Some(ht);
    }
    let index = sink(errors, cursor.read_s33_leb())?;
    if index < 0 || index > u32::MAX as i64 || !features.function_references_enabled() {
        errors.on_error(span, format!("Unknown heap type: {:#04x}", byte));
        return None;
    }
    Some(HeapType::Index(Var::Index(index as u32)))
}

/// Decode one instruction. The cursor sits on the opcode byte.
pub(crate) fn read_instruction(
    cursor: &mut Cursor,
    features: Features,
    errors: &mut Errors,
) -> Option<Instruction> {
    let start = cursor.pos();
    let opcode_span = cursor.here();
    let byte = sink(errors, cursor.read_u8())?;

    let op = if matches!(byte, 0xfc | 0xfd | 0xfe) {
        let sub = sink(errors, cursor.read_u32_leb())?;
        match Opcode::decode(Some(byte), sub) {
            Some(op) => op,
            None => {
                errors.on_error(
                    opcode_span,
                    format!("Unknown opcode: {:#04x} {:#04x}", byte, sub),
                );
                return None;
            }
        }
    } else {
        match Opcode::decode(None, byte as u32) {
            Some(op) => op,
            None => {
                errors.on_error(opcode_span, format!("Unknown opcode: {:#04x}", byte));
                return None;
            }
        }
    };

    if !features.contains(op.required_features()) {
        errors.on_error(
            opcode_span,
            format!("{} instruction not allowed", op.mnemonic()),
        );
        return None;
    }

    let immediate = match op.immediate_kind() {
        ImmediateKind::None => match op {
            // A handful of no-immediate opcodes carry a reserved index byte.
            Opcode::MemorySize | Opcode::MemoryGrow | Opcode::MemoryFill => {
                sink(errors, cursor.read_reserved(Features::new()))?;
                Immediate::None
            }
            Opcode::AtomicFence => {
                let span = cursor.here();
                let flags = sink(errors, cursor.read_u8())?;
                if flags != 0 {
                    errors.on_error(span, format!("Invalid atomic.fence flags: {}", flags));
                    return None;
                }
                Immediate::None
            }
            _ => Immediate::None,
        },
        ImmediateKind::S32 => Immediate::S32(sink(errors, cursor.read_s32_leb())?),
        ImmediateKind::S64 => Immediate::S64(sink(errors, cursor.read_s64_leb())?),
        ImmediateKind::F32 => Immediate::F32(sink(errors, cursor.read_f32())?),
        ImmediateKind::F64 => Immediate::F64(sink(errors, cursor.read_f64())?),
        ImmediateKind::V128 => Immediate::V128(V128(sink(errors, cursor.read_v128())?)),
        ImmediateKind::Index => {
            Immediate::Index(Var::Index(sink(errors, cursor.read_u32_leb())?))
        }
        ImmediateKind::Block => Immediate::Block(read_block_type(cursor, features, errors)?),
        ImmediateKind::BrOnExn => {
            let target = Var::Index(sink(errors, cursor.read_u32_leb())?);
            let event = Var::Index(sink(errors, cursor.read_u32_leb())?);
            Immediate::BrOnExn(BrOnExnImmediate { target, event })
        }
        ImmediateKind::BrTable => {
            let count = sink(errors, cursor.read_count())?;
            let mut targets = Vec::with_capacity(count as usize);
            for _ in 0..count {
                targets.push(Var::Index(sink(errors, cursor.read_u32_leb())?));
            }
            let default_target = Var::Index(sink(errors, cursor.read_u32_leb())?);
            Immediate::BrTable(BrTableImmediate {
                targets,
                default_target,
            })
        }
        ImmediateKind::CallIndirect => {
            let type_index = sink(errors, cursor.read_u32_leb())?;
            let table = sink(errors, cursor.read_reserved(features))?;
            Immediate::CallIndirect(CallIndirectImmediate {
                table: if table != 0 {
                    Some(Var::Index(table))
                } else {
                    None
                },
                ty: FunctionTypeUse {
                    type_use: Some(Var::Index(type_index)),
                    ty: FunctionType::default(),
                },
            })
        }
        ImmediateKind::Copy => {
            let dst = sink(errors, cursor.read_reserved(features))?;
            let src = sink(errors, cursor.read_reserved(features))?;
            let wrap = |v: u32| if v != 0 { Some(Var::Index(v)) } else { None };
            Immediate::Copy(CopyImmediate {
                dst: wrap(dst),
                src: wrap(src),
            })
        }
        ImmediateKind::Init => {
            let segment = Var::Index(sink(errors, cursor.read_u32_leb())?);
            let dst = sink(errors, cursor.read_reserved(features))?;
            Immediate::Init(InitImmediate {
                segment,
                dst: if dst != 0 { Some(Var::Index(dst)) } else { None },
            })
        }
        ImmediateKind::MemArg => Immediate::MemArg(read_mem_arg(cursor, errors)?),
        ImmediateKind::HeapType => {
            Immediate::HeapType(read_heap_type(cursor, features, errors)?)
        }
        ImmediateKind::SelectTypes => {
            let count = sink(errors, cursor.read_count())?;
            let mut types = Vec::with_capacity(count as usize);
            for _ in 0..count {
                types.push(read_value_type(cursor, features, errors)?);
            }
            Immediate::SelectTypes(types)
        }
        ImmediateKind::Shuffle => Immediate::Shuffle(sink(errors, cursor.read_v128())?),
        ImmediateKind::SimdLane => Immediate::SimdLane(sink(errors, cursor.read_u8())?),
    };

    Some(Instruction::new(op, immediate, cursor.span_from(start)))
}

/// Decode instructions until the terminating `end` opcode (exclusive), as
/// used by global initializers and segment offsets.
pub(crate) fn read_constant_expression(
    cursor: &mut Cursor,
    features: Features,
    errors: &mut Errors,
) -> Option<Vec<Instruction>> {
    let mut instructions = Vec::new();
    loop {
        if cursor.peek_u8() == Some(encoding::OP_END) {
            let _ = cursor.read_u8();
            return Some(instructions);
        }
        if cursor.is_at_end() {
            errors.on_error(cursor.here(), "Unterminated constant expression");
            return None;
        }
        instructions.push(read_instruction(cursor, features, errors)?);
    }
}

/// Decode a whole function body (the cursor covers exactly the body bytes,
/// locals already consumed). The body's terminating `end` is dropped so the
/// list matches the text reader's flat form; inner block `end`s remain.
pub(crate) fn read_function_body(
    cursor: &mut Cursor,
    features: Features,
    errors: &mut Errors,
) -> Option<Vec<Instruction>> {
    let mut instructions = Vec::new();
    while !cursor.is_at_end() {
        instructions.push(read_instruction(cursor, features, errors)?);
    }
    match instructions.last() {
        Some(instruction) if instruction.opcode == Opcode::End => {
            // The body's own terminating `end` is implicit in the text
            // reader's representation; drop it for uniformity.
            instructions.pop();
            Some(instructions)
        }
        _ => {
            errors.on_error(cursor.here(), "Function body is not terminated by end");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8], features: Features) -> Result<Instruction, Vec<Error>> {
        let mut cursor = Cursor::new(bytes);
        let mut errors = Errors::new();
        match read_instruction(&mut cursor, features, &mut errors) {
            Some(instruction) if !errors.has_errors() => Ok(instruction),
            _ => Err(errors.into_vec()),
        }
    }

    #[test]
    fn plain_opcodes() {
        let nop = decode(&[0x01], Features::new()).unwrap();
        assert_eq!(nop.opcode, Opcode::Nop);
        assert_eq!(nop.immediate, Immediate::None);

        let add = decode(&[0x6a], Features::new()).unwrap();
        assert_eq!(add.opcode, Opcode::I32Add);
    }

    #[test]
    fn constants() {
        let i32c = decode(&[0x41, 0x7f], Features::new()).unwrap();
        assert_eq!(i32c.opcode, Opcode::I32Const);
        assert_eq!(i32c.immediate, Immediate::S32(-1));

        let f32c = decode(&[0x43, 0x00, 0x00, 0x80, 0x3f], Features::new()).unwrap();
        assert_eq!(f32c.immediate, Immediate::F32(1.0));
    }

    #[test]
    fn block_types() {
        let empty = decode(&[0x02, 0x40], Features::new()).unwrap();
        match empty.immediate {
            Immediate::Block(block) => assert!(block.ty.is_inline_type()),
            other => panic!("expected block, got {:?}", other),
        }

        let single = decode(&[0x02, 0x7f], Features::new()).unwrap();
        match single.immediate {
            Immediate::Block(block) => {
                assert_eq!(block.ty.ty.results, vec![ValueType::I32]);
            }
            other => panic!("expected block, got {:?}", other),
        }

        let mut features = Features::new();
        features.enable_multi_value();
        let indexed = decode(&[0x02, 0x02], features).unwrap();
        match indexed.immediate {
            Immediate::Block(block) => {
                assert_eq!(block.ty.type_use, Some(Var::Index(2)));
            }
            other => panic!("expected block, got {:?}", other),
        }

        // Without multi-value an index is rejected.
        assert!(decode(&[0x02, 0x02], Features::new()).is_err());
    }

    #[test]
    fn memarg_align_is_decoded_from_log2() {
        // Wire align 2 means a 4-byte-aligned access.
        let load = decode(&[0x28, 0x02, 0x10], Features::new()).unwrap();
        assert_eq!(
            load.immediate,
            Immediate::MemArg(MemArgImmediate {
                align: Some(4),
                offset: Some(16),
            })
        );

        // A log2 exponent past the u32 range is rejected.
        let errors = decode(&[0x28, 0x20, 0x00], Features::new()).unwrap_err();
        assert!(errors[0].message.contains("Alignment too large"));
    }

    #[test]
    fn br_table() {
        let br = decode(&[0x0e, 0x02, 0x00, 0x01, 0x02], Features::new()).unwrap();
        assert_eq!(
            br.immediate,
            Immediate::BrTable(BrTableImmediate {
                targets: vec![Var::Index(0), Var::Index(1)],
                default_target: Var::Index(2),
            })
        );
    }

    #[test]
    fn call_indirect_reserved() {
        let call = decode(&[0x11, 0x03, 0x00], Features::new()).unwrap();
        match call.immediate {
            Immediate::CallIndirect(imm) => {
                assert_eq!(imm.table, None);
                assert_eq!(imm.ty.type_use, Some(Var::Index(3)));
            }
            other => panic!("expected call_indirect, got {:?}", other),
        }

        // Nonzero reserved byte fails without reference types.
        assert!(decode(&[0x11, 0x03, 0x01], Features::new()).is_err());

        let mut features = Features::new();
        features.enable_reference_types();
        let call = decode(&[0x11, 0x03, 0x01], features).unwrap();
        match call.immediate {
            Immediate::CallIndirect(imm) => assert_eq!(imm.table, Some(Var::Index(1))),
            other => panic!("expected call_indirect, got {:?}", other),
        }
    }

    #[test]
    fn prefixed_opcodes() {
        let mut features = Features::new();
        features.enable_saturating_float_to_int();
        let trunc = decode(&[0xfc, 0x00], features).unwrap();
        assert_eq!(trunc.opcode, Opcode::I32TruncSatF32S);

        let mut features = Features::new();
        features.enable_bulk_memory();
        let copy = decode(&[0xfc, 0x0a, 0x00, 0x00], features).unwrap();
        assert_eq!(copy.opcode, Opcode::MemoryCopy);

        let mut features = Features::new();
        features.enable_simd();
        let splat = decode(&[0xfd, 0x0f], features).unwrap();
        assert_eq!(splat.opcode, Opcode::I8X16Splat);
    }

    #[test]
    fn unknown_opcodes_are_errors() {
        let errors = decode(&[0x27], Features::new()).unwrap_err();
        assert!(errors[0].message.contains("Unknown opcode"));

        let mut features = Features::new();
        features.enable_simd();
        let errors = decode(&[0xfd, 0x54], features).unwrap_err();
        assert!(errors[0].message.contains("Unknown opcode"));
    }

    #[test]
    fn feature_gating() {
        // memory.copy without bulk memory.
        let errors = decode(&[0xfc, 0x0a, 0x00, 0x00], Features::new()).unwrap_err();
        assert_eq!(errors[0].message, "memory.copy instruction not allowed");

        // Atomics without threads.
        let errors = decode(&[0xfe, 0x10, 0x02, 0x00], Features::new()).unwrap_err();
        assert_eq!(
            errors[0].message,
            "i32.atomic.load instruction not allowed"
        );
    }

    #[test]
    fn constant_expression_reads_until_end() {
        let mut cursor = Cursor::new(&[0x41, 0x2a, 0x0b, 0xff]);
        let mut errors = Errors::new();
        let instructions =
            read_constant_expression(&mut cursor, Features::new(), &mut errors).unwrap();
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].immediate, Immediate::S32(42));
        assert_eq!(cursor.pos(), 3);
        assert!(!errors.has_errors());
    }

    #[test]
    fn function_body_requires_end() {
        let mut errors = Errors::new();
        let mut cursor = Cursor::new(&[0x01, 0x0b]);
        let body = read_function_body(&mut cursor, Features::new(), &mut errors).unwrap();
        assert_eq!(body.len(), 1);

        let mut cursor = Cursor::new(&[0x01]);
        assert!(read_function_body(&mut cursor, Features::new(), &mut errors).is_none());
    }

    #[test]
    fn nested_blocks_keep_inner_ends() {
        // block (nop end) end
        let mut errors = Errors::new();
        let mut cursor = Cursor::new(&[0x02, 0x40, 0x01, 0x0b, 0x0b]);
        let body = read_function_body(&mut cursor, Features::new(), &mut errors).unwrap();
        let opcodes: Vec<Opcode> = body.iter().map(|i| i.opcode).collect();
        assert_eq!(opcodes, vec![Opcode::Block, Opcode::Nop, Opcode::End]);
    }
}
