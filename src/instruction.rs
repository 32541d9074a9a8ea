//! Instructions: the opcode table and immediate payloads.
//!
//! Every opcode row records its binary encoding (an optional prefix byte plus
//! a code), its text mnemonic, the shape of its immediate, and the features
//! it requires. Both readers are driven by this one table: the lexer
//! classifies instruction keywords from it, and the binary decoder maps
//! `(prefix, code)` pairs back through it.

use crate::features::Features;
use crate::location::Span;
use crate::types::{FunctionTypeUse, HeapType, ValueType, Var, V128};
use fhex::ToHex;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// The shape of an instruction's immediate. A closed set; every opcode maps
/// to exactly one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateKind {
    None,
    S32,
    S64,
    F32,
    F64,
    V128,
    Index,
    Block,
    BrOnExn,
    BrTable,
    CallIndirect,
    Copy,
    Init,
    MemArg,
    HeapType,
    SelectTypes,
    Shuffle,
    SimdLane,
}

/// Alignment and offset for a memory access. `align` is the byte alignment
/// (a power of two); the binary encoding's log2 form is converted on read.
/// The text reader leaves absent annotations as `None`; the binary reader
/// always fills both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemArgImmediate {
    pub align: Option<u32>,
    pub offset: Option<u32>,
}

/// Label and signature of a `block`/`loop`/`if`/`try`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockImmediate {
    pub label: Option<String>,
    pub ty: FunctionTypeUse,
}

/// Branch target and event of a `br_on_exn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrOnExnImmediate {
    pub target: Var,
    pub event: Var,
}

/// Targets of a `br_table`; the last var in the text form is the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrTableImmediate {
    pub targets: Vec<Var>,
    pub default_target: Var,
}

/// Table and signature of a `call_indirect`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallIndirectImmediate {
    pub table: Option<Var>,
    pub ty: FunctionTypeUse,
}

/// Destination/source of `memory.copy`/`table.copy`. Absent vars mean
/// memory/table zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopyImmediate {
    pub dst: Option<Var>,
    pub src: Option<Var>,
}

/// Segment and destination of `memory.init`/`table.init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitImmediate {
    pub segment: Var,
    pub dst: Option<Var>,
}

/// An instruction immediate.
#[derive(Debug, Clone, PartialEq)]
pub enum Immediate {
    None,
    S32(i32),
    S64(i64),
    F32(f32),
    F64(f64),
    V128(V128),
    Index(Var),
    Block(BlockImmediate),
    BrOnExn(BrOnExnImmediate),
    BrTable(BrTableImmediate),
    CallIndirect(CallIndirectImmediate),
    Copy(CopyImmediate),
    Init(InitImmediate),
    MemArg(MemArgImmediate),
    HeapType(HeapType),
    SelectTypes(Vec<ValueType>),
    Shuffle([u8; 16]),
    SimdLane(u8),
}

/// A decoded instruction with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub immediate: Immediate,
    pub span: Span,
}

impl Instruction {
    pub fn new(opcode: Opcode, immediate: Immediate, span: Span) -> Self {
        Self {
            opcode,
            immediate,
            span,
        }
    }

    /// An instruction with no immediate.
    pub fn plain(opcode: Opcode, span: Span) -> Self {
        Self::new(opcode, Immediate::None, span)
    }
}

macro_rules! opcodes {
    ($( ($prefix:expr, $code:expr, $name:ident, $mnemonic:expr, $imm:ident, $feat:ident) ),* $(,)?) => {
        /// Every instruction this crate understands.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $( $name, )*
        }

        impl Opcode {
            /// All opcodes, in table order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// The text-format mnemonic.
            #[must_use]
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// The shape of this opcode's immediate.
            #[must_use]
            pub fn immediate_kind(self) -> ImmediateKind {
                match self {
                    $( Opcode::$name => ImmediateKind::$imm, )*
                }
            }

            /// The features that must be enabled for this opcode.
            #[must_use]
            pub fn required_features(self) -> Features {
                match self {
                    $( Opcode::$name => Features::$feat, )*
                }
            }

            /// The binary encoding: optional prefix byte plus code.
            #[must_use]
            pub fn encoding(self) -> (Option<u8>, u32) {
                match self {
                    $( Opcode::$name => ($prefix, $code), )*
                }
            }
        }
    };
}

#[rustfmt::skip]
opcodes! {
    // Control
    (None, 0x00, Unreachable, "unreachable", None, MVP),
    (None, 0x01, Nop, "nop", None, MVP),
    (None, 0x02, Block, "block", Block, MVP),
    (None, 0x03, Loop, "loop", Block, MVP),
    (None, 0x04, If, "if", Block, MVP),
    (None, 0x05, Else, "else", None, MVP),
    (None, 0x06, Try, "try", Block, EXCEPTIONS),
    (None, 0x07, Catch, "catch", None, EXCEPTIONS),
    (None, 0x08, Throw, "throw", Index, EXCEPTIONS),
    (None, 0x09, Rethrow, "rethrow", None, EXCEPTIONS),
    (None, 0x0a, BrOnExn, "br_on_exn", BrOnExn, EXCEPTIONS),
    (None, 0x0b, End, "end", None, MVP),
    (None, 0x0c, Br, "br", Index, MVP),
    (None, 0x0d, BrIf, "br_if", Index, MVP),
    (None, 0x0e, BrTable, "br_table", BrTable, MVP),
    (None, 0x0f, Return, "return", None, MVP),
    (None, 0x10, Call, "call", Index, MVP),
    (None, 0x11, CallIndirect, "call_indirect", CallIndirect, MVP),
    (None, 0x12, ReturnCall, "return_call", Index, TAIL_CALL),
    (None, 0x13, ReturnCallIndirect, "return_call_indirect", CallIndirect, TAIL_CALL),

    // Parametric
    (None, 0x1a, Drop, "drop", None, MVP),
    (None, 0x1b, Select, "select", None, MVP),
    (None, 0x1c, SelectT, "select", SelectTypes, REFERENCE_TYPES),

    // Variable
    (None, 0x20, LocalGet, "local.get", Index, MVP),
    (None, 0x21, LocalSet, "local.set", Index, MVP),
    (None, 0x22, LocalTee, "local.tee", Index, MVP),
    (None, 0x23, GlobalGet, "global.get", Index, MVP),
    (None, 0x24, GlobalSet, "global.set", Index, MVP),
    (None, 0x25, TableGet, "table.get", Index, REFERENCE_TYPES),
    (None, 0x26, TableSet, "table.set", Index, REFERENCE_TYPES),

    // Memory loads/stores
    (None, 0x28, I32Load, "i32.load", MemArg, MVP),
    (None, 0x29, I64Load, "i64.load", MemArg, MVP),
    (None, 0x2a, F32Load, "f32.load", MemArg, MVP),
    (None, 0x2b, F64Load, "f64.load", MemArg, MVP),
    (None, 0x2c, I32Load8S, "i32.load8_s", MemArg, MVP),
    (None, 0x2d, I32Load8U, "i32.load8_u", MemArg, MVP),
    (None, 0x2e, I32Load16S, "i32.load16_s", MemArg, MVP),
    (None, 0x2f, I32Load16U, "i32.load16_u", MemArg, MVP),
    (None, 0x30, I64Load8S, "i64.load8_s", MemArg, MVP),
    (None, 0x31, I64Load8U, "i64.load8_u", MemArg, MVP),
    (None, 0x32, I64Load16S, "i64.load16_s", MemArg, MVP),
    (None, 0x33, I64Load16U, "i64.load16_u", MemArg, MVP),
    (None, 0x34, I64Load32S, "i64.load32_s", MemArg, MVP),
    (None, 0x35, I64Load32U, "i64.load32_u", MemArg, MVP),
    (None, 0x36, I32Store, "i32.store", MemArg, MVP),
    (None, 0x37, I64Store, "i64.store", MemArg, MVP),
    (None, 0x38, F32Store, "f32.store", MemArg, MVP),
    (None, 0x39, F64Store, "f64.store", MemArg, MVP),
    (None, 0x3a, I32Store8, "i32.store8", MemArg, MVP),
    (None, 0x3b, I32Store16, "i32.store16", MemArg, MVP),
    (None, 0x3c, I64Store8, "i64.store8", MemArg, MVP),
    (None, 0x3d, I64Store16, "i64.store16", MemArg, MVP),
    (None, 0x3e, I64Store32, "i64.store32", MemArg, MVP),
    (None, 0x3f, MemorySize, "memory.size", None, MVP),
    (None, 0x40, MemoryGrow, "memory.grow", None, MVP),

    // Constants
    (None, 0x41, I32Const, "i32.const", S32, MVP),
    (None, 0x42, I64Const, "i64.const", S64, MVP),
    (None, 0x43, F32Const, "f32.const", F32, MVP),
    (None, 0x44, F64Const, "f64.const", F64, MVP),

    // i32 comparisons
    (None, 0x45, I32Eqz, "i32.eqz", None, MVP),
    (None, 0x46, I32Eq, "i32.eq", None, MVP),
    (None, 0x47, I32Ne, "i32.ne", None, MVP),
    (None, 0x48, I32LtS, "i32.lt_s", None, MVP),
    (None, 0x49, I32LtU, "i32.lt_u", None, MVP),
    (None, 0x4a, I32GtS, "i32.gt_s", None, MVP),
    (None, 0x4b, I32GtU, "i32.gt_u", None, MVP),
    (None, 0x4c, I32LeS, "i32.le_s", None, MVP),
    (None, 0x4d, I32LeU, "i32.le_u", None, MVP),
    (None, 0x4e, I32GeS, "i32.ge_s", None, MVP),
    (None, 0x4f, I32GeU, "i32.ge_u", None, MVP),

    // i64 comparisons
    (None, 0x50, I64Eqz, "i64.eqz", None, MVP),
    (None, 0x51, I64Eq, "i64.eq", None, MVP),
    (None, 0x52, I64Ne, "i64.ne", None, MVP),
    (None, 0x53, I64LtS, "i64.lt_s", None, MVP),
    (None, 0x54, I64LtU, "i64.lt_u", None, MVP),
    (None, 0x55, I64GtS, "i64.gt_s", None, MVP),
    (None, 0x56, I64GtU, "i64.gt_u", None, MVP),
    (None, 0x57, I64LeS, "i64.le_s", None, MVP),
    (None, 0x58, I64LeU, "i64.le_u", None, MVP),
    (None, 0x59, I64GeS, "i64.ge_s", None, MVP),
    (None, 0x5a, I64GeU, "i64.ge_u", None, MVP),

    // f32 comparisons
    (None, 0x5b, F32Eq, "f32.eq", None, MVP),
    (None, 0x5c, F32Ne, "f32.ne", None, MVP),
    (None, 0x5d, F32Lt, "f32.lt", None, MVP),
    (None, 0x5e, F32Gt, "f32.gt", None, MVP),
    (None, 0x5f, F32Le, "f32.le", None, MVP),
    (None, 0x60, F32Ge, "f32.ge", None, MVP),

    // f64 comparisons
    (None, 0x61, F64Eq, "f64.eq", None, MVP),
    (None, 0x62, F64Ne, "f64.ne", None, MVP),
    (None, 0x63, F64Lt, "f64.lt", None, MVP),
    (None, 0x64, F64Gt, "f64.gt", None, MVP),
    (None, 0x65, F64Le, "f64.le", None, MVP),
    (None, 0x66, F64Ge, "f64.ge", None, MVP),

    // i32 arithmetic
    (None, 0x67, I32Clz, "i32.clz", None, MVP),
    (None, 0x68, I32Ctz, "i32.ctz", None, MVP),
    (None, 0x69, I32Popcnt, "i32.popcnt", None, MVP),
    (None, 0x6a, I32Add, "i32.add", None, MVP),
    (None, 0x6b, I32Sub, "i32.sub", None, MVP),
    (None, 0x6c, I32Mul, "i32.mul", None, MVP),
    (None, 0x6d, I32DivS, "i32.div_s", None, MVP),
    (None, 0x6e, I32DivU, "i32.div_u", None, MVP),
    (None, 0x6f, I32RemS, "i32.rem_s", None, MVP),
    (None, 0x70, I32RemU, "i32.rem_u", None, MVP),
    (None, 0x71, I32And, "i32.and", None, MVP),
    (None, 0x72, I32Or, "i32.or", None, MVP),
    (None, 0x73, I32Xor, "i32.xor", None, MVP),
    (None, 0x74, I32Shl, "i32.shl", None, MVP),
    (None, 0x75, I32ShrS, "i32.shr_s", None, MVP),
    (None, 0x76, I32ShrU, "i32.shr_u", None, MVP),
    (None, 0x77, I32Rotl, "i32.rotl", None, MVP),
    (None, 0x78, I32Rotr, "i32.rotr", None, MVP),

    // i64 arithmetic
    (None, 0x79, I64Clz, "i64.clz", None, MVP),
    (None, 0x7a, I64Ctz, "i64.ctz", None, MVP),
    (None, 0x7b, I64Popcnt, "i64.popcnt", None, MVP),
    (None, 0x7c, I64Add, "i64.add", None, MVP),
    (None, 0x7d, I64Sub, "i64.sub", None, MVP),
    (None, 0x7e, I64Mul, "i64.mul", None, MVP),
    (None, 0x7f, I64DivS, "i64.div_s", None, MVP),
    (None, 0x80, I64DivU, "i64.div_u", None, MVP),
    (None, 0x81, I64RemS, "i64.rem_s", None, MVP),
    (None, 0x82, I64RemU, "i64.rem_u", None, MVP),
    (None, 0x83, I64And, "i64.and", None, MVP),
    (None, 0x84, I64Or, "i64.or", None, MVP),
    (None, 0x85, I64Xor, "i64.xor", None, MVP),
    (None, 0x86, I64Shl, "i64.shl", None, MVP),
    (None, 0x87, I64ShrS, "i64.shr_s", None, MVP),
    (None, 0x88, I64ShrU, "i64.shr_u", None, MVP),
    (None, 0x89, I64Rotl, "i64.rotl", None, MVP),
    (None, 0x8a, I64Rotr, "i64.rotr", None, MVP),

    // f32 arithmetic
    (None, 0x8b, F32Abs, "f32.abs", None, MVP),
    (None, 0x8c, F32Neg, "f32.neg", None, MVP),
    (None, 0x8d, F32Ceil, "f32.ceil", None, MVP),
    (None, 0x8e, F32Floor, "f32.floor", None, MVP),
    (None, 0x8f, F32Trunc, "f32.trunc", None, MVP),
    (None, 0x90, F32Nearest, "f32.nearest", None, MVP),
    (None, 0x91, F32Sqrt, "f32.sqrt", None, MVP),
    (None, 0x92, F32Add, "f32.add", None, MVP),
    (None, 0x93, F32Sub, "f32.sub", None, MVP),
    (None, 0x94, F32Mul, "f32.mul", None, MVP),
    (None, 0x95, F32Div, "f32.div", None, MVP),
    (None, 0x96, F32Min, "f32.min", None, MVP),
    (None, 0x97, F32Max, "f32.max", None, MVP),
    (None, 0x98, F32Copysign, "f32.copysign", None, MVP),

    // f64 arithmetic
    (None, 0x99, F64Abs, "f64.abs", None, MVP),
    (None, 0x9a, F64Neg, "f64.neg", None, MVP),
    (None, 0x9b, F64Ceil, "f64.ceil", None, MVP),
    (None, 0x9c, F64Floor, "f64.floor", None, MVP),
    (None, 0x9d, F64Trunc, "f64.trunc", None, MVP),
    (None, 0x9e, F64Nearest, "f64.nearest", None, MVP),
    (None, 0x9f, F64Sqrt, "f64.sqrt", None, MVP),
    (None, 0xa0, F64Add, "f64.add", None, MVP),
    (None, 0xa1, F64Sub, "f64.sub", None, MVP),
    (None, 0xa2, F64Mul, "f64.mul", None, MVP),
    (None, 0xa3, F64Div, "f64.div", None, MVP),
    (None, 0xa4, F64Min, "f64.min", None, MVP),
    (None, 0xa5, F64Max, "f64.max", None, MVP),
    (None, 0xa6, F64Copysign, "f64.copysign", None, MVP),

    // Conversions
    (None, 0xa7, I32WrapI64, "i32.wrap_i64", None, MVP),
    (None, 0xa8, I32TruncF32S, "i32.trunc_f32_s", None, MVP),
    (None, 0xa9, I32TruncF32U, "i32.trunc_f32_u", None, MVP),
    (None, 0xaa, I32TruncF64S, "i32.trunc_f64_s", None, MVP),
    (None, 0xab, I32TruncF64U, "i32.trunc_f64_u", None, MVP),
    (None, 0xac, I64ExtendI32S, "i64.extend_i32_s", None, MVP),
    (None, 0xad, I64ExtendI32U, "i64.extend_i32_u", None, MVP),
    (None, 0xae, I64TruncF32S, "i64.trunc_f32_s", None, MVP),
    (None, 0xaf, I64TruncF32U, "i64.trunc_f32_u", None, MVP),
    (None, 0xb0, I64TruncF64S, "i64.trunc_f64_s", None, MVP),
    (None, 0xb1, I64TruncF64U, "i64.trunc_f64_u", None, MVP),
    (None, 0xb2, F32ConvertI32S, "f32.convert_i32_s", None, MVP),
    (None, 0xb3, F32ConvertI32U, "f32.convert_i32_u", None, MVP),
    (None, 0xb4, F32ConvertI64S, "f32.convert_i64_s", None, MVP),
    (None, 0xb5, F32ConvertI64U, "f32.convert_i64_u", None, MVP),
    (None, 0xb6, F32DemoteF64, "f32.demote_f64", None, MVP),
    (None, 0xb7, F64ConvertI32S, "f64.convert_i32_s", None, MVP),
    (None, 0xb8, F64ConvertI32U, "f64.convert_i32_u", None, MVP),
    (None, 0xb9, F64ConvertI64S, "f64.convert_i64_s", None, MVP),
    (None, 0xba, F64ConvertI64U, "f64.convert_i64_u", None, MVP),
    (None, 0xbb, F64PromoteF32, "f64.promote_f32", None, MVP),
    (None, 0xbc, I32ReinterpretF32, "i32.reinterpret_f32", None, MVP),
    (None, 0xbd, I64ReinterpretF64, "i64.reinterpret_f64", None, MVP),
    (None, 0xbe, F32ReinterpretI32, "f32.reinterpret_i32", None, MVP),
    (None, 0xbf, F64ReinterpretI64, "f64.reinterpret_i64", None, MVP),

    // Sign extension
    (None, 0xc0, I32Extend8S, "i32.extend8_s", None, SIGN_EXTENSION),
    (None, 0xc1, I32Extend16S, "i32.extend16_s", None, SIGN_EXTENSION),
    (None, 0xc2, I64Extend8S, "i64.extend8_s", None, SIGN_EXTENSION),
    (None, 0xc3, I64Extend16S, "i64.extend16_s", None, SIGN_EXTENSION),
    (None, 0xc4, I64Extend32S, "i64.extend32_s", None, SIGN_EXTENSION),

    // References
    (None, 0xd0, RefNull, "ref.null", HeapType, REFERENCE_TYPES),
    (None, 0xd1, RefIsNull, "ref.is_null", None, REFERENCE_TYPES),
    (None, 0xd2, RefFunc, "ref.func", Index, REFERENCE_TYPES),

    // Saturating truncation (0xFC prefix)
    (Some(0xfc), 0x00, I32TruncSatF32S, "i32.trunc_sat_f32_s", None, SATURATING_FLOAT_TO_INT),
    (Some(0xfc), 0x01, I32TruncSatF32U, "i32.trunc_sat_f32_u", None, SATURATING_FLOAT_TO_INT),
    (Some(0xfc), 0x02, I32TruncSatF64S, "i32.trunc_sat_f64_s", None, SATURATING_FLOAT_TO_INT),
    (Some(0xfc), 0x03, I32TruncSatF64U, "i32.trunc_sat_f64_u", None, SATURATING_FLOAT_TO_INT),
    (Some(0xfc), 0x04, I64TruncSatF32S, "i64.trunc_sat_f32_s", None, SATURATING_FLOAT_TO_INT),
    (Some(0xfc), 0x05, I64TruncSatF32U, "i64.trunc_sat_f32_u", None, SATURATING_FLOAT_TO_INT),
    (Some(0xfc), 0x06, I64TruncSatF64S, "i64.trunc_sat_f64_s", None, SATURATING_FLOAT_TO_INT),
    (Some(0xfc), 0x07, I64TruncSatF64U, "i64.trunc_sat_f64_u", None, SATURATING_FLOAT_TO_INT),

    // Bulk memory (0xFC prefix)
    (Some(0xfc), 0x08, MemoryInit, "memory.init", Init, BULK_MEMORY),
    (Some(0xfc), 0x09, DataDrop, "data.drop", Index, BULK_MEMORY),
    (Some(0xfc), 0x0a, MemoryCopy, "memory.copy", Copy, BULK_MEMORY),
    (Some(0xfc), 0x0b, MemoryFill, "memory.fill", None, BULK_MEMORY),
    (Some(0xfc), 0x0c, TableInit, "table.init", Init, BULK_MEMORY),
    (Some(0xfc), 0x0d, ElemDrop, "elem.drop", Index, BULK_MEMORY),
    (Some(0xfc), 0x0e, TableCopy, "table.copy", Copy, BULK_MEMORY),
    (Some(0xfc), 0x0f, TableGrow, "table.grow", Index, REFERENCE_TYPES),
    (Some(0xfc), 0x10, TableSize, "table.size", Index, REFERENCE_TYPES),
    (Some(0xfc), 0x11, TableFill, "table.fill", Index, REFERENCE_TYPES),

    // SIMD (0xFD prefix)
    (Some(0xfd), 0x00, V128Load, "v128.load", MemArg, SIMD),
    (Some(0xfd), 0x01, V128Load8x8S, "v128.load8x8_s", MemArg, SIMD),
    (Some(0xfd), 0x02, V128Load8x8U, "v128.load8x8_u", MemArg, SIMD),
    (Some(0xfd), 0x03, V128Load16x4S, "v128.load16x4_s", MemArg, SIMD),
    (Some(0xfd), 0x04, V128Load16x4U, "v128.load16x4_u", MemArg, SIMD),
    (Some(0xfd), 0x05, V128Load32x2S, "v128.load32x2_s", MemArg, SIMD),
    (Some(0xfd), 0x06, V128Load32x2U, "v128.load32x2_u", MemArg, SIMD),
    (Some(0xfd), 0x07, V128Load8Splat, "v128.load8_splat", MemArg, SIMD),
    (Some(0xfd), 0x08, V128Load16Splat, "v128.load16_splat", MemArg, SIMD),
    (Some(0xfd), 0x09, V128Load32Splat, "v128.load32_splat", MemArg, SIMD),
    (Some(0xfd), 0x0a, V128Load64Splat, "v128.load64_splat", MemArg, SIMD),
    (Some(0xfd), 0x0b, V128Store, "v128.store", MemArg, SIMD),
    (Some(0xfd), 0x0c, V128Const, "v128.const", V128, SIMD),
    (Some(0xfd), 0x0d, I8X16Shuffle, "i8x16.shuffle", Shuffle, SIMD),
    (Some(0xfd), 0x0e, I8X16Swizzle, "i8x16.swizzle", None, SIMD),
    (Some(0xfd), 0x0f, I8X16Splat, "i8x16.splat", None, SIMD),
    (Some(0xfd), 0x10, I16X8Splat, "i16x8.splat", None, SIMD),
    (Some(0xfd), 0x11, I32X4Splat, "i32x4.splat", None, SIMD),
    (Some(0xfd), 0x12, I64X2Splat, "i64x2.splat", None, SIMD),
    (Some(0xfd), 0x13, F32X4Splat, "f32x4.splat", None, SIMD),
    (Some(0xfd), 0x14, F64X2Splat, "f64x2.splat", None, SIMD),
    (Some(0xfd), 0x15, I8X16ExtractLaneS, "i8x16.extract_lane_s", SimdLane, SIMD),
    (Some(0xfd), 0x16, I8X16ExtractLaneU, "i8x16.extract_lane_u", SimdLane, SIMD),
    (Some(0xfd), 0x17, I8X16ReplaceLane, "i8x16.replace_lane", SimdLane, SIMD),
    (Some(0xfd), 0x18, I16X8ExtractLaneS, "i16x8.extract_lane_s", SimdLane, SIMD),
    (Some(0xfd), 0x19, I16X8ExtractLaneU, "i16x8.extract_lane_u", SimdLane, SIMD),
    (Some(0xfd), 0x1a, I16X8ReplaceLane, "i16x8.replace_lane", SimdLane, SIMD),
    (Some(0xfd), 0x1b, I32X4ExtractLane, "i32x4.extract_lane", SimdLane, SIMD),
    (Some(0xfd), 0x1c, I32X4ReplaceLane, "i32x4.replace_lane", SimdLane, SIMD),
    (Some(0xfd), 0x1d, I64X2ExtractLane, "i64x2.extract_lane", SimdLane, SIMD),
    (Some(0xfd), 0x1e, I64X2ReplaceLane, "i64x2.replace_lane", SimdLane, SIMD),
    (Some(0xfd), 0x1f, F32X4ExtractLane, "f32x4.extract_lane", SimdLane, SIMD),
    (Some(0xfd), 0x20, F32X4ReplaceLane, "f32x4.replace_lane", SimdLane, SIMD),
    (Some(0xfd), 0x21, F64X2ExtractLane, "f64x2.extract_lane", SimdLane, SIMD),
    (Some(0xfd), 0x22, F64X2ReplaceLane, "f64x2.replace_lane", SimdLane, SIMD),
    (Some(0xfd), 0x23, I8X16Eq, "i8x16.eq", None, SIMD),
    (Some(0xfd), 0x24, I8X16Ne, "i8x16.ne", None, SIMD),
    (Some(0xfd), 0x25, I8X16LtS, "i8x16.lt_s", None, SIMD),
    (Some(0xfd), 0x26, I8X16LtU, "i8x16.lt_u", None, SIMD),
    (Some(0xfd), 0x27, I8X16GtS, "i8x16.gt_s", None, SIMD),
    (Some(0xfd), 0x28, I8X16GtU, "i8x16.gt_u", None, SIMD),
    (Some(0xfd), 0x29, I8X16LeS, "i8x16.le_s", None, SIMD),
    (Some(0xfd), 0x2a, I8X16LeU, "i8x16.le_u", None, SIMD),
    (Some(0xfd), 0x2b, I8X16GeS, "i8x16.ge_s", None, SIMD),
    (Some(0xfd), 0x2c, I8X16GeU, "i8x16.ge_u", None, SIMD),
    (Some(0xfd), 0x2d, I16X8Eq, "i16x8.eq", None, SIMD),
    (Some(0xfd), 0x2e, I16X8Ne, "i16x8.ne", None, SIMD),
    (Some(0xfd), 0x2f, I16X8LtS, "i16x8.lt_s", None, SIMD),
    (Some(0xfd), 0x30, I16X8LtU, "i16x8.lt_u", None, SIMD),
    (Some(0xfd), 0x31, I16X8GtS, "i16x8.gt_s", None, SIMD),
    (Some(0xfd), 0x32, I16X8GtU, "i16x8.gt_u", None, SIMD),
    (Some(0xfd), 0x33, I16X8LeS, "i16x8.le_s", None, SIMD),
    (Some(0xfd), 0x34, I16X8LeU, "i16x8.le_u", None, SIMD),
    (Some(0xfd), 0x35, I16X8GeS, "i16x8.ge_s", None, SIMD),
    (Some(0xfd), 0x36, I16X8GeU, "i16x8.ge_u", None, SIMD),
    (Some(0xfd), 0x37, I32X4Eq, "i32x4.eq", None, SIMD),
    (Some(0xfd), 0x38, I32X4Ne, "i32x4.ne", None, SIMD),
    (Some(0xfd), 0x39, I32X4LtS, "i32x4.lt_s", None, SIMD),
    (Some(0xfd), 0x3a, I32X4LtU, "i32x4.lt_u", None, SIMD),
    (Some(0xfd), 0x3b, I32X4GtS, "i32x4.gt_s", None, SIMD),
    (Some(0xfd), 0x3c, I32X4GtU, "i32x4.gt_u", None, SIMD),
    (Some(0xfd), 0x3d, I32X4LeS, "i32x4.le_s", None, SIMD),
    (Some(0xfd), 0x3e, I32X4LeU, "i32x4.le_u", None, SIMD),
    (Some(0xfd), 0x3f, I32X4GeS, "i32x4.ge_s", None, SIMD),
    (Some(0xfd), 0x40, I32X4GeU, "i32x4.ge_u", None, SIMD),
    (Some(0xfd), 0x41, F32X4Eq, "f32x4.eq", None, SIMD),
    (Some(0xfd), 0x42, F32X4Ne, "f32x4.ne", None, SIMD),
    (Some(0xfd), 0x43, F32X4Lt, "f32x4.lt", None, SIMD),
    (Some(0xfd), 0x44, F32X4Gt, "f32x4.gt", None, SIMD),
    (Some(0xfd), 0x45, F32X4Le, "f32x4.le", None, SIMD),
    (Some(0xfd), 0x46, F32X4Ge, "f32x4.ge", None, SIMD),
    (Some(0xfd), 0x47, F64X2Eq, "f64x2.eq", None, SIMD),
    (Some(0xfd), 0x48, F64X2Ne, "f64x2.ne", None, SIMD),
    (Some(0xfd), 0x49, F64X2Lt, "f64x2.lt", None, SIMD),
    (Some(0xfd), 0x4a, F64X2Gt, "f64x2.gt", None, SIMD),
    (Some(0xfd), 0x4b, F64X2Le, "f64x2.le", None, SIMD),
    (Some(0xfd), 0x4c, F64X2Ge, "f64x2.ge", None, SIMD),
    (Some(0xfd), 0x4d, V128Not, "v128.not", None, SIMD),
    (Some(0xfd), 0x4e, V128And, "v128.and", None, SIMD),
    (Some(0xfd), 0x4f, V128Andnot, "v128.andnot", None, SIMD),
    (Some(0xfd), 0x50, V128Or, "v128.or", None, SIMD),
    (Some(0xfd), 0x51, V128Xor, "v128.xor", None, SIMD),
    (Some(0xfd), 0x52, V128Bitselect, "v128.bitselect", None, SIMD),
    (Some(0xfd), 0x53, V128AnyTrue, "v128.any_true", None, SIMD),
    (Some(0xfd), 0x5c, V128Load32Zero, "v128.load32_zero", MemArg, SIMD),
    (Some(0xfd), 0x5d, V128Load64Zero, "v128.load64_zero", MemArg, SIMD),
    (Some(0xfd), 0x5e, F32X4DemoteF64X2Zero, "f32x4.demote_f64x2_zero", None, SIMD),
    (Some(0xfd), 0x5f, F64X2PromoteLowF32X4, "f64x2.promote_low_f32x4", None, SIMD),
    (Some(0xfd), 0x60, I8X16Abs, "i8x16.abs", None, SIMD),
    (Some(0xfd), 0x61, I8X16Neg, "i8x16.neg", None, SIMD),
    (Some(0xfd), 0x62, I8X16Popcnt, "i8x16.popcnt", None, SIMD),
    (Some(0xfd), 0x63, I8X16AllTrue, "i8x16.all_true", None, SIMD),
    (Some(0xfd), 0x64, I8X16Bitmask, "i8x16.bitmask", None, SIMD),
    (Some(0xfd), 0x65, I8X16NarrowI16X8S, "i8x16.narrow_i16x8_s", None, SIMD),
    (Some(0xfd), 0x66, I8X16NarrowI16X8U, "i8x16.narrow_i16x8_u", None, SIMD),
    (Some(0xfd), 0x67, F32X4Ceil, "f32x4.ceil", None, SIMD),
    (Some(0xfd), 0x68, F32X4Floor, "f32x4.floor", None, SIMD),
    (Some(0xfd), 0x69, F32X4Trunc, "f32x4.trunc", None, SIMD),
    (Some(0xfd), 0x6a, F32X4Nearest, "f32x4.nearest", None, SIMD),
    (Some(0xfd), 0x6b, I8X16Shl, "i8x16.shl", None, SIMD),
    (Some(0xfd), 0x6c, I8X16ShrS, "i8x16.shr_s", None, SIMD),
    (Some(0xfd), 0x6d, I8X16ShrU, "i8x16.shr_u", None, SIMD),
    (Some(0xfd), 0x6e, I8X16Add, "i8x16.add", None, SIMD),
    (Some(0xfd), 0x6f, I8X16AddSatS, "i8x16.add_sat_s", None, SIMD),
    (Some(0xfd), 0x70, I8X16AddSatU, "i8x16.add_sat_u", None, SIMD),
    (Some(0xfd), 0x71, I8X16Sub, "i8x16.sub", None, SIMD),
    (Some(0xfd), 0x72, I8X16SubSatS, "i8x16.sub_sat_s", None, SIMD),
    (Some(0xfd), 0x73, I8X16SubSatU, "i8x16.sub_sat_u", None, SIMD),
    (Some(0xfd), 0x74, F64X2Ceil, "f64x2.ceil", None, SIMD),
    (Some(0xfd), 0x75, F64X2Floor, "f64x2.floor", None, SIMD),
    (Some(0xfd), 0x76, I8X16MinS, "i8x16.min_s", None, SIMD),
    (Some(0xfd), 0x77, I8X16MinU, "i8x16.min_u", None, SIMD),
    (Some(0xfd), 0x78, I8X16MaxS, "i8x16.max_s", None, SIMD),
    (Some(0xfd), 0x79, I8X16MaxU, "i8x16.max_u", None, SIMD),
    (Some(0xfd), 0x7a, F64X2Trunc, "f64x2.trunc", None, SIMD),
    (Some(0xfd), 0x7b, I8X16AvgrU, "i8x16.avgr_u", None, SIMD),
    (Some(0xfd), 0x7c, I16X8ExtaddPairwiseI8X16S, "i16x8.extadd_pairwise_i8x16_s", None, SIMD),
    (Some(0xfd), 0x7d, I16X8ExtaddPairwiseI8X16U, "i16x8.extadd_pairwise_i8x16_u", None, SIMD),
    (Some(0xfd), 0x7e, I32X4ExtaddPairwiseI16X8S, "i32x4.extadd_pairwise_i16x8_s", None, SIMD),
    (Some(0xfd), 0x7f, I32X4ExtaddPairwiseI16X8U, "i32x4.extadd_pairwise_i16x8_u", None, SIMD),
    (Some(0xfd), 0x80, I16X8Abs, "i16x8.abs", None, SIMD),
    (Some(0xfd), 0x81, I16X8Neg, "i16x8.neg", None, SIMD),
    (Some(0xfd), 0x82, I16X8Q15mulrSatS, "i16x8.q15mulr_sat_s", None, SIMD),
    (Some(0xfd), 0x83, I16X8AllTrue, "i16x8.all_true", None, SIMD),
    (Some(0xfd), 0x84, I16X8Bitmask, "i16x8.bitmask", None, SIMD),
    (Some(0xfd), 0x85, I16X8NarrowI32X4S, "i16x8.narrow_i32x4_s", None, SIMD),
    (Some(0xfd), 0x86, I16X8NarrowI32X4U, "i16x8.narrow_i32x4_u", None, SIMD),
    (Some(0xfd), 0x87, I16X8ExtendLowI8X16S, "i16x8.extend_low_i8x16_s", None, SIMD),
    (Some(0xfd), 0x88, I16X8ExtendHighI8X16S, "i16x8.extend_high_i8x16_s", None, SIMD),
    (Some(0xfd), 0x89, I16X8ExtendLowI8X16U, "i16x8.extend_low_i8x16_u", None, SIMD),
    (Some(0xfd), 0x8a, I16X8ExtendHighI8X16U, "i16x8.extend_high_i8x16_u", None, SIMD),
    (Some(0xfd), 0x8b, I16X8Shl, "i16x8.shl", None, SIMD),
    (Some(0xfd), 0x8c, I16X8ShrS, "i16x8.shr_s", None, SIMD),
    (Some(0xfd), 0x8d, I16X8ShrU, "i16x8.shr_u", None, SIMD),
    (Some(0xfd), 0x8e, I16X8Add, "i16x8.add", None, SIMD),
    (Some(0xfd), 0x8f, I16X8AddSatS, "i16x8.add_sat_s", None, SIMD),
    (Some(0xfd), 0x90, I16X8AddSatU, "i16x8.add_sat_u", None, SIMD),
    (Some(0xfd), 0x91, I16X8Sub, "i16x8.sub", None, SIMD),
    (Some(0xfd), 0x92, I16X8SubSatS, "i16x8.sub_sat_s", None, SIMD),
    (Some(0xfd), 0x93, I16X8SubSatU, "i16x8.sub_sat_u", None, SIMD),
    (Some(0xfd), 0x94, F64X2Nearest, "f64x2.nearest", None, SIMD),
    (Some(0xfd), 0x95, I16X8Mul, "i16x8.mul", None, SIMD),
    (Some(0xfd), 0x96, I16X8MinS, "i16x8.min_s", None, SIMD),
    (Some(0xfd), 0x97, I16X8MinU, "i16x8.min_u", None, SIMD),
    (Some(0xfd), 0x98, I16X8MaxS, "i16x8.max_s", None, SIMD),
    (Some(0xfd), 0x99, I16X8MaxU, "i16x8.max_u", None, SIMD),
    (Some(0xfd), 0x9b, I16X8AvgrU, "i16x8.avgr_u", None, SIMD),
    (Some(0xfd), 0x9c, I16X8ExtmulLowI8X16S, "i16x8.extmul_low_i8x16_s", None, SIMD),
    (Some(0xfd), 0x9d, I16X8ExtmulHighI8X16S, "i16x8.extmul_high_i8x16_s", None, SIMD),
    (Some(0xfd), 0x9e, I16X8ExtmulLowI8X16U, "i16x8.extmul_low_i8x16_u", None, SIMD),
    (Some(0xfd), 0x9f, I16X8ExtmulHighI8X16U, "i16x8.extmul_high_i8x16_u", None, SIMD),
    (Some(0xfd), 0xa0, I32X4Abs, "i32x4.abs", None, SIMD),
    (Some(0xfd), 0xa1, I32X4Neg, "i32x4.neg", None, SIMD),
    (Some(0xfd), 0xa3, I32X4AllTrue, "i32x4.all_true", None, SIMD),
    (Some(0xfd), 0xa4, I32X4Bitmask, "i32x4.bitmask", None, SIMD),
    (Some(0xfd), 0xa7, I32X4ExtendLowI16X8S, "i32x4.extend_low_i16x8_s", None, SIMD),
    (Some(0xfd), 0xa8, I32X4ExtendHighI16X8S, "i32x4.extend_high_i16x8_s", None, SIMD),
    (Some(0xfd), 0xa9, I32X4ExtendLowI16X8U, "i32x4.extend_low_i16x8_u", None, SIMD),
    (Some(0xfd), 0xaa, I32X4ExtendHighI16X8U, "i32x4.extend_high_i16x8_u", None, SIMD),
    (Some(0xfd), 0xab, I32X4Shl, "i32x4.shl", None, SIMD),
    (Some(0xfd), 0xac, I32X4ShrS, "i32x4.shr_s", None, SIMD),
    (Some(0xfd), 0xad, I32X4ShrU, "i32x4.shr_u", None, SIMD),
    (Some(0xfd), 0xae, I32X4Add, "i32x4.add", None, SIMD),
    (Some(0xfd), 0xb1, I32X4Sub, "i32x4.sub", None, SIMD),
    (Some(0xfd), 0xb5, I32X4Mul, "i32x4.mul", None, SIMD),
    (Some(0xfd), 0xb6, I32X4MinS, "i32x4.min_s", None, SIMD),
    (Some(0xfd), 0xb7, I32X4MinU, "i32x4.min_u", None, SIMD),
    (Some(0xfd), 0xb8, I32X4MaxS, "i32x4.max_s", None, SIMD),
    (Some(0xfd), 0xb9, I32X4MaxU, "i32x4.max_u", None, SIMD),
    (Some(0xfd), 0xba, I32X4DotI16X8S, "i32x4.dot_i16x8_s", None, SIMD),
    (Some(0xfd), 0xbc, I32X4ExtmulLowI16X8S, "i32x4.extmul_low_i16x8_s", None, SIMD),
    (Some(0xfd), 0xbd, I32X4ExtmulHighI16X8S, "i32x4.extmul_high_i16x8_s", None, SIMD),
    (Some(0xfd), 0xbe, I32X4ExtmulLowI16X8U, "i32x4.extmul_low_i16x8_u", None, SIMD),
    (Some(0xfd), 0xbf, I32X4ExtmulHighI16X8U, "i32x4.extmul_high_i16x8_u", None, SIMD),
    (Some(0xfd), 0xc0, I64X2Abs, "i64x2.abs", None, SIMD),
    (Some(0xfd), 0xc1, I64X2Neg, "i64x2.neg", None, SIMD),
    (Some(0xfd), 0xc3, I64X2AllTrue, "i64x2.all_true", None, SIMD),
    (Some(0xfd), 0xc4, I64X2Bitmask, "i64x2.bitmask", None, SIMD),
    (Some(0xfd), 0xc7, I64X2ExtendLowI32X4S, "i64x2.extend_low_i32x4_s", None, SIMD),
    (Some(0xfd), 0xc8, I64X2ExtendHighI32X4S, "i64x2.extend_high_i32x4_s", None, SIMD),
    (Some(0xfd), 0xc9, I64X2ExtendLowI32X4U, "i64x2.extend_low_i32x4_u", None, SIMD),
    (Some(0xfd), 0xca, I64X2ExtendHighI32X4U, "i64x2.extend_high_i32x4_u", None, SIMD),
    (Some(0xfd), 0xcb, I64X2Shl, "i64x2.shl", None, SIMD),
    (Some(0xfd), 0xcc, I64X2ShrS, "i64x2.shr_s", None, SIMD),
    (Some(0xfd), 0xcd, I64X2ShrU, "i64x2.shr_u", None, SIMD),
    (Some(0xfd), 0xce, I64X2Add, "i64x2.add", None, SIMD),
    (Some(0xfd), 0xd1, I64X2Sub, "i64x2.sub", None, SIMD),
    (Some(0xfd), 0xd5, I64X2Mul, "i64x2.mul", None, SIMD),
    (Some(0xfd), 0xd6, I64X2Eq, "i64x2.eq", None, SIMD),
    (Some(0xfd), 0xd7, I64X2Ne, "i64x2.ne", None, SIMD),
    (Some(0xfd), 0xd8, I64X2LtS, "i64x2.lt_s", None, SIMD),
    (Some(0xfd), 0xd9, I64X2GtS, "i64x2.gt_s", None, SIMD),
    (Some(0xfd), 0xda, I64X2LeS, "i64x2.le_s", None, SIMD),
    (Some(0xfd), 0xdb, I64X2GeS, "i64x2.ge_s", None, SIMD),
    (Some(0xfd), 0xdc, I64X2ExtmulLowI32X4S, "i64x2.extmul_low_i32x4_s", None, SIMD),
    (Some(0xfd), 0xdd, I64X2ExtmulHighI32X4S, "i64x2.extmul_high_i32x4_s", None, SIMD),
    (Some(0xfd), 0xde, I64X2ExtmulLowI32X4U, "i64x2.extmul_low_i32x4_u", None, SIMD),
    (Some(0xfd), 0xdf, I64X2ExtmulHighI32X4U, "i64x2.extmul_high_i32x4_u", None, SIMD),
    (Some(0xfd), 0xe0, F32X4Abs, "f32x4.abs", None, SIMD),
    (Some(0xfd), 0xe1, F32X4Neg, "f32x4.neg", None, SIMD),
    (Some(0xfd), 0xe3, F32X4Sqrt, "f32x4.sqrt", None, SIMD),
    (Some(0xfd), 0xe4, F32X4Add, "f32x4.add", None, SIMD),
    (Some(0xfd), 0xe5, F32X4Sub, "f32x4.sub", None, SIMD),
    (Some(0xfd), 0xe6, F32X4Mul, "f32x4.mul", None, SIMD),
    (Some(0xfd), 0xe7, F32X4Div, "f32x4.div", None, SIMD),
    (Some(0xfd), 0xe8, F32X4Min, "f32x4.min", None, SIMD),
    (Some(0xfd), 0xe9, F32X4Max, "f32x4.max", None, SIMD),
    (Some(0xfd), 0xea, F32X4Pmin, "f32x4.pmin", None, SIMD),
    (Some(0xfd), 0xeb, F32X4Pmax, "f32x4.pmax", None, SIMD),
    (Some(0xfd), 0xec, F64X2Abs, "f64x2.abs", None, SIMD),
    (Some(0xfd), 0xed, F64X2Neg, "f64x2.neg", None, SIMD),
    (Some(0xfd), 0xef, F64X2Sqrt, "f64x2.sqrt", None, SIMD),
    (Some(0xfd), 0xf0, F64X2Add, "f64x2.add", None, SIMD),
    (Some(0xfd), 0xf1, F64X2Sub, "f64x2.sub", None, SIMD),
    (Some(0xfd), 0xf2, F64X2Mul, "f64x2.mul", None, SIMD),
    (Some(0xfd), 0xf3, F64X2Div, "f64x2.div", None, SIMD),
    (Some(0xfd), 0xf4, F64X2Min, "f64x2.min", None, SIMD),
    (Some(0xfd), 0xf5, F64X2Max, "f64x2.max", None, SIMD),
    (Some(0xfd), 0xf6, F64X2Pmin, "f64x2.pmin", None, SIMD),
    (Some(0xfd), 0xf7, F64X2Pmax, "f64x2.pmax", None, SIMD),
    (Some(0xfd), 0xf8, I32X4TruncSatF32X4S, "i32x4.trunc_sat_f32x4_s", None, SIMD),
    (Some(0xfd), 0xf9, I32X4TruncSatF32X4U, "i32x4.trunc_sat_f32x4_u", None, SIMD),
    (Some(0xfd), 0xfa, F32X4ConvertI32X4S, "f32x4.convert_i32x4_s", None, SIMD),
    (Some(0xfd), 0xfb, F32X4ConvertI32X4U, "f32x4.convert_i32x4_u", None, SIMD),
    (Some(0xfd), 0xfc, I32X4TruncSatF64X2SZero, "i32x4.trunc_sat_f64x2_s_zero", None, SIMD),
    (Some(0xfd), 0xfd, I32X4TruncSatF64X2UZero, "i32x4.trunc_sat_f64x2_u_zero", None, SIMD),
    (Some(0xfd), 0xfe, F64X2ConvertLowI32X4S, "f64x2.convert_low_i32x4_s", None, SIMD),
    (Some(0xfd), 0xff, F64X2ConvertLowI32X4U, "f64x2.convert_low_i32x4_u", None, SIMD),

    // Threads (0xFE prefix)
    (Some(0xfe), 0x00, MemoryAtomicNotify, "memory.atomic.notify", MemArg, THREADS),
    (Some(0xfe), 0x01, MemoryAtomicWait32, "memory.atomic.wait32", MemArg, THREADS),
    (Some(0xfe), 0x02, MemoryAtomicWait64, "memory.atomic.wait64", MemArg, THREADS),
    (Some(0xfe), 0x03, AtomicFence, "atomic.fence", None, THREADS),
    (Some(0xfe), 0x10, I32AtomicLoad, "i32.atomic.load", MemArg, THREADS),
    (Some(0xfe), 0x11, I64AtomicLoad, "i64.atomic.load", MemArg, THREADS),
    (Some(0xfe), 0x12, I32AtomicLoad8U, "i32.atomic.load8_u", MemArg, THREADS),
    (Some(0xfe), 0x13, I32AtomicLoad16U, "i32.atomic.load16_u", MemArg, THREADS),
    (Some(0xfe), 0x14, I64AtomicLoad8U, "i64.atomic.load8_u", MemArg, THREADS),
    (Some(0xfe), 0x15, I64AtomicLoad16U, "i64.atomic.load16_u", MemArg, THREADS),
    (Some(0xfe), 0x16, I64AtomicLoad32U, "i64.atomic.load32_u", MemArg, THREADS),
    (Some(0xfe), 0x17, I32AtomicStore, "i32.atomic.store", MemArg, THREADS),
    (Some(0xfe), 0x18, I64AtomicStore, "i64.atomic.store", MemArg, THREADS),
    (Some(0xfe), 0x19, I32AtomicStore8, "i32.atomic.store8", MemArg, THREADS),
    (Some(0xfe), 0x1a, I32AtomicStore16, "i32.atomic.store16", MemArg, THREADS),
    (Some(0xfe), 0x1b, I64AtomicStore8, "i64.atomic.store8", MemArg, THREADS),
    (Some(0xfe), 0x1c, I64AtomicStore16, "i64.atomic.store16", MemArg, THREADS),
    (Some(0xfe), 0x1d, I64AtomicStore32, "i64.atomic.store32", MemArg, THREADS),
    (Some(0xfe), 0x1e, I32AtomicRmwAdd, "i32.atomic.rmw.add", MemArg, THREADS),
    (Some(0xfe), 0x1f, I64AtomicRmwAdd, "i64.atomic.rmw.add", MemArg, THREADS),
    (Some(0xfe), 0x20, I32AtomicRmw8AddU, "i32.atomic.rmw8.add_u", MemArg, THREADS),
    (Some(0xfe), 0x21, I32AtomicRmw16AddU, "i32.atomic.rmw16.add_u", MemArg, THREADS),
    (Some(0xfe), 0x22, I64AtomicRmw8AddU, "i64.atomic.rmw8.add_u", MemArg, THREADS),
    (Some(0xfe), 0x23, I64AtomicRmw16AddU, "i64.atomic.rmw16.add_u", MemArg, THREADS),
    (Some(0xfe), 0x24, I64AtomicRmw32AddU, "i64.atomic.rmw32.add_u", MemArg, THREADS),
    (Some(0xfe), 0x25, I32AtomicRmwSub, "i32.atomic.rmw.sub", MemArg, THREADS),
    (Some(0xfe), 0x26, I64AtomicRmwSub, "i64.atomic.rmw.sub", MemArg, THREADS),
    (Some(0xfe), 0x27, I32AtomicRmw8SubU, "i32.atomic.rmw8.sub_u", MemArg, THREADS),
    (Some(0xfe), 0x28, I32AtomicRmw16SubU, "i32.atomic.rmw16.sub_u", MemArg, THREADS),
    (Some(0xfe), 0x29, I64AtomicRmw8SubU, "i64.atomic.rmw8.sub_u", MemArg, THREADS),
    (Some(0xfe), 0x2a, I64AtomicRmw16SubU, "i64.atomic.rmw16.sub_u", MemArg, THREADS),
    (Some(0xfe), 0x2b, I64AtomicRmw32SubU, "i64.atomic.rmw32.sub_u", MemArg, THREADS),
    (Some(0xfe), 0x2c, I32AtomicRmwAnd, "i32.atomic.rmw.and", MemArg, THREADS),
    (Some(0xfe), 0x2d, I64AtomicRmwAnd, "i64.atomic.rmw.and", MemArg, THREADS),
    (Some(0xfe), 0x2e, I32AtomicRmw8AndU, "i32.atomic.rmw8.and_u", MemArg, THREADS),
    (Some(0xfe), 0x2f, I32AtomicRmw16AndU, "i32.atomic.rmw16.and_u", MemArg, THREADS),
    (Some(0xfe), 0x30, I64AtomicRmw8AndU, "i64.atomic.rmw8.and_u", MemArg, THREADS),
    (Some(0xfe), 0x31, I64AtomicRmw16AndU, "i64.atomic.rmw16.and_u", MemArg, THREADS),
    (Some(0xfe), 0x32, I64AtomicRmw32AndU, "i64.atomic.rmw32.and_u", MemArg, THREADS),
    (Some(0xfe), 0x33, I32AtomicRmwOr, "i32.atomic.rmw.or", MemArg, THREADS),
    (Some(0xfe), 0x34, I64AtomicRmwOr, "i64.atomic.rmw.or", MemArg, THREADS),
    (Some(0xfe), 0x35, I32AtomicRmw8OrU, "i32.atomic.rmw8.or_u", MemArg, THREADS),
    (Some(0xfe), 0x36, I32AtomicRmw16OrU, "i32.atomic.rmw16.or_u", MemArg, THREADS),
    (Some(0xfe), 0x37, I64AtomicRmw8OrU, "i64.atomic.rmw8.or_u", MemArg, THREADS),
    (Some(0xfe), 0x38, I64AtomicRmw16OrU, "i64.atomic.rmw16.or_u", MemArg, THREADS),
    (Some(0xfe), 0x39, I64AtomicRmw32OrU, "i64.atomic.rmw32.or_u", MemArg, THREADS),
    (Some(0xfe), 0x3a, I32AtomicRmwXor, "i32.atomic.rmw.xor", MemArg, THREADS),
    (Some(0xfe), 0x3b, I64AtomicRmwXor, "i64.atomic.rmw.xor", MemArg, THREADS),
    (Some(0xfe), 0x3c, I32AtomicRmw8XorU, "i32.atomic.rmw8.xor_u", MemArg, THREADS),
    (Some(0xfe), 0x3d, I32AtomicRmw16XorU, "i32.atomic.rmw16.xor_u", MemArg, THREADS),
    (Some(0xfe), 0x3e, I64AtomicRmw8XorU, "i64.atomic.rmw8.xor_u", MemArg, THREADS),
    (Some(0xfe), 0x3f, I64AtomicRmw16XorU, "i64.atomic.rmw16.xor_u", MemArg, THREADS),
    (Some(0xfe), 0x40, I64AtomicRmw32XorU, "i64.atomic.rmw32.xor_u", MemArg, THREADS),
    (Some(0xfe), 0x41, I32AtomicRmwXchg, "i32.atomic.rmw.xchg", MemArg, THREADS),
    (Some(0xfe), 0x42, I64AtomicRmwXchg, "i64.atomic.rmw.xchg", MemArg, THREADS),
    (Some(0xfe), 0x43, I32AtomicRmw8XchgU, "i32.atomic.rmw8.xchg_u", MemArg, THREADS),
    (Some(0xfe), 0x44, I32AtomicRmw16XchgU, "i32.atomic.rmw16.xchg_u", MemArg, THREADS),
    (Some(0xfe), 0x45, I64AtomicRmw8XchgU, "i64.atomic.rmw8.xchg_u", MemArg, THREADS),
    (Some(0xfe), 0x46, I64AtomicRmw16XchgU, "i64.atomic.rmw16.xchg_u", MemArg, THREADS),
    (Some(0xfe), 0x47, I64AtomicRmw32XchgU, "i64.atomic.rmw32.xchg_u", MemArg, THREADS),
    (Some(0xfe), 0x48, I32AtomicRmwCmpxchg, "i32.atomic.rmw.cmpxchg", MemArg, THREADS),
    (Some(0xfe), 0x49, I64AtomicRmwCmpxchg, "i64.atomic.rmw.cmpxchg", MemArg, THREADS),
    (Some(0xfe), 0x4a, I32AtomicRmw8CmpxchgU, "i32.atomic.rmw8.cmpxchg_u", MemArg, THREADS),
    (Some(0xfe), 0x4b, I32AtomicRmw16CmpxchgU, "i32.atomic.rmw16.cmpxchg_u", MemArg, THREADS),
    (Some(0xfe), 0x4c, I64AtomicRmw8CmpxchgU, "i64.atomic.rmw8.cmpxchg_u", MemArg, THREADS),
    (Some(0xfe), 0x4d, I64AtomicRmw16CmpxchgU, "i64.atomic.rmw16.cmpxchg_u", MemArg, THREADS),
    (Some(0xfe), 0x4e, I64AtomicRmw32CmpxchgU, "i64.atomic.rmw32.cmpxchg_u", MemArg, THREADS),
}

static DECODE_TABLE: Lazy<HashMap<(Option<u8>, u32), Opcode>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(Opcode::ALL.len());
    for &op in Opcode::ALL {
        map.insert(op.encoding(), op);
    }
    map
});

/// Mnemonic -> opcode, for the lexer. `select` maps to the untyped opcode;
/// the text reader promotes it to `SelectT` when a result list follows.
static MNEMONIC_TABLE: Lazy<HashMap<&'static str, Opcode>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(Opcode::ALL.len());
    for &op in Opcode::ALL {
        map.entry(op.mnemonic()).or_insert(op);
    }
    map
});

impl Opcode {
    /// Look up an opcode by its binary encoding.
    #[must_use]
    pub fn decode(prefix: Option<u8>, code: u32) -> Option<Opcode> {
        DECODE_TABLE.get(&(prefix, code)).copied()
    }

    /// Look up an opcode by its text mnemonic.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        MNEMONIC_TABLE.get(mnemonic).copied()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        match &self.immediate {
            Immediate::None => Ok(()),
            Immediate::S32(v) => write!(f, " {}", v),
            Immediate::S64(v) => write!(f, " {}", v),
            Immediate::F32(v) => write!(f, " {}", v.to_hex()),
            Immediate::F64(v) => write!(f, " {}", v.to_hex()),
            Immediate::V128(v) => write!(f, " {}", v),
            Immediate::Index(var) => write!(f, " {}", var),
            Immediate::Block(block) => {
                if let Some(label) = &block.label {
                    write!(f, " ${}", label)?;
                }
                if let Some(type_use) = &block.ty.type_use {
                    write!(f, " (type {})", type_use)?;
                }
                Ok(())
            }
            Immediate::BrOnExn(imm) => write!(f, " {} {}", imm.target, imm.event),
            Immediate::BrTable(imm) => {
                for target in &imm.targets {
                    write!(f, " {}", target)?;
                }
                write!(f, " {}", imm.default_target)
            }
            Immediate::CallIndirect(imm) => {
                if let Some(table) = &imm.table {
                    write!(f, " {}", table)?;
                }
                if let Some(type_use) = &imm.ty.type_use {
                    write!(f, " (type {})", type_use)?;
                }
                Ok(())
            }
            Immediate::Copy(imm) => {
                if let (Some(dst), Some(src)) = (&imm.dst, &imm.src) {
                    write!(f, " {} {}", dst, src)?;
                }
                Ok(())
            }
            Immediate::Init(imm) => {
                if let Some(dst) = &imm.dst {
                    write!(f, " {} {}", dst, imm.segment)
                } else {
                    write!(f, " {}", imm.segment)
                }
            }
            Immediate::MemArg(memarg) => {
                if let Some(offset) = memarg.offset {
                    write!(f, " offset={}", offset)?;
                }
                if let Some(align) = memarg.align {
                    write!(f, " align={}", align)?;
                }
                Ok(())
            }
            Immediate::HeapType(ht) => write!(f, " {}", ht),
            Immediate::SelectTypes(types) => {
                for ty in types {
                    write!(f, " {}", ty)?;
                }
                Ok(())
            }
            Immediate::Shuffle(lanes) => {
                for lane in lanes {
                    write!(f, " {}", lane)?;
                }
                Ok(())
            }
            Immediate::SimdLane(lane) => write!(f, " {}", lane),
        }
    }
}
