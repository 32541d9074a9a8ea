//! Binary format constants and small decoders.

use crate::types::{
    ExternalKind, HeapKind, HeapType, Mutability, ReferenceType, Shared, ValueType,
};

// Section ids (§5.5.2 of the binary format, plus the exceptions proposal).
pub const SECTION_CUSTOM: u8 = 0;
pub const SECTION_TYPE: u8 = 1;
pub const SECTION_IMPORT: u8 = 2;
pub const SECTION_FUNCTION: u8 = 3;
pub const SECTION_TABLE: u8 = 4;
pub const SECTION_MEMORY: u8 = 5;
pub const SECTION_GLOBAL: u8 = 6;
pub const SECTION_EXPORT: u8 = 7;
pub const SECTION_START: u8 = 8;
pub const SECTION_ELEMENT: u8 = 9;
pub const SECTION_CODE: u8 = 10;
pub const SECTION_DATA: u8 = 11;
pub const SECTION_DATA_COUNT: u8 = 12;
pub const SECTION_EVENT: u8 = 13;

pub const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
pub const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

// Type constructors.
pub const TYPE_FUNC: u8 = 0x60;

// Block type: empty.
pub const BLOCK_TYPE_EMPTY: u8 = 0x40;

// Value type bytes.
pub const VT_I32: u8 = 0x7f;
pub const VT_I64: u8 = 0x7e;
pub const VT_F32: u8 = 0x7d;
pub const VT_F64: u8 = 0x7c;
pub const VT_V128: u8 = 0x7b;
pub const VT_FUNCREF: u8 = 0x70;
pub const VT_EXTERNREF: u8 = 0x6f;
pub const VT_EXNREF: u8 = 0x68;

// Typed references (function-references proposal).
pub const VT_REF: u8 = 0x6b;
pub const VT_REF_NULL: u8 = 0x6c;

// Heap type bytes, shared with the reference kinds above.
pub const HT_FUNC: u8 = 0x70;
pub const HT_EXTERN: u8 = 0x6f;
pub const HT_EXN: u8 = 0x68;

// Limits flags.
pub const LIMITS_NO_MAX: u8 = 0x00;
pub const LIMITS_HAS_MAX: u8 = 0x01;
pub const LIMITS_SHARED_NO_MAX: u8 = 0x02;
pub const LIMITS_SHARED_HAS_MAX: u8 = 0x03;

// Element segment flags: bit 0 = non-active, bit 1 = explicit table index
// (active) or declared (non-active), bit 2 = expression-encoded payload.
pub const ELEM_ACTIVE_FUNCS: u32 = 0;
pub const ELEM_PASSIVE_FUNCS: u32 = 1;
pub const ELEM_ACTIVE_TABLE_FUNCS: u32 = 2;
pub const ELEM_DECLARED_FUNCS: u32 = 3;
pub const ELEM_ACTIVE_EXPRS: u32 = 4;
pub const ELEM_PASSIVE_EXPRS: u32 = 5;
pub const ELEM_ACTIVE_TABLE_EXPRS: u32 = 6;
pub const ELEM_DECLARED_EXPRS: u32 = 7;

// Element kind byte inside the elemkind encodings.
pub const ELEMKIND_FUNCREF: u8 = 0x00;

// Data segment flags.
pub const DATA_ACTIVE: u32 = 0;
pub const DATA_PASSIVE: u32 = 1;
pub const DATA_ACTIVE_MEMORY: u32 = 2;

// External kinds.
pub const KIND_FUNCTION: u8 = 0x00;
pub const KIND_TABLE: u8 = 0x01;
pub const KIND_MEMORY: u8 = 0x02;
pub const KIND_GLOBAL: u8 = 0x03;
pub const KIND_EVENT: u8 = 0x04;

// Mutability.
pub const MUT_CONST: u8 = 0x00;
pub const MUT_VAR: u8 = 0x01;

// Name section subsection ids.
pub const NAME_MODULE: u8 = 0;
pub const NAME_FUNCTION: u8 = 1;
pub const NAME_LOCAL: u8 = 2;

/// Expression terminator.
pub const OP_END: u8 = 0x0b;

pub fn decode_value_type(byte: u8) -> Option<ValueType> {
    Some(match byte {
        VT_I32 => ValueType::I32,
        VT_I64 => ValueType::I64,
        VT_F32 => ValueType::F32,
        VT_F64 => ValueType::F64,
        VT_V128 => ValueType::V128,
        VT_FUNCREF => ValueType::FUNCREF,
        VT_EXTERNREF => ValueType::EXTERNREF,
        VT_EXNREF => ValueType::EXNREF,
        _ => return None,
    })
}

pub fn decode_reference_type(byte: u8) -> Option<ReferenceType> {
    match decode_value_type(byte) {
        Some(ValueType::Reference(rt)) => Some(rt),
        _ => None,
    }
}

pub fn decode_heap_kind(byte: u8) -> Option<HeapType> {
    Some(match byte {
        HT_FUNC => HeapType::Kind(HeapKind::Func),
        HT_EXTERN => HeapType::Kind(HeapKind::Extern),
        HT_EXN => HeapType::Kind(HeapKind::Exn),
        _ => return None,
    })
}

pub fn decode_external_kind(byte: u8) -> Option<ExternalKind> {
    Some(match byte {
        KIND_FUNCTION => ExternalKind::Function,
        KIND_TABLE => ExternalKind::Table,
        KIND_MEMORY => ExternalKind::Memory,
        KIND_GLOBAL => ExternalKind::Global,
        KIND_EVENT => ExternalKind::Event,
        _ => return None,
    })
}

pub fn decode_mutability(byte: u8) -> Option<Mutability> {
    Some(match byte {
        MUT_CONST => Mutability::Const,
        MUT_VAR => Mutability::Var,
        _ => return None,
    })
}

/// Decode limits flags into (has_max, shared).
pub fn decode_limits_flags(byte: u8) -> Option<(bool, Shared)> {
    Some(match byte {
        LIMITS_NO_MAX => (false, Shared::No),
        LIMITS_HAS_MAX => (true, Shared::No),
        LIMITS_SHARED_NO_MAX => (false, Shared::Yes),
        LIMITS_SHARED_HAS_MAX => (true, Shared::Yes),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_bytes_round_trip() {
        assert_eq!(decode_value_type(0x7f), Some(ValueType::I32));
        assert_eq!(decode_value_type(0x7b), Some(ValueType::V128));
        assert_eq!(decode_value_type(0x70), Some(ValueType::FUNCREF));
        assert_eq!(decode_value_type(0x6f), Some(ValueType::EXTERNREF));
        assert_eq!(decode_value_type(0x60), None);
    }

    #[test]
    fn reference_types_only() {
        assert!(decode_reference_type(0x70).is_some());
        assert!(decode_reference_type(0x7f).is_none());
    }

    #[test]
    fn external_kinds() {
        assert_eq!(decode_external_kind(0), Some(ExternalKind::Function));
        assert_eq!(decode_external_kind(4), Some(ExternalKind::Event));
        assert_eq!(decode_external_kind(5), None);
    }

    #[test]
    fn limits_flags() {
        assert_eq!(decode_limits_flags(0), Some((false, Shared::No)));
        assert_eq!(decode_limits_flags(3), Some((true, Shared::Yes)));
        assert_eq!(decode_limits_flags(4), None);
    }
}
