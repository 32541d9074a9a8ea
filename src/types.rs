//! The shared type layer of the AST.
//!
//! Both readers produce these records. Every tagged variant here matches an
//! encoding in the binary format and a keyword in the text format.

use crate::features::Features;
use std::fmt;

/// A reference to a named item: either a numeric index into one of the module
/// index spaces, or a symbolic `$name` awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Var {
    Index(u32),
    Name(String),
}

impl Var {
    #[must_use]
    pub fn index(&self) -> Option<u32> {
        match self {
            Var::Index(i) => Some(*i),
            Var::Name(_) => None,
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Index(i) => write!(f, "{}", i),
            Var::Name(n) => write!(f, "${}", n),
        }
    }
}

/// The numeric value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    I32,
    I64,
    F32,
    F64,
    V128,
}

/// The abstract reference kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    FuncRef,
    ExternRef,
    ExnRef,
}

/// The heap type of a typed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapKind {
    Func,
    Extern,
    Exn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapType {
    Kind(HeapKind),
    Index(Var),
}

/// A reference type: one of the abbreviated kinds (`funcref`, `externref`,
/// `exnref`) or a full `(ref null? ht)` form from the function-references
/// proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceType {
    Kind(ReferenceKind),
    Ref { nullable: bool, heap_type: HeapType },
}

impl ReferenceType {
    pub const FUNCREF: ReferenceType = ReferenceType::Kind(ReferenceKind::FuncRef);
    pub const EXTERNREF: ReferenceType = ReferenceType::Kind(ReferenceKind::ExternRef);
    pub const EXNREF: ReferenceType = ReferenceType::Kind(ReferenceKind::ExnRef);

    /// Features required to *name* this reference type in a value position.
    #[must_use]
    pub fn required_features(&self) -> Features {
        match self {
            ReferenceType::Kind(ReferenceKind::FuncRef)
            | ReferenceType::Kind(ReferenceKind::ExternRef) => Features::REFERENCE_TYPES,
            ReferenceType::Kind(ReferenceKind::ExnRef) => Features::EXCEPTIONS,
            ReferenceType::Ref { .. } => Features::FUNCTION_REFERENCES,
        }
    }

    /// Features required in a table-element position, where `funcref` has
    /// been legal since the MVP.
    #[must_use]
    pub fn required_features_as_element(&self) -> Features {
        match self {
            ReferenceType::Kind(ReferenceKind::FuncRef) => Features::MVP,
            other => other.required_features(),
        }
    }
}

/// A value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Numeric(NumericType),
    Reference(ReferenceType),
}

impl ValueType {
    pub const I32: ValueType = ValueType::Numeric(NumericType::I32);
    pub const I64: ValueType = ValueType::Numeric(NumericType::I64);
    pub const F32: ValueType = ValueType::Numeric(NumericType::F32);
    pub const F64: ValueType = ValueType::Numeric(NumericType::F64);
    pub const V128: ValueType = ValueType::Numeric(NumericType::V128);
    pub const FUNCREF: ValueType = ValueType::Reference(ReferenceType::FUNCREF);
    pub const EXTERNREF: ValueType = ValueType::Reference(ReferenceType::EXTERNREF);
    pub const EXNREF: ValueType = ValueType::Reference(ReferenceType::EXNREF);

    #[must_use]
    pub fn required_features(&self) -> Features {
        match self {
            ValueType::Numeric(NumericType::V128) => Features::SIMD,
            ValueType::Numeric(_) => Features::MVP,
            ValueType::Reference(rt) => rt.required_features(),
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NumericType::I32 => "i32",
            NumericType::I64 => "i64",
            NumericType::F32 => "f32",
            NumericType::F64 => "f64",
            NumericType::V128 => "v128",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for HeapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapType::Kind(HeapKind::Func) => write!(f, "func"),
            HeapType::Kind(HeapKind::Extern) => write!(f, "extern"),
            HeapType::Kind(HeapKind::Exn) => write!(f, "exn"),
            HeapType::Index(var) => write!(f, "{}", var),
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceType::Kind(ReferenceKind::FuncRef) => write!(f, "funcref"),
            ReferenceType::Kind(ReferenceKind::ExternRef) => write!(f, "externref"),
            ReferenceType::Kind(ReferenceKind::ExnRef) => write!(f, "exnref"),
            ReferenceType::Ref {
                nullable: true,
                heap_type,
            } => write!(f, "(ref null {})", heap_type),
            ReferenceType::Ref {
                nullable: false,
                heap_type,
            } => write!(f, "(ref {})", heap_type),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Numeric(n) => write!(f, "{}", n),
            ValueType::Reference(r) => write!(f, "{}", r),
        }
    }
}

/// Whether a memory may be shared between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shared {
    #[default]
    No,
    Yes,
}

/// Size limits of a table or memory.
///
/// `max >= min` when `max` is present; `shared` is only meaningful for memory
/// limits, and only when the threads feature is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
    pub shared: Shared,
}

impl Limits {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self {
            min,
            max,
            shared: Shared::No,
        }
    }

    /// Limits where min and max are both `n` (used by inline element and data
    /// segments).
    pub fn exact(n: u32) -> Self {
        Self::new(n, Some(n))
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{} {}", self.min, max)?,
            None => write!(f, "{}", self.min)?,
        }
        if self.shared == Shared::Yes {
            write!(f, " shared")?;
        }
        Ok(())
    }
}

/// Global mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Const,
    Var,
}

/// An unnamed function signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(params: Vec<ValueType>, results: Vec<ValueType>) -> Self {
        Self { params, results }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.results.is_empty()
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, ")")
    }
}

/// A value type with an optional bound parameter/local name. Only the text
/// reader produces names; the binary reader leaves them `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundValueType {
    pub name: Option<String>,
    pub value_type: ValueType,
}

/// A function signature whose parameters may carry names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoundFunctionType {
    pub params: Vec<BoundValueType>,
    pub results: Vec<ValueType>,
}

impl BoundFunctionType {
    /// Forget the parameter names.
    #[must_use]
    pub fn to_function_type(&self) -> FunctionType {
        FunctionType {
            params: self.params.iter().map(|p| p.value_type.clone()).collect(),
            results: self.results.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.results.is_empty()
    }
}

impl From<FunctionType> for BoundFunctionType {
    fn from(ft: FunctionType) -> Self {
        BoundFunctionType {
            params: ft
                .params
                .into_iter()
                .map(|value_type| BoundValueType {
                    name: None,
                    value_type,
                })
                .collect(),
            results: ft.results,
        }
    }
}

/// A use of a function type: an optional `(type $t)` reference plus an inline
/// signature. One of the two may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionTypeUse {
    pub type_use: Option<Var>,
    pub ty: FunctionType,
}

impl FunctionTypeUse {
    /// Whether this use can be encoded inline as a block type: no explicit
    /// type reference, no parameters, and at most one result.
    #[must_use]
    pub fn is_inline_type(&self) -> bool {
        self.type_use.is_none() && self.ty.params.is_empty() && self.ty.results.len() <= 1
    }
}

/// The kind of an import or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalKind {
    Function,
    Table,
    Memory,
    Global,
    Event,
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExternalKind::Function => "func",
            ExternalKind::Table => "table",
            ExternalKind::Memory => "memory",
            ExternalKind::Global => "global",
            ExternalKind::Event => "event",
        };
        write!(f, "{}", s)
    }
}

/// A 128-bit vector constant, stored as 16 little-endian bytes and viewable
/// as lanes of any shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct V128(pub [u8; 16]);

impl V128 {
    pub fn from_u8x16(lanes: [u8; 16]) -> Self {
        V128(lanes)
    }

    pub fn from_u16x8(lanes: [u16; 8]) -> Self {
        let mut bytes = [0u8; 16];
        for (i, lane) in lanes.iter().enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&lane.to_le_bytes());
        }
        V128(bytes)
    }

    pub fn from_u32x4(lanes: [u32; 4]) -> Self {
        let mut bytes = [0u8; 16];
        for (i, lane) in lanes.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&lane.to_le_bytes());
        }
        V128(bytes)
    }

    pub fn from_u64x2(lanes: [u64; 2]) -> Self {
        let mut bytes = [0u8; 16];
        for (i, lane) in lanes.iter().enumerate() {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&lane.to_le_bytes());
        }
        V128(bytes)
    }

    pub fn from_f32x4(lanes: [f32; 4]) -> Self {
        let mut out = [0u32; 4];
        for (i, lane) in lanes.iter().enumerate() {
            out[i] = lane.to_bits();
        }
        Self::from_u32x4(out)
    }

    pub fn from_f64x2(lanes: [f64; 2]) -> Self {
        Self::from_u64x2([lanes[0].to_bits(), lanes[1].to_bits()])
    }

    #[must_use]
    pub fn as_u8x16(&self) -> [u8; 16] {
        self.0
    }

    #[must_use]
    pub fn as_u32x4(&self) -> [u32; 4] {
        let mut out = [0u32; 4];
        for (i, lane) in out.iter_mut().enumerate() {
            *lane = u32::from_le_bytes(self.0[i * 4..i * 4 + 4].try_into().unwrap());
        }
        out
    }

    #[must_use]
    pub fn as_u64x2(&self) -> [u64; 2] {
        [
            u64::from_le_bytes(self.0[0..8].try_into().unwrap()),
            u64::from_le_bytes(self.0[8..16].try_into().unwrap()),
        ]
    }
}

impl fmt::Display for V128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lanes = self.as_u32x4();
        write!(
            f,
            "i32x4 0x{:08x} 0x{:08x} 0x{:08x} 0x{:08x}",
            lanes[0], lanes[1], lanes[2], lanes[3]
        )
    }
}
