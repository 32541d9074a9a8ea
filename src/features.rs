//! WebAssembly proposal feature switches.
//!
//! Each feature gates a defined slice of opcodes, types, or constructs. Both
//! readers consult the active set and refuse to produce an instruction or
//! accept a value type whose required features are not all enabled.
//!
//! The empty set is the MVP. [`Features::all`] enables every proposal this
//! crate understands.

macro_rules! features {
    ($( ($bit:expr, $const_name:ident, $enable:ident, $enabled:ident, $desc:expr) ),* $(,)?) => {
        /// An immutable set of enabled features.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
        pub struct Features {
            bits: u32,
        }

        impl Features {
            /// The MVP: no post-1.0 proposals enabled.
            pub const MVP: Features = Features { bits: 0 };

            $(
                pub const $const_name: Features = Features { bits: 1 << $bit };
            )*

            /// Create an MVP feature set.
            pub fn new() -> Self {
                Self::MVP
            }

            /// Every feature this crate understands.
            pub fn all() -> Self {
                let mut bits = 0;
                $( bits |= 1 << $bit; )*
                Features { bits }
            }

            /// Whether every feature in `required` is enabled in `self`.
            #[must_use]
            pub fn contains(&self, required: Features) -> bool {
                self.bits & required.bits == required.bits
            }

            /// The union of two feature sets.
            #[must_use]
            pub fn union(&self, other: Features) -> Features {
                Features {
                    bits: self.bits | other.bits,
                }
            }

            $(
                pub fn $enable(&mut self) -> &mut Self {
                    self.bits |= 1 << $bit;
                    self
                }

                #[must_use]
                pub fn $enabled(&self) -> bool {
                    self.bits & (1 << $bit) != 0
                }
            )*

            /// Human-readable names of the enabled features.
            #[must_use]
            pub fn names(&self) -> Vec<&'static str> {
                let mut out = Vec::new();
                $(
                    if self.$enabled() {
                        out.push($desc);
                    }
                )*
                out
            }
        }
    };
}

features! {
    (0, MUTABLE_GLOBALS, enable_mutable_globals, mutable_globals_enabled, "mutable-globals"),
    (1, SATURATING_FLOAT_TO_INT, enable_saturating_float_to_int, saturating_float_to_int_enabled, "saturating-float-to-int"),
    (2, SIGN_EXTENSION, enable_sign_extension, sign_extension_enabled, "sign-extension"),
    (3, MULTI_VALUE, enable_multi_value, multi_value_enabled, "multi-value"),
    (4, REFERENCE_TYPES, enable_reference_types, reference_types_enabled, "reference-types"),
    (5, BULK_MEMORY, enable_bulk_memory, bulk_memory_enabled, "bulk-memory"),
    (6, TAIL_CALL, enable_tail_call, tail_call_enabled, "tail-call"),
    (7, SIMD, enable_simd, simd_enabled, "simd"),
    (8, THREADS, enable_threads, threads_enabled, "threads"),
    (9, EXCEPTIONS, enable_exceptions, exceptions_enabled, "exceptions"),
    (10, FUNCTION_REFERENCES, enable_function_references, function_references_enabled, "function-references"),
    (11, ANNOTATIONS, enable_annotations, annotations_enabled, "annotations"),
    (12, MEMORY64, enable_memory64, memory64_enabled, "memory64"),
}
