//! Literal decoders for the text format.
//!
//! The lexer only classifies literals; the conversions here turn a token's
//! source text (plus its [`LiteralInfo`]) into typed values. All failures are
//! reported as `None`; the grammar reader attaches the message and location.
//!
//! Hex float conversion rounds to nearest-even at the target width directly,
//! so f32 and f64 each round once (converting through f64 would double-round).

use super::token::{Base, LiteralInfo, LiteralKind, Sign};

/// Integer types the text reader can decode.
pub trait IntType: Sized + Copy {
    const BITS: u32;
    /// Build a value from a magnitude and sign, checking range. An unsigned
    /// spelling (no sign) may use the full 2^N range and is bitcast for
    /// signed types, matching `iN.const` in the text format.
    fn from_magnitude(magnitude: u64, sign: Sign) -> Option<Self>;
}

macro_rules! impl_int_unsigned {
    ($($t:ty),*) => {
        $(
            impl IntType for $t {
                const BITS: u32 = <$t>::BITS;

                fn from_magnitude(magnitude: u64, sign: Sign) -> Option<Self> {
                    match sign {
                        Sign::Minus => {
                            if magnitude == 0 {
                                Some(0)
                            } else {
                                None
                            }
                        }
                        Sign::None | Sign::Plus => <$t>::try_from(magnitude).ok(),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_int_signed {
    ($(($t:ty, $u:ty)),*) => {
        $(
            impl IntType for $t {
                const BITS: u32 = <$t>::BITS;

                fn from_magnitude(magnitude: u64, sign: Sign) -> Option<Self> {
                    match sign {
                        Sign::Minus => {
                            // Allowed down to -2^(N-1).
                            let limit = 1u64 << (<$t>::BITS - 1);
                            if magnitude > limit {
                                None
                            } else if magnitude == limit {
                                Some(<$t>::MIN)
                            } else {
                                Some(-(magnitude as $t))
                            }
                        }
                        Sign::Plus => {
                            if magnitude > <$t>::MAX as u64 {
                                None
                            } else {
                                Some(magnitude as $t)
                            }
                        }
                        Sign::None => {
                            // Unsigned spelling: full 2^N range, bitcast.
                            <$u>::try_from(magnitude).ok().map(|v| v as $t)
                        }
                    }
                }
            }
        )*
    };
}

impl_int_unsigned!(u8, u16, u32, u64);
impl_int_signed!((i8, u8), (i16, u16), (i32, u32), (i64, u64));

/// Validate underscore placement: an underscore may only appear between two
/// digits of the same group.
fn valid_underscores(s: &str, hex: bool) -> bool {
    let bytes = s.as_bytes();
    let mut in_exponent = false;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            if i == 0 || i == bytes.len() - 1 {
                return false;
            }
            let digit = |b: u8| {
                if hex && !in_exponent {
                    b.is_ascii_hexdigit()
                } else {
                    b.is_ascii_digit()
                }
            };
            if !digit(bytes[i - 1]) || !digit(bytes[i + 1]) {
                return false;
            }
        } else if b == b'p' || b == b'P' || (!hex && (b == b'e' || b == b'E')) {
            in_exponent = true;
        }
    }
    true
}

/// Parse a run of digits into a u64, rejecting overflow and empty runs.
/// Underscores must already be validated; they are skipped here.
fn digits_to_u64(digits: &str, radix: u64) -> Option<u64> {
    let mut value: u64 = 0;
    let mut any = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(radix as u32)? as u64;
        value = value.checked_mul(radix)?.checked_add(d)?;
        any = true;
    }
    if any {
        Some(value)
    } else {
        None
    }
}

/// Strip a leading sign character, if the literal was lexed with one.
fn strip_sign(info: LiteralInfo, s: &str) -> &str {
    match info.sign {
        Sign::None => s,
        Sign::Plus | Sign::Minus => &s[1..],
    }
}

/// Decode a natural number. Signs are rejected; the hex prefix is accepted
/// only when the literal was lexed as hex.
pub fn str_to_nat<T: IntType>(info: LiteralInfo, s: &str) -> Option<T> {
    if info.sign != Sign::None || info.kind != LiteralKind::Normal {
        return None;
    }
    if info.has_underscores && !valid_underscores(s, info.base == Base::Hex) {
        return None;
    }
    let magnitude = match info.base {
        Base::Hex => digits_to_u64(s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?, 16)?,
        Base::Decimal => digits_to_u64(s, 10)?,
    };
    T::from_magnitude(magnitude, Sign::None)
}

/// Decode an integer, accepting `+`/`-` spellings.
pub fn str_to_int<T: IntType>(info: LiteralInfo, s: &str) -> Option<T> {
    if info.kind != LiteralKind::Normal {
        return None;
    }
    let digits = strip_sign(info, s);
    if info.has_underscores && !valid_underscores(digits, info.base == Base::Hex) {
        return None;
    }
    let magnitude = match info.base {
        Base::Hex => digits_to_u64(
            digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))?,
            16,
        )?,
        Base::Decimal => digits_to_u64(digits, 10)?,
    };
    T::from_magnitude(magnitude, info.sign)
}

/// Float types the text reader can decode.
pub trait FloatType: Sized + Copy {
    /// Significand precision, including the implicit bit.
    const PRECISION: u32;
    /// Maximum unbiased exponent of a finite value.
    const EMAX: i32;
    /// Exponent bias.
    const BIAS: i32;
    /// Width of the stored mantissa field.
    const MANTISSA_BITS: u32;

    fn from_parts(negative: bool, biased_exp: u64, mantissa: u64) -> Self;
    fn from_decimal(s: &str) -> Option<Self>;
    fn is_infinite(self) -> bool;
    fn neg(self) -> Self;
}

impl FloatType for f32 {
    const PRECISION: u32 = 24;
    const EMAX: i32 = 127;
    const BIAS: i32 = 127;
    const MANTISSA_BITS: u32 = 23;

    fn from_parts(negative: bool, biased_exp: u64, mantissa: u64) -> Self {
        let sign = if negative { 1u32 << 31 } else { 0 };
        f32::from_bits(sign | ((biased_exp as u32) << 23) | mantissa as u32)
    }

    fn from_decimal(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    fn is_infinite(self) -> bool {
        f32::is_infinite(self)
    }

    fn neg(self) -> Self {
        -self
    }
}

impl FloatType for f64 {
    const PRECISION: u32 = 53;
    const EMAX: i32 = 1023;
    const BIAS: i32 = 1023;
    const MANTISSA_BITS: u32 = 52;

    fn from_parts(negative: bool, biased_exp: u64, mantissa: u64) -> Self {
        let sign = if negative { 1u64 << 63 } else { 0 };
        f64::from_bits(sign | (biased_exp << 52) | mantissa)
    }

    fn from_decimal(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    fn is_infinite(self) -> bool {
        f64::is_infinite(self)
    }

    fn neg(self) -> Self {
        -self
    }
}

/// Decode a float literal: decimal or hex form, `inf`, `nan`, or `nan:0x…`.
pub fn str_to_float<T: FloatType>(info: LiteralInfo, s: &str) -> Option<T> {
    let negative = info.sign == Sign::Minus;
    let body = strip_sign(info, s);

    match info.kind {
        LiteralKind::Infinity => {
            let biased = (T::EMAX + T::BIAS + 1) as u64;
            Some(T::from_parts(negative, biased, 0))
        }
        LiteralKind::Nan => {
            // Canonical NaN: quiet bit set, rest zero.
            let biased = (T::EMAX + T::BIAS + 1) as u64;
            Some(T::from_parts(negative, biased, 1 << (T::MANTISSA_BITS - 1)))
        }
        LiteralKind::NanPayload => {
            let payload_hex = body.strip_prefix("nan:0x")?;
            if !valid_underscores(payload_hex, true) {
                return None;
            }
            let payload = digits_to_u64(payload_hex, 16)?;
            let mask = (1u64 << T::MANTISSA_BITS) - 1;
            if payload == 0 || payload > mask {
                return None;
            }
            let biased = (T::EMAX + T::BIAS + 1) as u64;
            Some(T::from_parts(negative, biased, payload))
        }
        LiteralKind::Normal => {
            if info.has_underscores && !valid_underscores(body, info.base == Base::Hex) {
                return None;
            }
            let clean: String = body.chars().filter(|&c| c != '_').collect();
            match info.base {
                Base::Hex => parse_hex_float::<T>(negative, &clean),
                Base::Decimal => {
                    let value = T::from_decimal(&clean)?;
                    if value.is_infinite() {
                        // Overflowed the target width.
                        return None;
                    }
                    Some(if negative { value.neg() } else { value })
                }
            }
        }
    }
}

/// Parse a hex float (`ABC`, `ABC.DEF`, `ABC.DEFpN` after the `0x` prefix),
/// rounding to nearest-even at the target width. Returns `None` when the
/// value overflows the width's finite range.
fn parse_hex_float<T: FloatType>(negative: bool, s: &str) -> Option<T> {
    let body = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;

    // Split off the binary exponent.
    let (digits, exp_str) = match body.find(['p', 'P']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let mut exp: i64 = match exp_str {
        Some(e) => {
            if e.is_empty() {
                return None;
            }
            // Clamp absurd exponents so later arithmetic cannot overflow;
            // anything this far out is an overflow or rounds to zero anyway.
            e.parse::<i64>().ok()?.clamp(-100_000_000, 100_000_000)
        }
        None => 0,
    };

    let (int_part, frac_part) = match digits.find('.') {
        Some(i) => (&digits[..i], &digits[i + 1..]),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    // Accumulate significant bits; once the accumulator is wide enough the
    // rest only affects the sticky bit.
    let mut mantissa: u128 = 0;
    let mut sticky = false;
    for c in int_part.chars() {
        let d = c.to_digit(16)? as u128;
        if mantissa >> 120 == 0 {
            mantissa = mantissa * 16 + d;
        } else {
            exp += 4;
            sticky |= d != 0;
        }
    }
    for c in frac_part.chars() {
        let d = c.to_digit(16)? as u128;
        if mantissa >> 120 == 0 {
            mantissa = mantissa * 16 + d;
            exp -= 4;
        } else {
            sticky |= d != 0;
        }
    }

    if mantissa == 0 {
        return Some(T::from_parts(negative, 0, 0));
    }

    // Normalize to PRECISION bits with round-to-nearest-even.
    let precision = T::PRECISION as i64;
    let msb = 127 - mantissa.leading_zeros() as i64;
    // Unbiased exponent of the value's leading bit.
    let mut value_exp = msb + exp;

    let round = |mantissa: u128, drop: i64, mut sticky: bool| -> (u64, bool) {
        // Keep the top (msb+1-drop) bits, applying RTNE on the dropped part.
        if drop <= 0 {
            return ((mantissa as u64) << (-drop) as u32, false);
        }
        if drop > 127 {
            return (0, mantissa != 0 || sticky);
        }
        let kept = (mantissa >> drop) as u64;
        let guard = (mantissa >> (drop - 1)) & 1 == 1;
        if drop > 1 {
            sticky |= mantissa & ((1 << (drop - 1)) - 1) != 0;
        }
        if guard && (sticky || kept & 1 == 1) {
            (kept + 1, false)
        } else {
            (kept, false)
        }
    };

    let emin: i64 = (1 - T::BIAS) as i64; // smallest normal exponent

    let (mut kept, _) = if value_exp < emin {
        // Subnormal: the leading bit sits below the normal range; drop enough
        // bits that the result aligns with the subnormal mantissa field.
        let drop = msb - (precision - 1) + (emin - value_exp);
        round(mantissa, drop, sticky)
    } else {
        let drop = msb + 1 - precision;
        round(mantissa, drop, sticky)
    };

    // Rounding may have carried out an extra bit.
    if kept >> T::PRECISION != 0 {
        kept >>= 1;
        value_exp += 1;
    }

    if kept == 0 {
        return Some(T::from_parts(negative, 0, 0));
    }

    if value_exp < emin {
        // Subnormal, unless rounding carried up to the smallest normal
        // (mantissa field all zero, biased exponent one).
        if kept >> (T::PRECISION - 1) != 0 {
            return Some(T::from_parts(negative, 1, 0));
        }
        return Some(T::from_parts(negative, 0, kept));
    }

    if value_exp > T::EMAX as i64 {
        return None;
    }

    let biased = (value_exp + T::BIAS as i64) as u64;
    let mask = (1u64 << T::MANTISSA_BITS) - 1;
    Some(T::from_parts(negative, biased, kept & mask))
}

/// Decode the escape sequences of a quoted string body (the part between the
/// quotes). On failure, returns the byte offset of the bad escape within
/// `raw` plus a message.
pub fn text_to_bytes(raw: &str) -> Result<Vec<u8>, (usize, String)> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let (_, esc) = chars
            .next()
            .ok_or_else(|| (i, "unterminated escape sequence".to_string()))?;
        match esc {
            't' => bytes.push(0x09),
            'n' => bytes.push(0x0A),
            'r' => bytes.push(0x0D),
            '"' => bytes.push(0x22),
            '\'' => bytes.push(0x27),
            '\\' => bytes.push(0x5C),
            'u' => {
                match chars.next() {
                    Some((_, '{')) => {}
                    _ => return Err((i, "expected '{' after \\u".to_string())),
                }
                let mut value: u32 = 0;
                let mut digits = 0;
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, d)) if d.is_ascii_hexdigit() => {
                            digits += 1;
                            value = value
                                .checked_mul(16)
                                .and_then(|v| v.checked_add(d.to_digit(16).unwrap()))
                                .ok_or_else(|| {
                                    (i, "unicode escape value too large".to_string())
                                })?;
                        }
                        _ => return Err((i, "malformed unicode escape".to_string())),
                    }
                }
                if digits == 0 {
                    return Err((i, "empty unicode escape".to_string()));
                }
                let c = char::from_u32(value).ok_or_else(|| {
                    (i, format!("invalid unicode code point: U+{:X}", value))
                })?;
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            h if h.is_ascii_hexdigit() => {
                let high = h.to_digit(16).unwrap() as u8;
                let low = match chars.next() {
                    Some((_, l)) if l.is_ascii_hexdigit() => l.to_digit(16).unwrap() as u8,
                    _ => return Err((i, "invalid hex escape".to_string())),
                };
                bytes.push((high << 4) | low);
            }
            other => {
                return Err((i, format!("invalid escape sequence: \\{}", other)));
            }
        }
    }

    Ok(bytes)
}

/// Whether decoded bytes form valid UTF-8. The grammar requires this for
/// module/name strings in imports and exports.
#[must_use]
pub fn is_valid_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nat_info(base: Base) -> LiteralInfo {
        LiteralInfo::nat(base, false)
    }

    fn int_info(sign: Sign, base: Base) -> LiteralInfo {
        LiteralInfo {
            sign,
            kind: LiteralKind::Normal,
            base,
            has_underscores: false,
        }
    }

    fn float_info(sign: Sign, kind: LiteralKind, base: Base) -> LiteralInfo {
        LiteralInfo {
            sign,
            kind,
            base,
            has_underscores: false,
        }
    }

    #[test]
    fn nat_decimal() {
        assert_eq!(str_to_nat::<u32>(nat_info(Base::Decimal), "0"), Some(0));
        assert_eq!(str_to_nat::<u32>(nat_info(Base::Decimal), "42"), Some(42));
        assert_eq!(
            str_to_nat::<u32>(nat_info(Base::Decimal), "4294967295"),
            Some(u32::MAX)
        );
        // Overflow
        assert_eq!(str_to_nat::<u32>(nat_info(Base::Decimal), "4294967296"), None);
        // Empty digit run
        assert_eq!(str_to_nat::<u32>(nat_info(Base::Decimal), ""), None);
    }

    #[test]
    fn nat_hex() {
        assert_eq!(str_to_nat::<u32>(nat_info(Base::Hex), "0xff"), Some(255));
        assert_eq!(
            str_to_nat::<u64>(nat_info(Base::Hex), "0xFFFFFFFFFFFFFFFF"),
            Some(u64::MAX)
        );
        assert_eq!(str_to_nat::<u32>(nat_info(Base::Hex), "0x"), None);
    }

    #[test]
    fn nat_underscores() {
        let info = LiteralInfo::nat(Base::Decimal, true);
        assert_eq!(str_to_nat::<u32>(info, "1_000_000"), Some(1_000_000));
        assert_eq!(str_to_nat::<u32>(info, "1__0"), None);
        assert_eq!(str_to_nat::<u32>(info, "_1"), None);
        assert_eq!(str_to_nat::<u32>(info, "1_"), None);
    }

    #[test]
    fn nat_rejects_sign() {
        assert_eq!(
            str_to_nat::<u32>(int_info(Sign::Minus, Base::Decimal), "-1"),
            None
        );
    }

    #[test]
    fn int_signed_ranges() {
        let minus = int_info(Sign::Minus, Base::Decimal);
        let none = int_info(Sign::None, Base::Decimal);
        let plus = int_info(Sign::Plus, Base::Decimal);

        assert_eq!(str_to_int::<i32>(minus, "-1"), Some(-1));
        assert_eq!(str_to_int::<i32>(minus, "-2147483648"), Some(i32::MIN));
        assert_eq!(str_to_int::<i32>(minus, "-2147483649"), None);
        assert_eq!(str_to_int::<i32>(plus, "+2147483647"), Some(i32::MAX));
        assert_eq!(str_to_int::<i32>(plus, "+2147483648"), None);
        // Unsigned spelling bitcasts.
        assert_eq!(str_to_int::<i32>(none, "4294967295"), Some(-1));
        assert_eq!(str_to_int::<i32>(none, "4294967296"), None);
    }

    #[test]
    fn int_unsigned_rejects_minus() {
        let minus = int_info(Sign::Minus, Base::Decimal);
        assert_eq!(str_to_int::<u32>(minus, "-1"), None);
        assert_eq!(str_to_int::<u32>(minus, "-0"), Some(0));
    }

    #[test]
    fn int_i64_extremes() {
        let minus = int_info(Sign::Minus, Base::Hex);
        let none = int_info(Sign::None, Base::Hex);
        assert_eq!(
            str_to_int::<i64>(minus, "-0x8000000000000000"),
            Some(i64::MIN)
        );
        assert_eq!(
            str_to_int::<i64>(none, "0xFFFFFFFFFFFFFFFF"),
            Some(-1i64)
        );
    }

    #[test]
    fn float_decimal() {
        let info = float_info(Sign::None, LiteralKind::Normal, Base::Decimal);
        assert_eq!(str_to_float::<f64>(info, "3.25"), Some(3.25));
        assert_eq!(str_to_float::<f32>(info, "0.5"), Some(0.5f32));
        assert_eq!(str_to_float::<f64>(info, "1e3"), Some(1000.0));

        let neg = float_info(Sign::Minus, LiteralKind::Normal, Base::Decimal);
        assert_eq!(str_to_float::<f64>(neg, "-2.5"), Some(-2.5));
        // -0.0 keeps its sign bit.
        let z = str_to_float::<f64>(neg, "-0.0").unwrap();
        assert_eq!(z.to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn float_decimal_overflow() {
        let info = float_info(Sign::None, LiteralKind::Normal, Base::Decimal);
        assert_eq!(str_to_float::<f32>(info, "1e39"), None);
        assert_eq!(str_to_float::<f64>(info, "1e309"), None);
    }

    #[test]
    fn float_infinity() {
        let info = float_info(Sign::None, LiteralKind::Infinity, Base::Decimal);
        assert_eq!(str_to_float::<f32>(info, "inf"), Some(f32::INFINITY));
        let neg = float_info(Sign::Minus, LiteralKind::Infinity, Base::Decimal);
        assert_eq!(str_to_float::<f64>(neg, "-inf"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn float_nan() {
        let info = float_info(Sign::None, LiteralKind::Nan, Base::Decimal);
        let nan = str_to_float::<f32>(info, "nan").unwrap();
        assert_eq!(nan.to_bits(), 0x7fc00000);

        let neg = float_info(Sign::Minus, LiteralKind::Nan, Base::Decimal);
        let nan = str_to_float::<f64>(neg, "-nan").unwrap();
        assert_eq!(nan.to_bits(), 0xfff8000000000000);
    }

    #[test]
    fn float_nan_payload() {
        let info = float_info(Sign::None, LiteralKind::NanPayload, Base::Hex);
        let nan = str_to_float::<f32>(info, "nan:0x200000").unwrap();
        assert_eq!(nan.to_bits(), 0x7fa00000);
        // Payload of zero would be infinity, not NaN.
        assert_eq!(str_to_float::<f32>(info, "nan:0x0"), None);
        // Payload too wide for f32.
        assert_eq!(str_to_float::<f32>(info, "nan:0x800000"), None);
        assert_eq!(
            str_to_float::<f64>(info, "nan:0xfffffffffffff")
                .unwrap()
                .to_bits(),
            0x7fffffffffffffff
        );
    }

    #[test]
    fn hex_float_exact() {
        let info = float_info(Sign::None, LiteralKind::Normal, Base::Hex);
        assert_eq!(str_to_float::<f64>(info, "0x1p0"), Some(1.0));
        assert_eq!(str_to_float::<f64>(info, "0x1.8p1"), Some(3.0));
        assert_eq!(str_to_float::<f32>(info, "0x1.8p1"), Some(3.0f32));
        assert_eq!(str_to_float::<f64>(info, "0x.8p0"), Some(0.5));
        assert_eq!(str_to_float::<f64>(info, "0x10"), Some(16.0));
        assert_eq!(str_to_float::<f64>(info, "0x1p-1"), Some(0.5));
    }

    #[test]
    fn hex_float_limits() {
        let info = float_info(Sign::None, LiteralKind::Normal, Base::Hex);
        // Largest finite values.
        assert_eq!(
            str_to_float::<f32>(info, "0x1.fffffep127"),
            Some(f32::MAX)
        );
        assert_eq!(
            str_to_float::<f64>(info, "0x1.fffffffffffffp1023"),
            Some(f64::MAX)
        );
        // One step beyond overflows.
        assert_eq!(str_to_float::<f32>(info, "0x1p128"), None);
        assert_eq!(str_to_float::<f64>(info, "0x1p1024"), None);
    }

    #[test]
    fn hex_float_subnormals() {
        let info = float_info(Sign::None, LiteralKind::Normal, Base::Hex);
        // Smallest subnormals.
        let tiny32 = str_to_float::<f32>(info, "0x1p-149").unwrap();
        assert_eq!(tiny32.to_bits(), 1);
        let tiny64 = str_to_float::<f64>(info, "0x1p-1074").unwrap();
        assert_eq!(tiny64.to_bits(), 1);
        // Smallest normal.
        let normal32 = str_to_float::<f32>(info, "0x1p-126").unwrap();
        assert_eq!(normal32.to_bits(), 0x00800000);
    }

    #[test]
    fn hex_float_rounds_to_nearest_even() {
        let info = float_info(Sign::None, LiteralKind::Normal, Base::Hex);
        // Exactly halfway between 1.0 and the next f32: ties to even (1.0).
        assert_eq!(str_to_float::<f32>(info, "0x1.000001p0"), Some(1.0f32));
        // Just above halfway rounds up.
        let up = str_to_float::<f32>(info, "0x1.0000011p0").unwrap();
        assert_eq!(up.to_bits(), 0x3f800001);
        // Representable in f64 but rounds in f32: each width rounds once.
        let wide = str_to_float::<f64>(info, "0x1.000001p0").unwrap();
        assert_eq!(wide.to_bits(), 0x3ff0000010000000);
    }

    #[test]
    fn text_simple() {
        assert_eq!(text_to_bytes("hello").unwrap(), b"hello");
        assert_eq!(text_to_bytes("").unwrap(), b"");
    }

    #[test]
    fn text_escapes() {
        assert_eq!(text_to_bytes(r"\t\n\r").unwrap(), vec![0x09, 0x0a, 0x0d]);
        assert_eq!(
            text_to_bytes(r#"\"\'\\"#).unwrap(),
            vec![0x22, 0x27, 0x5c]
        );
        assert_eq!(text_to_bytes(r"\00\ff").unwrap(), vec![0x00, 0xff]);
        assert_eq!(text_to_bytes(r"\u{1F600}").unwrap(), "😀".as_bytes());
    }

    #[test]
    fn text_bad_escapes() {
        assert!(text_to_bytes(r"\z").is_err());
        assert!(text_to_bytes(r"\u{}").is_err());
        assert!(text_to_bytes(r"\u{110000}").is_err());
        assert!(text_to_bytes(r"\f").is_err());
        assert!(text_to_bytes("\\").is_err());
    }

    #[test]
    fn utf8_validation() {
        assert!(is_valid_utf8(b"plain ascii"));
        assert!(is_valid_utf8("日本語".as_bytes()));
        assert!(!is_valid_utf8(&[0xff, 0xfe]));
        assert!(!is_valid_utf8(&[0xc0, 0x80])); // overlong
    }

    #[test]
    fn escape_round_trip() {
        // Bytes that need no escaping survive a decode unchanged.
        let input = "ascii and spaces 123";
        assert_eq!(text_to_bytes(input).unwrap(), input.as_bytes());
    }
}
