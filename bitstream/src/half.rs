//! IEEE-754 binary16 ("half") conversion.
//!
//! Half floats carry 1 sign bit, 5 exponent bits and 10 mantissa bits. The
//! largest finite value is 65504 and the relative rounding error of a normal
//! value is at most 2^-11. Values beyond the finite range saturate to
//! infinity; values below the smallest subnormal flush to signed zero.

/// Largest finite value representable as a half float.
pub const HALF_MAX: f32 = 65504.0;

/// Converts an `f32` to half-float bits, rounding to nearest even.
#[must_use]
pub fn f32_to_half_bits(value: f32) -> u16 {
    let x = value.to_bits();
    let sign = x & 0x8000_0000;
    let exp = x & 0x7F80_0000;
    let man = x & 0x007F_FFFF;
    let half_sign = (sign >> 16) as u16;

    if exp == 0x7F80_0000 {
        if man == 0 {
            return half_sign | 0x7C00;
        }
        // Keep a quiet NaN with the top payload bits.
        return half_sign | 0x7E00 | (man >> 13) as u16;
    }

    let unbiased_exp = (exp >> 23) as i32 - 127;
    let half_exp = unbiased_exp + 15;

    if half_exp >= 0x1F {
        return half_sign | 0x7C00;
    }

    if half_exp <= 0 {
        if 14 - half_exp > 24 {
            return half_sign;
        }
        let man = man | 0x0080_0000;
        let mut half_man = man >> (14 - half_exp);
        let round_bit = 1 << (13 - half_exp);
        if (man & round_bit) != 0 && (man & (3 * round_bit - 1)) != 0 {
            half_man += 1;
        }
        return half_sign | half_man as u16;
    }

    let half_exp = (half_exp as u32) << 10;
    let half_man = man >> 13;
    let round_bit = 0x0000_1000;
    let bits = half_sign as u32 | half_exp | half_man;
    // A carry out of the mantissa correctly bumps the exponent.
    if (man & round_bit) != 0 && (man & (3 * round_bit - 1)) != 0 {
        (bits + 1) as u16
    } else {
        bits as u16
    }
}

/// Converts half-float bits back to an `f32`. Exact for every input.
#[must_use]
pub fn half_bits_to_f32(bits: u16) -> f32 {
    if bits & 0x7FFF == 0 {
        return f32::from_bits((bits as u32) << 16);
    }

    let half_sign = (bits & 0x8000) as u32;
    let half_exp = (bits & 0x7C00) as u32;
    let half_man = (bits & 0x03FF) as u32;
    let sign = half_sign << 16;

    if half_exp == 0x7C00 {
        if half_man == 0 {
            return f32::from_bits(sign | 0x7F80_0000);
        }
        return f32::from_bits(sign | 0x7FC0_0000 | (half_man << 13));
    }

    if half_exp == 0 {
        // Subnormal: renormalize into the f32 exponent range.
        let e = (half_man as u16).leading_zeros() - 6;
        let exp = (127 - 15 - e) << 23;
        let man = (half_man << (14 + e)) & 0x007F_FFFF;
        return f32::from_bits(sign | exp | man);
    }

    let unbiased_exp = (half_exp >> 10) as i32 - 15;
    let exp = ((unbiased_exp + 127) as u32) << 23;
    let man = half_man << 13;
    f32::from_bits(sign | exp | man)
}

/// Round-trips a value through half precision.
#[must_use]
pub fn quantize_half(value: f32) -> f32 {
    half_bits_to_f32(f32_to_half_bits(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_small_integers() {
        for v in [0.0f32, 1.0, -1.0, 2.0, 0.5, 100.0, -2048.0, 65504.0] {
            assert_eq!(quantize_half(v), v, "value {v} should be exact");
        }
    }

    #[test]
    fn known_bit_patterns() {
        assert_eq!(f32_to_half_bits(1.0), 0x3C00);
        assert_eq!(f32_to_half_bits(-2.0), 0xC000);
        assert_eq!(f32_to_half_bits(65504.0), 0x7BFF);
        assert_eq!(f32_to_half_bits(0.5), 0x3800);
        assert_eq!(half_bits_to_f32(0x3555), 0.333_251_953_125);
    }

    #[test]
    fn overflow_saturates_to_infinity() {
        assert_eq!(f32_to_half_bits(70000.0), 0x7C00);
        assert_eq!(f32_to_half_bits(-1.0e9), 0xFC00);
        assert!(half_bits_to_f32(0x7C00).is_infinite());
    }

    #[test]
    fn nan_stays_nan() {
        let bits = f32_to_half_bits(f32::NAN);
        assert!(half_bits_to_f32(bits).is_nan());
    }

    #[test]
    fn subnormals_roundtrip() {
        let smallest = half_bits_to_f32(0x0001);
        assert_eq!(smallest, 2.0f32.powi(-24));
        assert_eq!(f32_to_half_bits(smallest), 0x0001);
        assert_eq!(f32_to_half_bits(2.0f32.powi(-30)), 0x0000);
    }

    #[test]
    fn negative_zero_keeps_sign() {
        assert_eq!(f32_to_half_bits(-0.0), 0x8000);
        assert!(half_bits_to_f32(0x8000).is_sign_negative());
    }

    #[test]
    fn rounds_to_nearest_even() {
        // 2049 lies exactly between 2048 and 2050; ties go to the even mantissa.
        assert_eq!(quantize_half(2049.0), 2048.0);
        assert_eq!(quantize_half(2051.0), 2052.0);
    }

    #[test]
    fn relative_error_is_bounded() {
        let mut v = 0.001f32;
        while v < HALF_MAX {
            let q = quantize_half(v);
            let rel = ((q - v) / v).abs();
            assert!(rel <= 1.0 / 2048.0, "value {v} quantized to {q}");
            v *= 1.37;
        }
    }
}
