use core::cmp::Ordering;
use core::fmt;
use core::iter::{Product, Sum};
use core::ops::{
    Add, AddAssign, Mul, MulAssign, Neg, Range, Shl, ShlAssign, Shr, ShrAssign, Sub, SubAssign,
};
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeTuple};

use crate::FixedPointError;

/// Signed fixed-point number stored as one two's-complement word of `LIMBS`
/// 64-bit limbs, scaled by 2^-`FRAC_BITS`.
///
/// Limbs are kept most significant first. Bit 0 of the word is the most
/// significant bit of `limbs[0]` and doubles as the sign bit; the integer
/// field follows it and the fraction field occupies the last `FRAC_BITS` bits.
///
/// All arithmetic wraps modulo 2^(64 * LIMBS).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FixedPoint<const LIMBS: usize, const FRAC_BITS: usize> {
    limbs: [u64; LIMBS],
}

/// 256-bit fixed point: 1 sign bit, 191 integer bits, 64 fractional bits.
///
/// The limbs are, in order, `left`, `middle`, `right` and `fractional`.
pub type FixedPoint256 = FixedPoint<4, 64>;

/// 128-bit fixed point: 1 sign bit, 87 integer bits, 40 fractional bits.
pub type FixedPoint128 = FixedPoint<2, 40>;

// ============================================================================
// Constants
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Width of the whole word in bits.
    pub const BITS: usize = LIMBS * 64;

    /// Index of the sign bit.
    pub const SIGN_BIT: usize = 0;

    /// Index of the most significant integer bit.
    pub const INTEGER_LEFT: usize = 1;

    /// Index of the least significant integer bit (weight 1).
    pub const INTEGER_RIGHT: usize = Self::BITS - FRAC_BITS - 1;

    /// Number of bits in the integer field.
    pub const INTEGER_BITS: usize = Self::BITS - FRAC_BITS - 1;

    /// Index of the most significant fraction bit (weight 1/2).
    pub const FRACTIONAL_LEFT: usize = Self::BITS - FRAC_BITS;

    /// Index of the least significant fraction bit (weight 2^-FRAC_BITS).
    pub const FRACTIONAL_RIGHT: usize = Self::BITS - 1;

    /// Number of bits in the fraction field.
    pub const FRACTIONAL_BITS: usize = FRAC_BITS;

    const LAYOUT: () = assert!(
        FRAC_BITS + 65 <= LIMBS * 64,
        "integer field must hold at least 64 bits"
    );

    /// Zero
    pub const ZERO: Self = Self::from_limbs([0; LIMBS]);

    /// One (1.0)
    pub const ONE: Self = Self::from_u64(1);

    /// Negative one (-1.0)
    pub const NEG_ONE: Self = Self::from_limbs(Self::whole_mask());

    /// Smallest positive value, 2^-FRAC_BITS.
    pub const EPSILON: Self = Self::from_limbs(Self::lowest_bit());

    /// Largest value: every bit but the sign bit set.
    pub const MAX: Self = Self::from_limbs(Self::sign_split(i64::MAX as u64, u64::MAX));

    /// Most negative value: only the sign bit set.
    pub const MIN: Self = Self::from_limbs(Self::sign_split(1 << 63, 0));

    const fn lowest_bit() -> [u64; LIMBS] {
        let mut limbs = [0; LIMBS];
        limbs[LIMBS - 1] = 1;
        limbs
    }

    const fn sign_split(top: u64, rest: u64) -> [u64; LIMBS] {
        let mut limbs = [rest; LIMBS];
        limbs[0] = top;
        limbs
    }

    /// Limbs with the sign and integer fields set and the fraction field clear.
    const fn whole_mask() -> [u64; LIMBS] {
        let mut mask = [u64::MAX; LIMBS];
        let mut i = 0;
        while i < LIMBS {
            // weight of this limb's least significant bit, as a power of two
            let base = (LIMBS - 1 - i) * 64;
            if FRAC_BITS >= base + 64 {
                mask[i] = 0;
            } else if FRAC_BITS > base {
                mask[i] = u64::MAX << (FRAC_BITS - base);
            }
            i += 1;
        }
        mask
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> Default for FixedPoint<LIMBS, FRAC_BITS> {
    fn default() -> Self {
        Self::ZERO
    }
}

// ============================================================================
// Storage and Bit Access
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Creates a value from raw limbs, most significant first.
    #[inline(always)]
    pub const fn from_limbs(limbs: [u64; LIMBS]) -> Self {
        let () = Self::LAYOUT;
        Self { limbs }
    }

    /// Returns the raw limbs, most significant first.
    #[inline(always)]
    pub const fn to_limbs(self) -> [u64; LIMBS] {
        self.limbs
    }

    #[inline(always)]
    const fn bit(&self, index: usize) -> bool {
        self.limbs[index / 64] & (1 << (63 - index % 64)) != 0
    }

    #[inline(always)]
    fn set_bit(&mut self, index: usize, value: bool) {
        let mask = 1u64 << (63 - index % 64);
        if value {
            self.limbs[index / 64] |= mask;
        } else {
            self.limbs[index / 64] &= !mask;
        }
    }

    /// Ones' complement of the whole word.
    #[inline(always)]
    fn flip(&mut self) {
        for limb in &mut self.limbs {
            *limb = !*limb;
        }
    }
}

// ============================================================================
// Construction
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Creates a value whose lowest 64 integer bits hold `value`.
    pub const fn from_u64(value: u64) -> Self {
        let mut limbs = [0u64; LIMBS];
        let word = FRAC_BITS / 64;
        let offset = FRAC_BITS % 64;
        limbs[LIMBS - 1 - word] = value << offset;
        if offset != 0 {
            limbs[LIMBS - 2 - word] = value >> (64 - offset);
        }
        Self::from_limbs(limbs)
    }

    /// Creates a value from a `u32`.
    #[inline(always)]
    pub const fn from_u32(value: u32) -> Self {
        Self::from_u64(value as u64)
    }

    /// Creates a value from an `i64`.
    ///
    /// The magnitude is stored first and the word is then negated when the
    /// source was negative.
    pub fn from_i64(value: i64) -> Self {
        let mut result = Self::from_u64(value.unsigned_abs());
        if value < 0 {
            result.invert();
        }
        result
    }

    /// Creates a value from an `i32`.
    #[inline(always)]
    pub fn from_i32(value: i32) -> Self {
        Self::from_i64(value as i64)
    }

    /// Creates a value from an `f64` by copying its mantissa bits into place.
    ///
    /// The mantissa (with its implicit leading one) is written from its least
    /// significant bit upward, starting at `INTEGER_RIGHT + 52 - exponent`.
    /// Bits landing past the end of the word are dropped without rounding;
    /// the walk stops once it passes bit 0. Negative inputs are negated
    /// afterward.
    ///
    /// Zero, subnormals, infinities and NaN all yield zero. Magnitudes of
    /// 2^(INTEGER_BITS) and above reach into the sign bit.
    pub fn from_f64(value: f64) -> Self {
        let parts = FloatParts::decompose(value);
        let mut result = Self::ZERO;

        let mut mantissa = parts.mantissa;
        let mut position =
            Self::INTEGER_RIGHT as i64 + FloatParts::MANTISSA_BITS as i64 - parts.exponent as i64;

        while mantissa != 0 && position >= 0 {
            if position < Self::BITS as i64 {
                result.set_bit(position as usize, mantissa & 1 == 1);
            }
            mantissa >>= 1;
            position -= 1;
        }

        if parts.negative {
            result.invert();
        }
        result
    }

    /// Creates a value from an `f64`, returning an error if any bit would be
    /// lost.
    ///
    /// - `NaN` and infinities return `InvalidFormat`
    /// - magnitudes that reach the sign bit return `Overflow`, except
    ///   `-2^(INTEGER_BITS)`, which is exactly `MIN`
    /// - set bits below 2^-FRAC_BITS (including subnormals) return `PrecisionLoss`
    pub fn try_from_f64(value: f64) -> crate::Result<Self> {
        if !value.is_finite() {
            return Err(FixedPointError::InvalidFormat);
        }
        if value == 0.0 {
            return Ok(Self::ZERO);
        }
        if value.is_subnormal() {
            return Err(FixedPointError::PrecisionLoss);
        }

        let parts = FloatParts::decompose(value);
        let top = Self::INTEGER_RIGHT as i64 - parts.exponent as i64;
        let is_min = top == Self::SIGN_BIT as i64
            && parts.negative
            && parts.mantissa == 1 << FloatParts::MANTISSA_BITS;
        if top < Self::INTEGER_LEFT as i64 && !is_min {
            return Err(FixedPointError::Overflow);
        }

        let lowest = top + FloatParts::MANTISSA_BITS as i64 - parts.mantissa.trailing_zeros() as i64;
        if lowest > Self::FRACTIONAL_RIGHT as i64 {
            return Err(FixedPointError::PrecisionLoss);
        }

        Ok(Self::from_f64(value))
    }

    /// Creates a value from a `"0b…"` literal holding the raw two's-complement
    /// bits.
    ///
    /// Characters are right-aligned: the last one maps to the least
    /// significant bit and each earlier one to the next bit up. Every
    /// character takes a position, but only `'0'` and `'1'` write a bit; the
    /// bit under any other character stays clear. Characters more than
    /// `BITS` from the end are ignored. Text without the `0b` prefix yields
    /// zero.
    pub fn from_binary_literal(literal: &str) -> Self {
        let mut result = Self::ZERO;
        let Some(digits) = literal.strip_prefix("0b") else {
            return result;
        };

        for (position, byte) in (0..Self::BITS).rev().zip(digits.bytes().rev()) {
            if byte == b'1' {
                result.set_bit(position, true);
            }
        }
        result
    }
}

/// Sign, unbiased exponent and mantissa of an IEEE-754 double.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FloatParts {
    negative: bool,
    exponent: i32,
    /// 53 bits, implicit leading one included.
    mantissa: u64,
}

impl FloatParts {
    const MANTISSA_BITS: u32 = 52;
    const EXPONENT_MASK: u64 = 0x7FF;
    const EXPONENT_BIAS: i32 = 1023;

    /// Splits `value` into its fields.
    ///
    /// The implicit leading one is restored for every input, including zero,
    /// subnormals and non-finite values.
    const fn decompose(value: f64) -> Self {
        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let exponent = ((bits >> Self::MANTISSA_BITS) & Self::EXPONENT_MASK) as i32 - Self::EXPONENT_BIAS;
        let mantissa = (bits & ((1 << Self::MANTISSA_BITS) - 1)) | (1 << Self::MANTISSA_BITS);
        Self {
            negative,
            exponent,
            mantissa,
        }
    }
}

// ============================================================================
// Sign Operations
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Negates in place using two's complement.
    ///
    /// Non-negative values are complemented and then stepped up by the
    /// smallest unit; negative values are stepped down first and then
    /// complemented. Zero and `MIN` map to themselves.
    pub fn invert(&mut self) {
        if self.is_negative() {
            self.decrement();
            self.flip();
        } else {
            self.flip();
            self.increment();
        }
    }

    /// Returns the two's-complement negation.
    #[inline]
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn inverted(&self) -> Self {
        let mut result = *self;
        result.invert();
        result
    }

    /// Wrapping absolute value. `MIN.abs()` is `MIN`.
    #[inline]
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn abs(self) -> Self {
        if self.is_negative() {
            self.inverted()
        } else {
            self
        }
    }

    /// Returns `true` if the sign bit is set.
    #[inline(always)]
    pub const fn is_negative(self) -> bool {
        self.bit(Self::SIGN_BIT)
    }

    /// Returns `true` if every bit is clear.
    #[inline]
    pub const fn is_zero(self) -> bool {
        let mut i = 0;
        while i < LIMBS {
            if self.limbs[i] != 0 {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Returns `true` if the value is greater than zero.
    #[inline]
    pub const fn is_positive(self) -> bool {
        !self.is_negative() && !self.is_zero()
    }

    /// Returns -1, 0 or 1 depending on the sign.
    #[inline]
    pub const fn signum(self) -> i32 {
        if self.is_negative() {
            -1
        } else if self.is_zero() {
            0
        } else {
            1
        }
    }
}

// ============================================================================
// Unit Steps
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Adds one unit of weight `position` by clearing trailing ones toward
    /// bit 0 and setting the first zero found. A carry out of bit 0 is lost.
    fn ripple_increment(&mut self, position: usize) {
        let mut index = position;
        loop {
            if !self.bit(index) {
                self.set_bit(index, true);
                return;
            }
            self.set_bit(index, false);
            if index == 0 {
                return;
            }
            index -= 1;
        }
    }

    /// Mirror of [`Self::ripple_increment`]: sets trailing zeros and clears
    /// the first one found.
    fn ripple_decrement(&mut self, position: usize) {
        let mut index = position;
        loop {
            if self.bit(index) {
                self.set_bit(index, false);
                return;
            }
            self.set_bit(index, true);
            if index == 0 {
                return;
            }
            index -= 1;
        }
    }

    /// Adds the smallest unit, 2^-FRAC_BITS.
    #[inline]
    pub fn increment(&mut self) {
        self.ripple_increment(Self::FRACTIONAL_RIGHT);
    }

    /// Subtracts the smallest unit, 2^-FRAC_BITS.
    #[inline]
    pub fn decrement(&mut self) {
        self.ripple_decrement(Self::FRACTIONAL_RIGHT);
    }

    /// Adds one whole unit, leaving the fraction field untouched, and returns
    /// the updated value.
    ///
    /// Unlike [`Self::increment`], the step starts at the least significant
    /// integer bit.
    #[inline]
    pub fn increment_integer(&mut self) -> Self {
        self.ripple_increment(Self::INTEGER_RIGHT);
        *self
    }

    /// Subtracts one whole unit and returns the updated value.
    #[inline]
    pub fn decrement_integer(&mut self) -> Self {
        self.ripple_decrement(Self::INTEGER_RIGHT);
        *self
    }

    /// Adds one whole unit and returns the value held before the step.
    #[inline]
    pub fn post_increment_integer(&mut self) -> Self {
        let previous = *self;
        self.ripple_increment(Self::INTEGER_RIGHT);
        previous
    }

    /// Subtracts one whole unit and returns the value held before the step.
    #[inline]
    pub fn post_decrement_integer(&mut self) -> Self {
        let previous = *self;
        self.ripple_decrement(Self::INTEGER_RIGHT);
        previous
    }
}

// ============================================================================
// Arithmetic Operations - Addition and Subtraction
// ============================================================================

/// Carry out of one limb of the ripple adder.
///
/// `MAX - acc - carry_in < addend` detects the wrap; the second disjunct
/// covers `acc == MAX` with a pending carry, where the headroom itself wraps.
#[inline(always)]
const fn limb_carry(acc: u64, addend: u64, carry_in: bool) -> bool {
    let headroom = (u64::MAX - acc).wrapping_sub(carry_in as u64);
    headroom < addend || (carry_in && acc == u64::MAX)
}

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Ripple-carry addition from the least significant limb up. The carry out
    /// of the top limb is discarded.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub const fn wrapping_add(self, rhs: Self) -> Self {
        let mut limbs = self.limbs;
        let mut carry = false;
        let mut i = LIMBS;
        while i > 0 {
            i -= 1;
            let acc = limbs[i];
            let addend = rhs.limbs[i];
            limbs[i] = acc.wrapping_add(addend).wrapping_add(carry as u64);
            carry = i != 0 && limb_carry(acc, addend, carry);
        }
        Self { limbs }
    }

    /// `self + (-rhs)`.
    #[inline]
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn wrapping_sub(self, rhs: Self) -> Self {
        self.wrapping_add(rhs.inverted())
    }
}

// ============================================================================
// Arithmetic Operations - Shifts
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Logical shift toward bit 0, filling with zeros.
    fn shifted_left(self, shift: usize) -> Self {
        if shift >= Self::BITS {
            return Self::ZERO;
        }

        let words = shift / 64;
        let bits = shift % 64;
        let mut limbs = [0u64; LIMBS];
        for (i, limb) in limbs.iter_mut().enumerate().take(LIMBS - words) {
            let source = i + words;
            *limb = self.limbs[source] << bits;
            if bits != 0 && source + 1 < LIMBS {
                *limb |= self.limbs[source + 1] >> (64 - bits);
            }
        }
        Self { limbs }
    }

    /// Arithmetic shift away from bit 0, filling with the sign bit.
    fn shifted_right(self, shift: usize) -> Self {
        let fill = if self.is_negative() { u64::MAX } else { 0 };
        if shift >= Self::BITS {
            return Self { limbs: [fill; LIMBS] };
        }

        let words = shift / 64;
        let bits = shift % 64;
        let source = |index: usize| {
            if index < words {
                fill
            } else {
                self.limbs[index - words]
            }
        };

        let mut limbs = [fill; LIMBS];
        for (i, limb) in limbs.iter_mut().enumerate() {
            *limb = source(i) >> bits;
            if bits != 0 {
                let above = if i == 0 { fill } else { source(i - 1) };
                *limb |= above << (64 - bits);
            }
        }
        Self { limbs }
    }

    /// Left shift for non-negative `shift`, arithmetic right shift by the
    /// magnitude otherwise.
    fn shifted(self, shift: i64) -> Self {
        let magnitude = usize::try_from(shift.unsigned_abs()).unwrap_or(usize::MAX);
        if shift < 0 {
            self.shifted_right(magnitude)
        } else {
            self.shifted_left(magnitude)
        }
    }
}

// ============================================================================
// Arithmetic Operations - Multiplication
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Shift-and-add multiplication, wrapping modulo the word width.
    ///
    /// The multiplier is read as an unsigned bit stream from its least
    /// significant limb up. A set bit of weight 2^s adds `self << s`; for
    /// fraction bits `s` is negative and the shift is arithmetic to the right,
    /// truncating toward negative infinity.
    ///
    /// A negative multiplier yields the signed product only when `self` is a
    /// whole number. Otherwise its high sign bits each add a fractional
    /// multiplicand that does not cancel modulo the word width, e.g.
    /// `1.5 * -2` is `2^(INTEGER_BITS) - 3`, not `-3`.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn wrapping_mul(self, rhs: Self) -> Self {
        let mut product = Self::ZERO;
        let mut base = -(FRAC_BITS as i64);

        for &limb in rhs.limbs.iter().rev() {
            let mut remaining = limb;
            let mut shift = base;
            while remaining != 0 {
                if remaining & 1 == 1 {
                    product = product.wrapping_add(self.shifted(shift));
                }
                remaining >>= 1;
                shift += 1;
            }
            base += 64;
        }
        product
    }
}

// ============================================================================
// Rounding
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Clears the fraction field, rounding toward negative infinity.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub const fn floor(self) -> Self {
        let mask = Self::whole_mask();
        let mut limbs = self.limbs;
        let mut i = 0;
        while i < LIMBS {
            limbs[i] &= mask[i];
            i += 1;
        }
        Self { limbs }
    }

    /// Keeps only the fraction field. The result is always in `[0, 1)`.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub const fn fract(self) -> Self {
        let mask = Self::whole_mask();
        let mut limbs = self.limbs;
        let mut i = 0;
        while i < LIMBS {
            limbs[i] &= !mask[i];
            i += 1;
        }
        Self { limbs }
    }
}

// ============================================================================
// Integer Conversions
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Lowest 64 bits of the integer field.
    const fn integer_low(&self) -> u64 {
        let word = FRAC_BITS / 64;
        let offset = FRAC_BITS % 64;
        let low = self.limbs[LIMBS - 1 - word] >> offset;
        if offset == 0 {
            low
        } else {
            low | (self.limbs[LIMBS - 2 - word] << (64 - offset))
        }
    }

    /// Lowest 64 integer bits, read through the magnitude for negative values
    /// and negated back with wrapping.
    fn truncated_bits(self) -> u64 {
        if self.is_negative() {
            self.inverted().integer_low().wrapping_neg()
        } else {
            self.integer_low()
        }
    }

    /// Integer part truncated toward zero, or `Overflow` if it needs more
    /// than 64 bits of magnitude.
    fn truncated_integer(self) -> crate::Result<i128> {
        let negative = self.is_negative();
        let magnitude = if negative { self.inverted() } else { self };

        // MIN is its own negation
        if magnitude.is_negative() || !magnitude.shifted_right(FRAC_BITS + 64).is_zero() {
            return Err(FixedPointError::Overflow);
        }

        let low = magnitude.integer_low() as i128;
        Ok(if negative { -low } else { low })
    }

    /// Integer part truncated toward zero, wrapped to 64 bits.
    #[inline]
    pub fn to_i64(self) -> i64 {
        self.truncated_bits() as i64
    }

    /// Integer part truncated toward zero, wrapped to 32 bits.
    #[inline]
    pub fn to_i32(self) -> i32 {
        self.truncated_bits() as i32
    }

    /// Integer part reinterpreted as `u64`. Negative values wrap.
    #[inline]
    pub fn to_u64(self) -> u64 {
        self.truncated_bits()
    }

    /// Integer part reinterpreted as `u32`. Negative values wrap.
    #[inline]
    pub fn to_u32(self) -> u32 {
        self.truncated_bits() as u32
    }

    /// Truncated integer part, or `Overflow` if it does not fit an `i64`.
    pub fn try_to_i64(self) -> crate::Result<i64> {
        i64::try_from(self.truncated_integer()?).map_err(|_| FixedPointError::Overflow)
    }

    /// Truncated integer part, or `Overflow` if it does not fit an `i32`.
    pub fn try_to_i32(self) -> crate::Result<i32> {
        i32::try_from(self.truncated_integer()?).map_err(|_| FixedPointError::Overflow)
    }

    /// Truncated integer part, or `Overflow` if it does not fit a `u64`.
    pub fn try_to_u64(self) -> crate::Result<u64> {
        u64::try_from(self.truncated_integer()?).map_err(|_| FixedPointError::Overflow)
    }

    /// Truncated integer part, or `Overflow` if it does not fit a `u32`.
    pub fn try_to_u32(self) -> crate::Result<u32> {
        u32::try_from(self.truncated_integer()?).map_err(|_| FixedPointError::Overflow)
    }
}

// ============================================================================
// Float Conversions
// ============================================================================

/// 2^exponent, built directly from IEEE-754 bits.
const fn pow2(exponent: i32) -> f64 {
    if exponent > 1023 {
        f64::INFINITY
    } else if exponent < -1022 {
        0.0
    } else {
        f64::from_bits(((exponent + 1023) as u64) << 52)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Converts to `f64`.
    ///
    /// Exact for values with at most 53 significant bits; otherwise each limb
    /// is rounded on its own, so the result may be off by a few ulps.
    pub fn to_f64(self) -> f64 {
        let negative = self.is_negative();
        let magnitude = if negative { self.inverted() } else { self };

        let mut value = 0.0;
        for (i, &limb) in magnitude.limbs.iter().enumerate() {
            let weight = ((LIMBS - 1 - i) * 64) as i32 - FRAC_BITS as i32;
            value += limb as f64 * pow2(weight);
        }

        if negative { -value } else { value }
    }
}

// ============================================================================
// String Parsing
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Parses raw two's-complement bits strictly.
    ///
    /// Accepts an optional `0b` prefix followed by `'0'`/`'1'` digits, with
    /// `'_'` and `' '` allowed as separators. Digits are right-aligned, so
    /// both the plain and the `{:#}` rendering parse back to the same value.
    pub fn from_str_exact(s: &str) -> crate::Result<Self> {
        let digits = s.strip_prefix("0b").unwrap_or(s);
        let mut result = Self::ZERO;
        let mut position = Self::BITS;

        for byte in digits.bytes().rev() {
            let value = match byte {
                b'0' => false,
                b'1' => true,
                b'_' | b' ' => continue,
                _ => return Err(FixedPointError::InvalidFormat),
            };
            if position == 0 {
                return Err(FixedPointError::Overflow);
            }
            position -= 1;
            result.set_bit(position, value);
        }

        if position == Self::BITS {
            return Err(FixedPointError::InvalidFormat);
        }
        Ok(result)
    }

    /// Parse from byte slice (useful for binary protocols)
    pub fn from_utf8_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let s = core::str::from_utf8(bytes).map_err(|_| FixedPointError::InvalidFormat)?;
        Self::from_str_exact(s)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> FromStr for FixedPoint<LIMBS, FRAC_BITS> {
    type Err = FixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_exact(s)
    }
}

// ============================================================================
// Formatting
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> FixedPoint<LIMBS, FRAC_BITS> {
    /// Writes the bits in `range` as ASCII digits, most significant first.
    fn write_bits(&self, f: &mut fmt::Formatter<'_>, range: Range<usize>) -> fmt::Result {
        let mut buffer = [0u8; 64];
        let mut len = 0;

        for index in range {
            buffer[len] = if self.bit(index) { b'1' } else { b'0' };
            len += 1;
            if len == buffer.len() {
                f.write_str(core::str::from_utf8(&buffer).map_err(|_| fmt::Error)?)?;
                len = 0;
            }
        }

        if len > 0 {
            f.write_str(core::str::from_utf8(&buffer[..len]).map_err(|_| fmt::Error)?)?;
        }
        Ok(())
    }

    /// Renders the sign, integer and fraction fields as binary digits,
    /// optionally separated by single spaces.
    #[cfg(feature = "alloc")]
    pub fn to_binary(&self, add_spaces: bool) -> alloc::string::String {
        if add_spaces {
            alloc::format!("{self:#}")
        } else {
            alloc::format!("{self}")
        }
    }
}

/// Raw two's-complement bits: sign, integer field, fraction field.
///
/// `{:#}` separates the three fields with spaces.
impl<const LIMBS: usize, const FRAC_BITS: usize> fmt::Display for FixedPoint<LIMBS, FRAC_BITS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if f.alternate() { " " } else { "" };

        self.write_bits(f, Self::SIGN_BIT..Self::INTEGER_LEFT)?;
        f.write_str(separator)?;
        self.write_bits(f, Self::INTEGER_LEFT..Self::FRACTIONAL_LEFT)?;
        f.write_str(separator)?;
        self.write_bits(f, Self::FRACTIONAL_LEFT..Self::BITS)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> fmt::Debug for FixedPoint<LIMBS, FRAC_BITS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            // {:#?} shows raw limbs
            f.debug_struct("FixedPoint")
                .field("limbs", &self.limbs)
                .finish()
        } else {
            write!(f, "FixedPoint({:#})", self)
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> Ord for FixedPoint<LIMBS, FRAC_BITS> {
    fn cmp(&self, other: &Self) -> Ordering {
        // flipping the sign bit maps two's complement onto unsigned order
        let mut lhs = self.limbs;
        let mut rhs = other.limbs;
        lhs[0] ^= 1 << 63;
        rhs[0] ^= 1 << 63;
        lhs.cmp(&rhs)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> PartialOrd for FixedPoint<LIMBS, FRAC_BITS> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Operator Overloading
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> Add for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: Self) -> Self::Output {
        self.wrapping_add(rhs)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> Sub for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline(always)]
    fn sub(self, rhs: Self) -> Self::Output {
        self.wrapping_sub(rhs)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> Mul for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline(always)]
    fn mul(self, rhs: Self) -> Self::Output {
        self.wrapping_mul(rhs)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> Neg for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        self.inverted()
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> AddAssign for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> SubAssign for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> MulAssign for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

/// Negative amounts shift right instead.
impl<const LIMBS: usize, const FRAC_BITS: usize> Shl<i32> for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline]
    fn shl(self, shift: i32) -> Self::Output {
        self.shifted(shift as i64)
    }
}

/// Negative amounts shift left instead.
impl<const LIMBS: usize, const FRAC_BITS: usize> Shr<i32> for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline]
    fn shr(self, shift: i32) -> Self::Output {
        self.shifted(-(shift as i64))
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> Shl<u32> for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline]
    fn shl(self, shift: u32) -> Self::Output {
        self.shifted_left(shift as usize)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> Shr<u32> for FixedPoint<LIMBS, FRAC_BITS> {
    type Output = Self;

    #[inline]
    fn shr(self, shift: u32) -> Self::Output {
        self.shifted_right(shift as usize)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> ShlAssign<i32> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline]
    fn shl_assign(&mut self, shift: i32) {
        *self = *self << shift;
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> ShrAssign<i32> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline]
    fn shr_assign(&mut self, shift: i32) {
        *self = *self >> shift;
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> ShlAssign<u32> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline]
    fn shl_assign(&mut self, shift: u32) {
        *self = *self << shift;
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> ShrAssign<u32> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline]
    fn shr_assign(&mut self, shift: u32) {
        *self = *self >> shift;
    }
}

// ============================================================================
// Standard Library Trait Implementations
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> From<i64> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<i32> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn from(value: i32) -> Self {
        Self::from_i32(value)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<u64> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<u32> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<f64> for FixedPoint<LIMBS, FRAC_BITS> {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<FixedPoint<LIMBS, FRAC_BITS>> for i64 {
    #[inline(always)]
    fn from(value: FixedPoint<LIMBS, FRAC_BITS>) -> Self {
        value.to_i64()
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<FixedPoint<LIMBS, FRAC_BITS>> for i32 {
    #[inline(always)]
    fn from(value: FixedPoint<LIMBS, FRAC_BITS>) -> Self {
        value.to_i32()
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<FixedPoint<LIMBS, FRAC_BITS>> for u64 {
    #[inline(always)]
    fn from(value: FixedPoint<LIMBS, FRAC_BITS>) -> Self {
        value.to_u64()
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> From<FixedPoint<LIMBS, FRAC_BITS>> for u32 {
    #[inline(always)]
    fn from(value: FixedPoint<LIMBS, FRAC_BITS>) -> Self {
        value.to_u32()
    }
}

// ============================================================================
// Iterator Trait Implementations
// ============================================================================

impl<const LIMBS: usize, const FRAC_BITS: usize> Sum for FixedPoint<LIMBS, FRAC_BITS> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl<'a, const LIMBS: usize, const FRAC_BITS: usize> Sum<&'a FixedPoint<LIMBS, FRAC_BITS>>
    for FixedPoint<LIMBS, FRAC_BITS>
{
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + *x)
    }
}

impl<const LIMBS: usize, const FRAC_BITS: usize> Product for FixedPoint<LIMBS, FRAC_BITS> {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ONE, |acc, x| acc * x)
    }
}

impl<'a, const LIMBS: usize, const FRAC_BITS: usize> Product<&'a FixedPoint<LIMBS, FRAC_BITS>>
    for FixedPoint<LIMBS, FRAC_BITS>
{
    fn product<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ONE, |acc, x| acc * *x)
    }
}

// ============================================================================
// Serde Support
// ============================================================================

#[cfg(feature = "serde")]
impl<const LIMBS: usize, const FRAC_BITS: usize> Serialize for FixedPoint<LIMBS, FRAC_BITS> {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            // JSON, TOML, etc. - canonical bit string without allocating
            serializer.collect_str(self)
        } else {
            // Bincode, MessagePack, etc. - raw limbs
            let mut tuple = serializer.serialize_tuple(LIMBS)?;
            for limb in &self.limbs {
                tuple.serialize_element(limb)?;
            }
            tuple.end()
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, const LIMBS: usize, const FRAC_BITS: usize> Deserialize<'de>
    for FixedPoint<LIMBS, FRAC_BITS>
{
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = alloc::string::String::deserialize(deserializer)?;
            Self::from_str(&s).map_err(de::Error::custom)
        } else {
            deserializer.deserialize_tuple(LIMBS, LimbsVisitor::<LIMBS, FRAC_BITS>)
        }
    }
}

#[cfg(feature = "serde")]
struct LimbsVisitor<const LIMBS: usize, const FRAC_BITS: usize>;

#[cfg(feature = "serde")]
impl<'de, const LIMBS: usize, const FRAC_BITS: usize> de::Visitor<'de>
    for LimbsVisitor<LIMBS, FRAC_BITS>
{
    type Value = FixedPoint<LIMBS, FRAC_BITS>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a tuple of {} u64 limbs", LIMBS)
    }

    fn visit_seq<A>(self, mut seq: A) -> core::result::Result<Self::Value, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let mut limbs = [0u64; LIMBS];
        for (index, limb) in limbs.iter_mut().enumerate() {
            *limb = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(index, &self))?;
        }
        Ok(FixedPoint::from_limbs(limbs))
    }
}
