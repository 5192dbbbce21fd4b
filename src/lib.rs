//! Wide signed fixed-point numbers with a binary radix point
//!
//! Values are stored as a single two's-complement word made of 64-bit limbs,
//! with a fixed number of bits after the radix point:
//!
//! - **`FixedPoint256`**: 256-bit, 1 sign bit, 191 integer bits, 64 fractional bits
//!   - Limbs: `left`, `middle`, `right`, `fractional`
//!   - Resolution: 2^-64
//!
//! - **`FixedPoint128`**: 128-bit, 1 sign bit, 87 integer bits, 40 fractional bits
//!
//! ## Features
//!
//! - **Wrapping arithmetic**: addition, subtraction and shift-and-add
//!   multiplication, all modulo the word width
//! - **Exact bit layout**: construct from raw binary literals and render the
//!   sign, integer and fraction fields bit for bit
//! - **no_std compatible**: `alloc` only gates `to_binary`
//! - **Serde support**: bit strings for JSON, raw limbs for binary formats
//!
//! ## Example
//!
//! ```rust
//! use fixwide::FixedPoint256;
//!
//! let price = FixedPoint256::from_f64(2.5);
//! let quantity = FixedPoint256::from_i64(4);
//! let total = price * quantity;
//! assert_eq!(total.to_i64(), 10);
//!
//! let mut counter = FixedPoint256::from_i64(-1);
//! counter.increment_integer();
//! assert!(counter.is_zero());
//!
//! let lit = FixedPoint256::from_binary_literal("0b101");
//! assert_eq!(lit.to_limbs(), [0, 0, 0, 5]);
//! ```

#![no_std]
#![cfg_attr(test, allow(unused_imports))]

#[cfg(test)]
extern crate std;

#[cfg(feature = "alloc")]
extern crate alloc;

mod fixed;

pub use fixed::{FixedPoint, FixedPoint128, FixedPoint256};

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("overflow: value too large to represent")]
    Overflow,

    #[error("invalid string format")]
    InvalidFormat,

    #[error("precision loss would occur")]
    PrecisionLoss,
}

pub type Result<T> = core::result::Result<T, FixedPointError>;
