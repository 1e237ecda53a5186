//! Heap-side arbitrary precision integers.
//!
//! Python has one `int` type; Monty stores values fitting a machine word as
//! `Value::Int(i64)` and promotes to a heap `BigInt` on overflow. The two
//! forms are representationally transparent: [`int_to_value`] is the single
//! normalization point, demoting any big value that fits back to the small
//! form, so no operation can observe which storage an int uses.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    heap::{Heap, HeapData},
    py_hash::{HASH_MODULUS, hash_i64},
    resource::{ResourceError, ResourceTracker},
    value::Value,
};

/// Normalizes a `BigInt` into a value, demoting to `i64` when it fits.
pub(crate) fn int_to_value(big: BigInt, heap: &mut Heap<impl ResourceTracker>) -> Result<Value, ResourceError> {
    if let Some(small) = big.to_i64() {
        Ok(Value::Int(small))
    } else {
        Ok(Value::Ref(heap.allocate(HeapData::LongInt(big))?))
    }
}

/// Hashes a heap integer: `n mod (2^61 - 1)`, sign preserved.
///
/// For values within `i64` this delegates to the machine-word algorithm so
/// both storage forms of the same mathematical value are guaranteed to hash
/// identically, which the dict/set invariants depend on.
#[must_use]
pub(crate) fn hash_big_int(value: &BigInt) -> u64 {
    if let Some(small) = value.to_i64() {
        return hash_i64(small);
    }
    let modulus = BigInt::from(HASH_MODULUS);
    let remainder = value % &modulus;
    // remainder has the sign of `value` and magnitude < 2^61, so it fits i64
    let result = remainder.to_i64().unwrap_or(0);
    let adjusted = if result == -1 { -2 } else { result };
    adjusted as u64
}

/// Estimated result size in bytes of `base ** exponent`; `None` on overflow.
pub(crate) fn estimate_pow_bytes(base_bits: u64, exponent: u64) -> Option<usize> {
    let result_bits = base_bits.checked_mul(exponent)?;
    usize::try_from(result_bits.div_ceil(8)).ok()
}

/// Estimated result size in bytes of `value << shift`; `None` on overflow.
pub(crate) fn estimate_shift_bytes(value_bits: u64, shift: u64) -> Option<usize> {
    let result_bits = value_bits.checked_add(shift)?;
    usize::try_from(result_bits.div_ceil(8)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_int_hash_matches_small_form() {
        for n in [0i64, 1, -1, 42, i64::MAX, i64::MIN + 1] {
            assert_eq!(hash_big_int(&BigInt::from(n)), hash_i64(n));
        }
    }

    #[test]
    fn big_int_hash_is_stable_across_constructions() {
        let a = BigInt::from(2).pow(100);
        let b = BigInt::from(2).pow(100);
        assert_eq!(hash_big_int(&a), hash_big_int(&b));
        // 2^100 mod (2^61 - 1): 2^100 = 2^61 * 2^39, and 2^61 ≡ 1, so ≡ 2^39
        assert_eq!(hash_big_int(&a), hash_i64(1 << 39));
    }

    #[test]
    fn negative_big_int_hash() {
        let n = -BigInt::from(2).pow(100);
        assert_eq!(hash_big_int(&n) as i64, -(1i64 << 39));
    }
}
