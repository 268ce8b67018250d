//! Modular arithmetic helpers shared by key generation, partial decryption
//! and combining.
//!
//! Thin wrappers over `curv::BigInt`, kept in one place so the rest of the
//! crate reads in terms of the scheme's vocabulary (`mod_exp`, `l_function`,
//! `lagrange_coefficient`) rather than raw `curv::arithmetic` trait calls,
//! the same separation `fs_dkr::ring_pedersen_proof` keeps informally inline.

use curv::arithmetic::traits::*;
use curv::BigInt;

/// `base^exp mod modulus`, exponent assumed non-negative.
pub fn mod_exp(base: &BigInt, exp: &BigInt, modulus: &BigInt) -> BigInt {
    BigInt::mod_pow(base, exp, modulus)
}

/// `base^exp mod modulus` for a possibly-negative `exp`, inverting `base`
/// first when `exp < 0`. Used by Lagrange combining (spec §4.3 step 4),
/// where coefficients can be negative integers.
pub fn mod_exp_signed(base: &BigInt, exp: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    if exp < &BigInt::zero() {
        let inv = BigInt::mod_inv(base, modulus)?;
        let pos_exp = -exp;
        Some(BigInt::mod_pow(&inv, &pos_exp, modulus))
    } else {
        Some(BigInt::mod_pow(base, exp, modulus))
    }
}

pub fn mod_inverse(a: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    BigInt::mod_inv(a, modulus)
}

/// The Paillier `L` function: `L(u) = (u - 1) / n`, defined for `u ≡ 1 (mod n)`.
/// Returns `None` if `u` is not congruent to 1 mod `n` (a corrupted ciphertext
/// or combined value — callers treat this as `CombineFailed`).
pub fn l_function(u: &BigInt, n: &BigInt) -> Option<BigInt> {
    let u_minus_one = u - BigInt::one();
    if (&u_minus_one % n) != BigInt::zero() {
        return None;
    }
    Some(u_minus_one / n)
}

/// `n!`, used as the Shamir scaling factor `Δ` (spec §4.1 step 5). `n` is the
/// guardian count, always small, so a naive product is fine.
pub fn factorial(n: u16) -> BigInt {
    let mut acc = BigInt::one();
    for i in 2..=n {
        acc *= BigInt::from(i as i64);
    }
    acc
}

/// Sample a uniformly random value in `[0, bound)`.
pub fn sample_below(bound: &BigInt) -> BigInt {
    BigInt::sample_below(bound)
}
