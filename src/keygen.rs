//! Paillier key generation and Shamir secret sharing of the private
//! exponent (spec §4.1).
//!
//! Grounded on `fs_dkr::ring_pedersen_proof::RingPedersenStatement::generate`,
//! which derives `phi = (p-1)(q-1)` from a `kzen-paillier` keypair the same
//! way this module derives `λ`; the Shamir polynomial evaluation follows the
//! Horner's-method share computation used by
//! `electionguard-rust::guardian_secret_key` (see `DESIGN.md`).

use crate::bigint::{factorial, l_function, mod_exp, sample_below};
use crate::codec;
use crate::error::{ThresholdError, ThresholdResult};
use curv::arithmetic::traits::*;
use curv::BigInt;
use paillier::{EncryptionKey, KeyGeneration, Paillier};
use serde::{Deserialize, Serialize};

/// Minimum Paillier modulus bit length this crate will generate keys at.
pub const MIN_KEY_BIT_LENGTH: usize = 512;
pub const DEFAULT_KEY_BIT_LENGTH: usize = 2048;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub total_shares: u16,
    pub threshold: u16,
    pub key_bit_length: usize,
}

impl ThresholdConfig {
    pub fn new(total_shares: u16, threshold: u16, key_bit_length: usize) -> Self {
        Self {
            total_shares,
            threshold,
            key_bit_length,
        }
    }

    pub fn validate(&self) -> ThresholdResult<()> {
        if self.total_shares < 2 {
            return Err(ThresholdError::InvalidThresholdConfig(
                "totalShares must be >= 2".into(),
            ));
        }
        if self.threshold < 2 || self.threshold > self.total_shares {
            return Err(ThresholdError::InvalidThresholdConfig(
                "threshold must satisfy 2 <= k <= n".into(),
            ));
        }
        if self.key_bit_length < MIN_KEY_BIT_LENGTH {
            return Err(ThresholdError::InvalidThresholdConfig(format!(
                "keyBitLength must be >= {}",
                MIN_KEY_BIT_LENGTH
            )));
        }
        Ok(())
    }
}

/// The Paillier public key, `(n, g)`. Homomorphic operations live here
/// because every aggregator in `aggregate.rs` only ever needs the public
/// key, never a share.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "crate::codec::serde_bigint")]
    pub n: BigInt,
    #[serde(with = "crate::codec::serde_bigint")]
    pub g: BigInt,
}

impl PublicKey {
    pub fn n_squared(&self) -> BigInt {
        &self.n * &self.n
    }

    /// Homomorphic ciphertext addition: `Enc(a) · Enc(b) mod n² = Enc(a+b mod n)`.
    pub fn add(&self, c1: &BigInt, c2: &BigInt) -> BigInt {
        BigInt::mod_mul(c1, c2, &self.n_squared())
    }

    /// Homomorphic scalar multiplication: `Enc(a)^s mod n² = Enc(s·a mod n)`.
    pub fn scalar_mul(&self, ciphertext: &BigInt, scalar: &BigInt) -> BigInt {
        mod_exp(ciphertext, scalar, &self.n_squared())
    }

    /// Identity ciphertext `Enc(0) = 1`, the start value for homomorphic sums.
    pub fn identity(&self) -> BigInt {
        BigInt::one()
    }
}

/// A single Guardian's share of the private exponent, `{index, share, vᵢ}`.
/// `share` is single-owner material once distributed; callers that persist
/// it are responsible for protecting it, this type only guarantees it is
/// never logged (`Debug` is implemented by hand to redact it).
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyShare {
    pub index: u16,
    #[serde(with = "crate::codec::serde_bigint")]
    pub share: BigInt,
    #[serde(with = "crate::codec::serde_bigint")]
    pub verification_key: BigInt,
}

impl std::fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShare")
            .field("index", &self.index)
            .field("share", &"<redacted>")
            .field("verification_key", &codec::to_hex(&self.verification_key))
            .finish()
    }
}

impl KeyShare {
    /// Checks the invariant `vᵢ ≡ g^share (mod n²)`.
    pub fn verify_consistency(&self, public_key: &PublicKey) -> bool {
        mod_exp(&public_key.g, &self.share, &public_key.n_squared()) == self.verification_key
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdKeyPair {
    pub public_key: PublicKey,
    pub verification_keys: Vec<BigInt>,
    pub key_shares: Vec<KeyShare>,
    pub config: ThresholdConfig,
    #[serde(with = "crate::codec::serde_bigint")]
    pub theta: BigInt,
}

impl ThresholdKeyPair {
    pub fn verification_key_for(&self, index: u16) -> Option<&BigInt> {
        if index == 0 || index as usize > self.verification_keys.len() {
            return None;
        }
        Some(&self.verification_keys[(index - 1) as usize])
    }
}

/// Produces a fresh threshold Paillier keypair from a single trusted dealer
/// (spec §4.1). The private exponent `λ` is local to this function and is
/// dropped once shares and `θ` are derived — it never appears in the
/// returned `ThresholdKeyPair`.
pub struct KeyGenerator;

impl KeyGenerator {
    pub fn generate(config: ThresholdConfig) -> ThresholdResult<ThresholdKeyPair> {
        config.validate()?;

        let (ek, dk) = Paillier::keypair_with_modulus_size(config.key_bit_length).keys();
        let EncryptionKey { n, .. } = ek;
        let p = dk.p.clone();
        let q = dk.q.clone();

        let one = BigInt::one();
        let lambda = (&p - &one) * (&q - &one);
        let g = &n + &one;
        let n_squared = &n * &n;

        let m = &n * &lambda;

        let k = config.threshold as usize;
        // f(x) = lambda + a_1 x + ... + a_{k-1} x^{k-1}, coefficients low-to-high degree.
        let mut coefficients: Vec<BigInt> = Vec::with_capacity(k);
        coefficients.push(lambda.clone());
        for _ in 1..k {
            coefficients.push(sample_below(&m));
        }

        let n_shares = config.total_shares;
        let mut key_shares = Vec::with_capacity(n_shares as usize);
        let mut verification_keys = Vec::with_capacity(n_shares as usize);

        for i in 1..=n_shares {
            let x = BigInt::from(i as i64);
            let s_i = evaluate_polynomial(&coefficients, &x, &m);
            let v_i = mod_exp(&g, &s_i, &n_squared);
            verification_keys.push(v_i.clone());
            key_shares.push(KeyShare {
                index: i,
                share: s_i,
                verification_key: v_i,
            });
        }

        let delta = factorial(n_shares);
        let four_delta_lambda = BigInt::from(4) * &delta * &lambda;
        let raised = mod_exp(&g, &four_delta_lambda, &n_squared);
        let l = l_function(&raised, &n).ok_or_else(|| {
            ThresholdError::KeyGenerationFailed("theta L-function precondition violated".into())
        })?;
        let theta = l % &n;

        tracing::info!(
            total_shares = n_shares,
            threshold = k,
            key_bit_length = config.key_bit_length,
            "threshold keypair generated"
        );

        Ok(ThresholdKeyPair {
            public_key: PublicKey { n, g },
            verification_keys,
            key_shares,
            config,
            theta,
        })
    }
}

/// Horner's-method evaluation of `f(x) mod m` from low-to-high-degree
/// coefficients.
fn evaluate_polynomial(coefficients: &[BigInt], x: &BigInt, m: &BigInt) -> BigInt {
    let mut acc = BigInt::zero();
    for coeff in coefficients.iter().rev() {
        acc = (&acc * x + coeff) % m;
    }
    acc
}
