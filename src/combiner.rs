//! Combining `k` verified partial decryptions into a plaintext tally via
//! integer Lagrange interpolation "in the exponent" (spec §4.3).
//!
//! The Lagrange-at-zero shape is grounded on the
//! `lagrange_interpolation_at_zero` test helper in
//! `microsoft-electionguard-rust::guardian_share`, generalized here to the
//! signed integer coefficients the spec's scaled-by-`Δ` construction
//! requires (electionguard's version works mod a prime field and never
//! needs a sign case).

use crate::bigint::{factorial, l_function, mod_exp_signed, mod_inverse};
use crate::error::{ThresholdError, ThresholdResult};
use crate::keygen::{PublicKey, ThresholdConfig};
use crate::partial::{ChaumPedersenProof, PartialDecryption, PartialDecryptionService};
use curv::arithmetic::traits::*;
use curv::cryptographic_primitives::hashing::{Digest, DigestExt};
use curv::BigInt;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedProof {
    pub partial_proofs: Vec<ChaumPedersenProof>,
    #[serde(with = "crate::codec::serde_bigint")]
    pub aggregated_commitment: BigInt,
    #[serde(with = "crate::codec::serde_bigint")]
    pub input_hash: BigInt,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedDecryption {
    #[serde(with = "crate::codec::serde_bigint_vec")]
    pub tallies: Vec<BigInt>,
    pub combined_proof: CombinedProof,
    pub participating_guardians: Vec<u16>,
    pub ceremony_id: String,
    pub timestamp: u64,
}

/// `H(ct[0] ∥ ct[1] ∥ ...)`, reduced to a `BigInt` for auditor re-derivation.
pub fn hash_encrypted_tally(encrypted_tally: &[BigInt]) -> BigInt {
    let mut hasher = Sha256::new();
    for ct in encrypted_tally {
        hasher = hasher.chain_bigint(ct);
    }
    hasher.result_bigint()
}

/// Integer Lagrange coefficient `λᵢ = Δ · Πⱼ (j / (j - i))` for `j` ranging
/// over `subset \ {i}`. `Δ = n!` guarantees every denominator divides it
/// exactly (spec §4.3 step 4).
fn lagrange_coefficient(i: u16, subset: &[u16], delta: &BigInt) -> BigInt {
    let mut numerator = delta.clone();
    let mut denominator = BigInt::one();
    for &j in subset {
        if j == i {
            continue;
        }
        numerator *= BigInt::from(j as i64);
        denominator *= BigInt::from(j as i64 - i as i64);
    }
    let remainder = &numerator % &denominator;
    debug_assert_eq!(
        remainder,
        BigInt::zero(),
        "Δ = n! must make every Lagrange denominator divide exactly"
    );
    numerator / denominator
}

pub struct DecryptionCombiner;

impl DecryptionCombiner {
    /// Combines `partials` (at least `config.threshold` of them) into a
    /// plaintext tally. Partials are verified against `verification_keys`
    /// (1-indexed by Guardian index) before being trusted.
    pub fn combine(
        partials: &[PartialDecryption],
        encrypted_tally: &[BigInt],
        verification_keys: &[BigInt],
        public_key: &PublicKey,
        theta: &BigInt,
        config: &ThresholdConfig,
        timestamp: u64,
    ) -> ThresholdResult<CombinedDecryption> {
        if encrypted_tally.is_empty() {
            return Err(ThresholdError::CombineFailed(
                "encrypted tally is empty".into(),
            ));
        }
        let k = config.threshold as usize;
        if partials.len() < k {
            return Err(ThresholdError::InsufficientPartials {
                have: partials.len(),
                need: k,
            });
        }

        let n_squared = public_key.n_squared();
        let mut verified: Vec<&PartialDecryption> = Vec::with_capacity(partials.len());
        for partial in partials {
            let vk = verification_keys
                .get(partial.guardian_index.checked_sub(1).map(|v| v as usize).unwrap_or(usize::MAX))
                .ok_or(ThresholdError::InvalidPartialInCombine {
                    guardian_index: partial.guardian_index,
                })?;
            if !PartialDecryptionService::verify(partial, encrypted_tally, vk, public_key) {
                return Err(ThresholdError::InvalidPartialInCombine {
                    guardian_index: partial.guardian_index,
                });
            }
            verified.push(partial);
        }

        let chosen: Vec<&PartialDecryption> = verified.into_iter().take(k).collect();
        let subset: Vec<u16> = chosen.iter().map(|p| p.guardian_index).collect();
        let delta = factorial(config.total_shares);

        let mut tallies = Vec::with_capacity(encrypted_tally.len());
        for (j, _) in encrypted_tally.iter().enumerate() {
            let mut combined = BigInt::one();
            for partial in &chosen {
                let lambda_i = lagrange_coefficient(partial.guardian_index, &subset, &delta);
                let exponent = BigInt::from(2) * lambda_i;
                let term = mod_exp_signed(&partial.values[j], &exponent, &n_squared).ok_or_else(
                    || ThresholdError::CombineFailed("non-invertible partial value".into()),
                )?;
                combined = BigInt::mod_mul(&combined, &term, &n_squared);
            }
            let l = l_function(&combined, &public_key.n).ok_or_else(|| {
                ThresholdError::CombineFailed(
                    "combined value not congruent to 1 mod n: corrupted key material".into(),
                )
            })?;
            let theta_inv = mod_inverse(theta, &public_key.n).ok_or_else(|| {
                ThresholdError::CombineFailed("theta is not invertible mod n".into())
            })?;
            tallies.push(BigInt::mod_mul(&l, &theta_inv, &public_key.n));
        }

        let mut aggregated_commitment = BigInt::one();
        let mut partial_proofs = Vec::with_capacity(chosen.len());
        for partial in &chosen {
            aggregated_commitment =
                BigInt::mod_mul(&aggregated_commitment, &partial.proof.commitment, &n_squared);
            partial_proofs.push(partial.proof.clone());
        }

        let ceremony_id = hex::encode(chosen[0].ceremony_nonce);
        let input_hash = hash_encrypted_tally(encrypted_tally);

        tracing::info!(
            ceremony_id,
            participating = subset.len(),
            threshold = k,
            "partial decryptions combined"
        );

        Ok(CombinedDecryption {
            tallies,
            combined_proof: CombinedProof {
                partial_proofs,
                aggregated_commitment,
                input_hash,
            },
            participating_guardians: subset,
            ceremony_id,
            timestamp,
        })
    }

    /// Public-input-only structural check (spec §4.3 `VerifyCombined`).
    /// Full per-partial ZK re-verification is `TallyVerifier`'s job.
    /// `total_shares` is `n`: every participating index must fall in `1..=n`.
    pub fn verify_combined(
        combined: &CombinedDecryption,
        encrypted_tally: &[BigInt],
        total_shares: u16,
    ) -> bool {
        if combined.combined_proof.input_hash != hash_encrypted_tally(encrypted_tally) {
            return false;
        }
        if combined.combined_proof.aggregated_commitment == BigInt::zero() {
            return false;
        }
        if combined.combined_proof.partial_proofs.len() != combined.participating_guardians.len() {
            return false;
        }
        combined
            .participating_guardians
            .iter()
            .all(|&idx| idx >= 1 && idx <= total_shares)
    }
}
