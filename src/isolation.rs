//! Tagged ciphertexts: an optional decoration binding every ciphertext to
//! a per-instance HMAC tag to prevent cross-poll reuse (spec §9 Design
//! Notes, "Tagged ciphertexts (IsolatedPublicKey)").
//!
//! Orthogonal to the core threshold scheme: wraps/unwraps a fixed-size tag
//! around the bare Paillier operations rather than modifying them. HMAC
//! usage follows `chainflip-backend`'s direct `hmac`/`sha2` pairing.

use crate::codec;
use crate::error::{ThresholdError, ThresholdResult};
use crate::keygen::PublicKey;
use curv::BigInt;
use hmac::{Hmac, Mac, NewMac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TAG_LEN: usize = 32;

/// Decorates a `PublicKey` with a per-instance HMAC key so ciphertexts
/// produced for one poll instance are rejected by another.
pub struct IsolatedPublicKey {
    instance_id: Vec<u8>,
    hmac_key: Vec<u8>,
    public_key: PublicKey,
}

impl IsolatedPublicKey {
    pub fn new(instance_id: impl Into<Vec<u8>>, hmac_key: impl Into<Vec<u8>>, public_key: PublicKey) -> Self {
        Self {
            instance_id: instance_id.into(),
            hmac_key: hmac_key.into(),
            public_key,
        }
    }

    fn tag_for(&self, ciphertext: &BigInt) -> [u8; TAG_LEN] {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_key).expect("hmac accepts any key length");
        mac.update(&self.instance_id);
        mac.update(&codec::encode(ciphertext));
        let result = mac.finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&result);
        tag
    }

    /// Appends this instance's tag to a bare ciphertext.
    pub fn wrap(&self, ciphertext: &BigInt) -> Vec<u8> {
        let mut out = codec::encode(ciphertext);
        out.extend_from_slice(&self.tag_for(ciphertext));
        out
    }

    /// Strips and checks the tag, returning the bare ciphertext on match.
    pub fn unwrap(&self, tagged: &[u8]) -> ThresholdResult<BigInt> {
        if tagged.len() < TAG_LEN {
            return Err(ThresholdError::InstanceIdMismatch);
        }
        let (ciphertext_bytes, tag) = tagged.split_at(tagged.len() - TAG_LEN);
        let ciphertext = codec::decode(ciphertext_bytes);
        let expected = self.tag_for(&ciphertext);
        if tag != expected {
            return Err(ThresholdError::InstanceIdMismatch);
        }
        Ok(ciphertext)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}
