//! ECDSA signature operations using secp256k1

use crate::{keccak256, CryptoError};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::CryptoRngCore;
use std::cmp::Ordering;
use strata_primitives::{Address, H256};

/// Half of the secp256k1 curve order (n/2)
const SECP256K1_N_DIV_2: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D,
    0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Full secp256k1 curve order (n)
const SECP256K1_N: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B,
    0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Recoverable ECDSA signature (r, s, recovery id)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// r component
    pub r: [u8; 32],
    /// s component (always low-s when produced by [`sign`])
    pub s: [u8; 32],
    /// recovery id (0 or 1)
    pub v: u8,
}

/// Public key
pub type PublicKey = VerifyingKey;

/// Private key
pub type PrivateKey = SigningKey;

impl Signature {
    /// Encoded size in bytes
    pub const LEN: usize = 65;

    /// Create signature from r, s, v components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Signature { r, s, v }
    }

    /// Convert to 65-byte representation (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Parse from a 65-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Signature { r, s, v: bytes[64] })
    }

    /// Check if signature has low-s value
    pub fn is_low_s(&self) -> bool {
        compare_be(&self.s, &SECP256K1_N_DIV_2) != Ordering::Greater
    }

    fn to_k256(self) -> Result<K256Signature, CryptoError> {
        let r: k256::FieldBytes = self.r.into();
        let s: k256::FieldBytes = self.s.into();
        K256Signature::from_scalars(r, s).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

/// Signing key together with its derived address
#[derive(Clone)]
pub struct KeyPair {
    key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Wrap an existing signing key
    pub fn from_private_key(key: SigningKey) -> Self {
        let address = public_key_to_address(key.verifying_key());
        Self { key, address }
    }

    /// Generate a fresh random key pair
    pub fn random<R: CryptoRngCore>(rng: &mut R) -> Self {
        Self::from_private_key(SigningKey::random(rng))
    }

    /// Deterministic key pair derived from a numeric seed (fixtures and tests)
    pub fn from_seed(seed: u64) -> Result<Self, CryptoError> {
        let secret = keccak256(&seed.to_be_bytes());
        let key = SigningKey::from_slice(secret.as_bytes())
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_private_key(key))
    }

    /// Address controlled by this key pair
    pub fn address(&self) -> Address {
        self.address
    }

    /// Public key
    pub fn public_key(&self) -> &PublicKey {
        self.key.verifying_key()
    }

    /// Sign a 32-byte message hash
    pub fn sign(&self, message_hash: &H256) -> Result<Signature, CryptoError> {
        sign(message_hash, &self.key)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair").field("address", &self.address).finish_non_exhaustive()
    }
}

fn compare_be(a: &[u8; 32], b: &[u8; 32]) -> Ordering {
    a.iter().cmp(b.iter())
}

/// n - s, used to move s into the lower half of the curve order
fn negate_mod_n(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: u16 = 0;
    for i in (0..32).rev() {
        let diff = (SECP256K1_N[i] as u16)
            .wrapping_sub(s[i] as u16)
            .wrapping_sub(borrow);
        result[i] = diff as u8;
        borrow = if diff > 255 { 1 } else { 0 };
    }
    result
}

/// Sign a message hash with a private key, normalised to low-s
pub fn sign(message_hash: &H256, private_key: &PrivateKey) -> Result<Signature, CryptoError> {
    let (signature, mut recovery_id) = private_key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let r: [u8; 32] = signature.r().to_bytes().into();
    let mut s: [u8; 32] = signature.s().to_bytes().into();

    if compare_be(&s, &SECP256K1_N_DIV_2) == Ordering::Greater {
        s = negate_mod_n(&s);
        recovery_id = RecoveryId::try_from(recovery_id.to_byte() ^ 1)
            .map_err(|_| CryptoError::SigningFailed("recovery id out of range".into()))?;
    }

    Ok(Signature { r, s, v: recovery_id.to_byte() })
}

/// Verify a signature against a message hash and public key
pub fn verify(
    message_hash: &H256,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<bool, CryptoError> {
    if !signature.is_low_s() {
        return Ok(false);
    }
    let sig = signature.to_k256()?;
    Ok(public_key.verify_prehash(message_hash.as_bytes(), &sig).is_ok())
}

/// Recover public key from signature and message hash
pub fn recover_public_key(
    message_hash: &H256,
    signature: &Signature,
) -> Result<PublicKey, CryptoError> {
    if !signature.is_low_s() {
        return Err(CryptoError::InvalidSignature("high-s signature".into()));
    }
    let sig = signature.to_k256()?;
    let recovery_id =
        RecoveryId::try_from(signature.v).map_err(|_| CryptoError::InvalidRecoveryId(signature.v))?;
    VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Recover the signer's address from a signature
pub fn recover_address(message_hash: &H256, signature: &Signature) -> Result<Address, CryptoError> {
    recover_public_key(message_hash, signature).map(|pk| public_key_to_address(&pk))
}

/// Derive an address from a public key: last 20 bytes of keccak256(x || y)
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(addr)
}
