//! Key vault.
//!
//! - Account identities are X25519 keypairs; public keys travel hex-encoded.
//! - A private key is sealed with AES-256-GCM under a key derived (HKDF-SHA256)
//!   from the wallet owner's signature over [`signature_challenge`]. Only the
//!   sealed form is ever persisted.
//! - Meeting payloads are encrypted per recipient (ECIES: ephemeral X25519
//!   agreement, HKDF-SHA256 bound to both public keys, AES-256-GCM).
//!
//! Every unseal/decrypt failure collapses into [`BookingError::Decryption`]
//! without detail, and never yields partial output.

use crate::errors::BookingError;
use crate::observability::metrics::record_crypto_failure;
use base64::{engine::general_purpose, Engine as _};
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    digest, hkdf,
    rand::{SecureRandom, SystemRandom},
};
use secrecy::{ExposeSecret, ExposeSecretMut, SecretBox, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;
use x25519_dalek::{PublicKey, StaticSecret};

/// Version byte prefixed to sealed private keys.
pub const SEALED_KEY_VERSION: u8 = 1;

/// Envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Length of an X25519 key in bytes.
pub const KEY_LEN: usize = 32;

const TAG_LEN: usize = 16;

const SEAL_SALT: &[u8] = b"booking-service/key-seal/v1";
const SEAL_INFO: &[u8] = b"booking-service/aes-256-gcm/private-key";
const ENVELOPE_INFO: &[u8] = b"booking-service/aes-256-gcm/envelope";

const CHALLENGE_MESSAGE: &str = "Sign this message to unlock your meeting key.\n\nThis signature never leaves your device and cannot move funds.\n\nVersion: 1";

/// Account private key. Redacted from Debug, zeroized on drop.
pub type PrivateKey = SecretBox<[u8; KEY_LEN]>;

/// Freshly generated account keypair.
pub struct Identity {
    /// Hex-encoded X25519 public key.
    pub public_key: String,
    pub private_key: PrivateKey,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Payload encrypted for exactly one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    /// Hex-encoded ephemeral X25519 public key.
    pub ephemeral_public_key: String,
    /// Base64 AES-GCM nonce.
    pub nonce: String,
    /// Base64 ciphertext with appended tag.
    pub ciphertext: String,
}

/// The fixed message a wallet signs to produce the sealing signature.
pub fn signature_challenge() -> &'static str {
    CHALLENGE_MESSAGE
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_address(bytes: &[u8]) -> String {
    hex::encode(digest::digest(&digest::SHA256, bytes).as_ref())
}

/// Parse a hex-encoded X25519 public key.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, BookingError> {
    let bytes = hex::decode(encoded)
        .map_err(|_| BookingError::Crypto("Public key is not valid hex".to_string()))?;
    let bytes: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        BookingError::Crypto(format!(
            "Invalid public key length: {} (expected {})",
            bytes.len(),
            KEY_LEN
        ))
    })?;
    Ok(PublicKey::from(bytes))
}

/// Generate an X25519 keypair from the system CSPRNG.
#[instrument(skip_all, name = "booking.crypto.create_identity")]
pub fn create_identity() -> Result<Identity, BookingError> {
    let rng = SystemRandom::new();
    let secret_bytes = random_array::<KEY_LEN>(&rng)?;

    let secret = StaticSecret::from(*secret_bytes.expose_secret());
    let public = PublicKey::from(&secret);

    Ok(Identity {
        public_key: hex::encode(public.as_bytes()),
        private_key: secret_bytes,
    })
}

/// Seal a private key under a key derived from `signature`.
///
/// Output is base64 of `version || nonce || ciphertext+tag`.
#[instrument(skip_all, name = "booking.crypto.seal_private_key")]
pub fn seal_private_key(
    private_key: &PrivateKey,
    signature: &SecretString,
) -> Result<String, BookingError> {
    if signature.expose_secret().is_empty() {
        return Err(BookingError::BadRequest(
            "Signature must not be empty".to_string(),
        ));
    }

    let rng = SystemRandom::new();
    let nonce_bytes = random_nonce(&rng)?;

    let key = signature_key(signature)?;
    let mut in_out = private_key.expose_secret().to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::from([SEALED_KEY_VERSION]),
        &mut in_out,
    )
    .map_err(|e| BookingError::Crypto(format!("Sealing failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
    sealed.push(SEALED_KEY_VERSION);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);

    Ok(general_purpose::STANDARD.encode(sealed))
}

/// Recover a private key sealed by [`seal_private_key`].
///
/// Fails closed: a wrong signature, tampered bytes, an unknown version or an
/// unexpected plaintext length all return [`BookingError::Decryption`].
#[instrument(skip_all, name = "booking.crypto.unseal_private_key")]
pub fn unseal_private_key(
    sealed: &str,
    signature: &SecretString,
) -> Result<PrivateKey, BookingError> {
    unseal(sealed, signature).inspect_err(|_| record_crypto_failure("unseal"))
}

fn unseal(sealed: &str, signature: &SecretString) -> Result<PrivateKey, BookingError> {
    if signature.expose_secret().is_empty() {
        return Err(BookingError::Decryption);
    }

    let raw = general_purpose::STANDARD
        .decode(sealed)
        .map_err(|_| BookingError::Decryption)?;

    let (version, rest) = raw.split_first().ok_or(BookingError::Decryption)?;
    if *version != SEALED_KEY_VERSION || rest.len() < NONCE_LEN + TAG_LEN {
        return Err(BookingError::Decryption);
    }
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let nonce =
        Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| BookingError::Decryption)?;

    let key = signature_key(signature).map_err(|_| BookingError::Decryption)?;
    let mut in_out = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::from([*version]), &mut in_out)
        .map_err(|_| BookingError::Decryption)?;

    let bytes: [u8; KEY_LEN] = (&*plaintext)
        .try_into()
        .map_err(|_| BookingError::Decryption)?;

    Ok(SecretBox::new(Box::new(bytes)))
}

/// Encrypt `plaintext` for the holder of `recipient_public_key` (hex).
#[instrument(skip_all, name = "booking.crypto.encrypt")]
pub fn encrypt_for(recipient_public_key: &str, plaintext: &[u8]) -> Result<Envelope, BookingError> {
    let recipient = decode_public_key(recipient_public_key)?;

    let rng = SystemRandom::new();
    let ephemeral_bytes = random_array::<KEY_LEN>(&rng)?;
    let ephemeral = StaticSecret::from(*ephemeral_bytes.expose_secret());
    let ephemeral_public = PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&recipient);
    if !shared.was_contributory() {
        record_crypto_failure("encrypt");
        return Err(BookingError::Crypto(
            "Recipient public key produced a non-contributory agreement".to_string(),
        ));
    }

    let key = envelope_key(shared.as_bytes(), &ephemeral_public, &recipient)?;
    let nonce_bytes = random_nonce(&rng)?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::from(ephemeral_public.as_bytes()),
        &mut in_out,
    )
    .map_err(|e| BookingError::Crypto(format!("Envelope encryption failed: {}", e)))?;

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        ephemeral_public_key: hex::encode(ephemeral_public.as_bytes()),
        nonce: general_purpose::STANDARD.encode(nonce_bytes),
        ciphertext: general_purpose::STANDARD.encode(in_out),
    })
}

/// Decrypt an envelope with the recipient's private key.
#[instrument(skip_all, name = "booking.crypto.decrypt")]
pub fn decrypt_envelope(
    private_key: &PrivateKey,
    envelope: &Envelope,
) -> Result<Vec<u8>, BookingError> {
    open_envelope(private_key, envelope).inspect_err(|_| record_crypto_failure("decrypt"))
}

fn open_envelope(private_key: &PrivateKey, envelope: &Envelope) -> Result<Vec<u8>, BookingError> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(BookingError::Decryption);
    }

    let ephemeral_public =
        decode_public_key(&envelope.ephemeral_public_key).map_err(|_| BookingError::Decryption)?;
    let nonce_bytes = general_purpose::STANDARD
        .decode(&envelope.nonce)
        .map_err(|_| BookingError::Decryption)?;
    let nonce =
        Nonce::try_assume_unique_for_key(&nonce_bytes).map_err(|_| BookingError::Decryption)?;
    let mut in_out = general_purpose::STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|_| BookingError::Decryption)?;

    let secret = StaticSecret::from(*private_key.expose_secret());
    let recipient_public = PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(BookingError::Decryption);
    }

    let key = envelope_key(shared.as_bytes(), &ephemeral_public, &recipient_public)
        .map_err(|_| BookingError::Decryption)?;
    let plaintext = key
        .open_in_place(nonce, Aad::from(ephemeral_public.as_bytes()), &mut in_out)
        .map_err(|_| BookingError::Decryption)?;

    Ok(plaintext.to_vec())
}

fn signature_key(signature: &SecretString) -> Result<LessSafeKey, BookingError> {
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, SEAL_SALT);
    derive_key(&salt, signature.expose_secret().as_bytes(), SEAL_INFO)
}

fn envelope_key(
    shared_secret: &[u8],
    ephemeral_public: &PublicKey,
    recipient_public: &PublicKey,
) -> Result<LessSafeKey, BookingError> {
    let mut salt_bytes = Vec::with_capacity(2 * KEY_LEN);
    salt_bytes.extend_from_slice(ephemeral_public.as_bytes());
    salt_bytes.extend_from_slice(recipient_public.as_bytes());

    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &salt_bytes);
    derive_key(&salt, shared_secret, ENVELOPE_INFO)
}

fn derive_key(salt: &hkdf::Salt, ikm: &[u8], info: &[u8]) -> Result<LessSafeKey, BookingError> {
    let info = [info];
    let prk = salt.extract(ikm);
    let okm = prk
        .expand(&info, &AES_256_GCM)
        .map_err(|e| BookingError::Crypto(format!("Key derivation failed: {}", e)))?;
    Ok(LessSafeKey::new(UnboundKey::from(okm)))
}

fn random_nonce(rng: &SystemRandom) -> Result<[u8; NONCE_LEN], BookingError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)
        .map_err(|e| BookingError::Crypto(format!("Nonce generation failed: {}", e)))?;
    Ok(nonce)
}

fn random_array<const N: usize>(rng: &SystemRandom) -> Result<SecretBox<[u8; N]>, BookingError> {
    let mut bytes = SecretBox::new(Box::new([0u8; N]));
    rng.fill(bytes.expose_secret_mut())
        .map_err(|e| BookingError::Crypto(format!("Random generation failed: {}", e)))?;
    Ok(bytes)
}
