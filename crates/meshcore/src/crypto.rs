//! Group-channel keys and decryption.
//!
//! A channel is identified on the air by a single hash byte: the first byte
//! of SHA-256 over the channel secret. Group text is AES-128-ECB encrypted
//! with the secret and authenticated by the first two bytes of
//! HMAC-SHA256(secret, ciphertext).

use {
    aes::{
        Aes128,
        cipher::{BlockDecrypt, KeyInit, generic_array::GenericArray},
    },
    hmac::{Hmac, Mac},
    meshrelay_common::hex::normalize_hex,
    sha2::{Digest, Sha256},
};

type HmacSha256 = Hmac<Sha256>;

/// AES block size and minimum secret length.
pub const BLOCK_LEN: usize = 16;

/// Length of the truncated MAC carried in group payloads.
pub const MAC_LEN: usize = 2;

/// First byte of SHA-256 over the secret.
pub fn channel_hash(secret: &[u8]) -> u8 {
    Sha256::digest(secret)[0]
}

/// Channel hash for a hex-encoded secret, as two lowercase hex digits.
///
/// Returns `None` when the secret does not normalize to valid hex.
pub fn channel_hash_hex(secret_hex: &str) -> Option<String> {
    let normalized = normalize_hex(secret_hex);
    if normalized.is_empty() {
        return None;
    }
    let secret = hex::decode(normalized).ok()?;
    Some(format!("{:02x}", channel_hash(&secret)))
}

#[derive(Clone)]
struct ChannelKey {
    hash: u8,
    secret: Vec<u8>,
}

/// Channel secrets available for decrypting group traffic.
#[derive(Clone, Default)]
pub struct KeyStore {
    keys: Vec<ChannelKey>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl KeyStore {
    /// Build a key store from hex secrets.
    ///
    /// Secrets that are not valid hex or shorter than one AES block are skipped.
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = secrets
            .into_iter()
            .filter_map(|s| {
                let normalized = normalize_hex(s.as_ref());
                let secret = hex::decode(normalized).ok()?;
                (secret.len() >= BLOCK_LEN).then(|| ChannelKey {
                    hash: channel_hash(&secret),
                    secret,
                })
            })
            .collect();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Secrets whose channel hash matches `hash`.
    pub fn candidates(&self, hash: u8) -> impl Iterator<Item = &[u8]> {
        self.keys
            .iter()
            .filter(move |k| k.hash == hash)
            .map(|k| k.secret.as_slice())
    }
}

/// Verify the truncated MAC and decrypt `ciphertext` with `secret`.
///
/// Returns `None` on MAC mismatch or when the ciphertext is not whole blocks.
pub fn decrypt_group_payload(secret: &[u8], mac: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>> {
    if secret.len() < BLOCK_LEN
        || ciphertext.is_empty()
        || ciphertext.len() % BLOCK_LEN != 0
        || mac.len() != MAC_LEN
    {
        return None;
    }

    let mut hmac = <HmacSha256 as Mac>::new_from_slice(secret).ok()?;
    hmac.update(ciphertext);
    let tag = hmac.finalize().into_bytes();
    if tag[..MAC_LEN] != *mac {
        return None;
    }

    let cipher = Aes128::new_from_slice(&secret[..BLOCK_LEN]).ok()?;
    let mut plain = Vec::with_capacity(ciphertext.len());
    for chunk in ciphertext.chunks_exact(BLOCK_LEN) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        plain.extend_from_slice(&block);
    }
    Some(plain)
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        aes::cipher::BlockEncrypt,
    };

    pub(crate) const PUBLIC_SECRET: &str = "8b3387e9c5cdea6ac9e5edbaa115cd72";

    /// Encrypt `plain` (zero-padded to whole blocks) and return `(mac, ciphertext)`.
    pub(crate) fn encrypt_group_payload(secret: &[u8], plain: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut padded = plain.to_vec();
        while padded.len() % BLOCK_LEN != 0 {
            padded.push(0);
        }
        let cipher = Aes128::new_from_slice(&secret[..BLOCK_LEN]).unwrap();
        let mut ciphertext = Vec::with_capacity(padded.len());
        for chunk in padded.chunks_exact(BLOCK_LEN) {
            let mut block = GenericArray::clone_from_slice(chunk);
            cipher.encrypt_block(&mut block);
            ciphertext.extend_from_slice(&block);
        }
        let mut hmac = <HmacSha256 as Mac>::new_from_slice(secret).unwrap();
        hmac.update(&ciphertext);
        let mac = hmac.finalize().into_bytes()[..MAC_LEN].to_vec();
        (mac, ciphertext)
    }

    #[test]
    fn channel_hash_is_first_digest_byte() {
        let secret = hex::decode(PUBLIC_SECRET).unwrap();
        let expected = format!("{:02x}", Sha256::digest(&secret)[0]);
        assert_eq!(channel_hash_hex(PUBLIC_SECRET).unwrap(), expected);
        assert_eq!(
            channel_hash_hex(&PUBLIC_SECRET.to_uppercase()).unwrap(),
            expected
        );
    }

    #[test]
    fn channel_hash_rejects_invalid_secret() {
        assert!(channel_hash_hex("not-hex").is_none());
        assert!(channel_hash_hex("").is_none());
    }

    #[test]
    fn key_store_skips_short_and_invalid_secrets() {
        let store = KeyStore::new([PUBLIC_SECRET, "abcd", "xyz"]);
        assert_eq!(store.len(), 1);
        let hash = channel_hash(&hex::decode(PUBLIC_SECRET).unwrap());
        assert_eq!(store.candidates(hash).count(), 1);
        assert_eq!(store.candidates(hash.wrapping_add(1)).count(), 0);
    }

    #[test]
    fn decrypt_roundtrips_with_valid_mac() {
        let secret = hex::decode(PUBLIC_SECRET).unwrap();
        let (mac, ct) = encrypt_group_payload(&secret, b"\x01\x00\x00\x00\x00alice: hi");
        let plain = decrypt_group_payload(&secret, &mac, &ct).unwrap();
        assert!(plain.starts_with(b"\x01\x00\x00\x00\x00alice: hi"));
        assert_eq!(plain.len() % BLOCK_LEN, 0);
    }

    #[test]
    fn decrypt_rejects_bad_mac() {
        let secret = hex::decode(PUBLIC_SECRET).unwrap();
        let (mut mac, ct) = encrypt_group_payload(&secret, b"\x01\x00\x00\x00\x00bob: yo");
        mac[0] ^= 0xff;
        assert!(decrypt_group_payload(&secret, &mac, &ct).is_none());
    }

    #[test]
    fn decrypt_rejects_partial_blocks() {
        let secret = hex::decode(PUBLIC_SECRET).unwrap();
        assert!(decrypt_group_payload(&secret, &[0, 0], &[1, 2, 3]).is_none());
    }
}
