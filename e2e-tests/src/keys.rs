//! Placeholder keys, addresses and signatures.
//!
//! Outputs have the lengths and prefixes of real ones and are derived deterministically
//! from their inputs with FNV-1a.

use crate::hash::Fnv1a;

pub const PRIVATE_KEY_PREFIX: &str = "APrivateKey1";
pub const PRIVATE_KEY_LEN: usize = 59;
/// Number of random bytes consumed to generate a key.
pub const SEED_LEN: usize = PRIVATE_KEY_LEN - PRIVATE_KEY_PREFIX.len();
pub const ADDRESS_PREFIX: &str = "aleo1";
pub const ADDRESS_LEN: usize = 63;
pub const SIGNATURE_PREFIX: &str = "sign1";
pub const SIGNATURE_LEN: usize = 216;

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32_ALPHABET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

pub fn private_key(seed: &[u8; SEED_LEN]) -> Vec<u8> {
    let mut key = PRIVATE_KEY_PREFIX.as_bytes().to_vec();
    key.extend(seed.iter().map(|&byte| to_char(BASE58_ALPHABET, byte)));
    key
}

pub fn is_private_key(key: &[u8]) -> bool {
    key.len() == PRIVATE_KEY_LEN
        && key.starts_with(PRIVATE_KEY_PREFIX.as_bytes())
        && key[PRIVATE_KEY_PREFIX.len()..]
            .iter()
            .all(|byte| BASE58_ALPHABET.contains(byte))
}

pub fn address(private_key: &[u8]) -> Option<Vec<u8>> {
    if !is_private_key(private_key) {
        return None;
    }
    let seed = Fnv1a::default().update(private_key).finish();
    Some(with_prefix(
        ADDRESS_PREFIX,
        expand(seed, BECH32_ALPHABET, ADDRESS_LEN - ADDRESS_PREFIX.len()),
    ))
}

pub fn sign(private_key: &[u8], message: &[u8]) -> Option<Vec<u8>> {
    if !is_private_key(private_key) {
        return None;
    }
    let seed = Fnv1a::default()
        .update(private_key)
        .update(&(message.len() as u64).to_le_bytes())
        .update(message)
        .finish();
    Some(with_prefix(
        SIGNATURE_PREFIX,
        expand(seed, BASE58_ALPHABET, SIGNATURE_LEN - SIGNATURE_PREFIX.len()),
    ))
}

fn to_char(alphabet: &[u8], byte: u8) -> u8 {
    alphabet[usize::from(byte) % alphabet.len()]
}

fn with_prefix(prefix: &str, body: impl Iterator<Item = u8>) -> Vec<u8> {
    prefix.as_bytes().iter().copied().chain(body).collect()
}

/// Expands `seed` into `len` chars of `alphabet`.
fn expand(seed: u128, alphabet: &[u8], len: usize) -> impl Iterator<Item = u8> + '_ {
    let blocks = (0_u32..).map(move |counter| {
        Fnv1a::default()
            .update(&seed.to_le_bytes())
            .update(&counter.to_le_bytes())
            .finish()
            .to_le_bytes()
    });
    blocks
        .flatten()
        .take(len)
        .map(|byte| to_char(alphabet, byte))
}
