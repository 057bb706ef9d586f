//! Placeholder message hash: 128-bit FNV-1a.

const OFFSET_BASIS: u128 = 0x6c62_272e_07bb_0142_62b8_2175_6295_c58d;
const PRIME: u128 = 0x0000_0000_0100_0000_0000_0000_0000_013b;

/// Incremental FNV-1a hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a(u128);

impl Default for Fnv1a {
    fn default() -> Self {
        Self(OFFSET_BASIS)
    }
}

impl Fnv1a {
    #[must_use]
    pub fn update(self, bytes: &[u8]) -> Self {
        let state = bytes
            .iter()
            .fold(self.0, |hash, &byte| (hash ^ u128::from(byte)).wrapping_mul(PRIME));
        Self(state)
    }

    pub fn finish(self) -> u128 {
        self.0
    }
}

pub fn digest(message: &[u8]) -> u128 {
    Fnv1a::default().update(message).finish()
}

/// Textual hash literal, e.g. `123u128`.
pub fn literal(message: &[u8]) -> String {
    format!("{}u128", digest(message))
}

pub fn le_bytes(message: &[u8]) -> [u8; 16] {
    digest(message).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_values() {
        assert_eq!(digest(b""), OFFSET_BASIS);
        assert_eq!(digest(b"a"), 0xd228_cb69_6f1a_8caf_7891_2b70_4e4a_8964);
    }

    #[test]
    fn representations_agree() {
        for message in [b"".as_slice(), b"abc", &[0xff_u8; 1_000]] {
            let literal = literal(message);
            let number = literal.strip_suffix("u128").unwrap();
            let number: u128 = number.parse().unwrap();
            assert_eq!(number.to_le_bytes(), le_bytes(message));
        }
    }
}
