//! Formatting messages as struct literals consisting of fixed-size chunks.
//!
//! A message is zero-padded to `target_chunks` chunks of [`FIELDS_PER_CHUNK`] `u128` fields
//! each, with every field holding 16 little-endian message bytes:
//!
//! ```text
//! {
//!   len: 5u32,
//!   c0: {
//!     f0: 478560413032u128,
//!     f1: 0u128,
//!     ...
//!   }
//! }
//! ```

const FIELD_LEN: usize = 16;
pub const FIELDS_PER_CHUNK: usize = 32;
pub const CHUNK_LEN: usize = FIELD_LEN * FIELDS_PER_CHUNK;
pub const MAX_CHUNKS: usize = 32;

/// Renders `message` as a struct literal, or returns `None` if it does not fit into
/// `target_chunks` chunks.
pub fn render(message: &[u8], target_chunks: usize) -> Option<String> {
    if !(1..=MAX_CHUNKS).contains(&target_chunks) || message.len() > target_chunks * CHUNK_LEN {
        return None;
    }

    let mut padded = message.to_vec();
    padded.resize(target_chunks * CHUNK_LEN, 0);
    let mut output = format!("{{\n  len: {}u32", message.len());
    for (chunk_idx, chunk) in padded.chunks(CHUNK_LEN).enumerate() {
        output.push_str(&format!(",\n  c{chunk_idx}: {{"));
        for (field_idx, field) in chunk.chunks(FIELD_LEN).enumerate() {
            let value = u128::from_le_bytes(field.try_into().ok()?);
            let separator = if field_idx == 0 { "" } else { "," };
            output.push_str(&format!("{separator}\n    f{field_idx}: {value}u128"));
        }
        output.push_str("\n  }");
    }
    output.push_str("\n}");
    Some(output)
}

/// Parses a struct literal produced by [`render()`]. Whitespace (including newlines)
/// is insignificant.
pub fn parse(formatted: &str) -> Option<Vec<u8>> {
    let compact: String = formatted
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    let mut cursor = Cursor { rest: &compact };

    cursor.expect("{len:")?;
    let len: usize = cursor.number("u32")?;
    let mut bytes = vec![];
    let mut chunk_count = 0;
    while cursor.expect(",").is_some() {
        cursor.expect(&format!("c{chunk_count}:{{"))?;
        for field_idx in 0..FIELDS_PER_CHUNK {
            if field_idx > 0 {
                cursor.expect(",")?;
            }
            cursor.expect(&format!("f{field_idx}:"))?;
            let value: u128 = cursor.number("u128")?;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        cursor.expect("}")?;
        chunk_count += 1;
    }
    cursor.expect("}")?;

    if !cursor.rest.is_empty() || chunk_count == 0 || len > bytes.len() {
        return None;
    }
    bytes.truncate(len);
    Some(bytes)
}

#[derive(Debug)]
struct Cursor<'a> {
    rest: &'a str,
}

impl Cursor<'_> {
    fn expect(&mut self, token: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(token)?;
        Some(())
    }

    /// Reads a decimal number followed by the type `suffix`.
    fn number<T: std::str::FromStr>(&mut self, suffix: &str) -> Option<T> {
        let digits_len = self.rest.find(|ch: char| !ch.is_ascii_digit())?;
        let (digits, rest) = self.rest.split_at(digits_len);
        self.rest = rest.strip_prefix(suffix)?;
        digits.parse().ok()
    }
}
