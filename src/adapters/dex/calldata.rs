//! ABI calldata codec
//!
//! Just enough ABI encoding for v2-style router calls: a 4-byte selector
//! followed by 32-byte words, with dynamic address arrays for swap paths.
//! Return data decoding handles the static-word cases the quote path needs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("Return data too short: wanted word {word}, got {len} hex chars")]
    ShortReturnData { word: usize, len: usize },

    #[error("Invalid word at index {0}")]
    InvalidWord(usize),
}

/// Builds `selector ++ head words ++ tail` calldata. Dynamic arguments
/// reserve an offset slot in the head that is patched when `build` runs.
pub struct CalldataBuilder {
    selector: String,
    head: Vec<Word>,
    tail: Vec<String>,
}

enum Word {
    Static(String),
    /// Offset into the tail, in words, patched at build time.
    DynamicOffset(usize),
}

impl CalldataBuilder {
    /// `selector` is the 0x-prefixed 4-byte function selector.
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            head: Vec::new(),
            tail: Vec::new(),
        }
    }

    pub fn push_u256(mut self, value: u128) -> Self {
        self.head.push(Word::Static(format!("{:064x}", value)));
        self
    }

    pub fn push_address(mut self, address: &str) -> Self {
        let hex = address.trim_start_matches("0x");
        self.head.push(Word::Static(format!("{:0>64}", hex)));
        self
    }

    pub fn push_address_array(mut self, addresses: &[&str]) -> Self {
        self.head.push(Word::DynamicOffset(self.tail.len()));
        self.tail.push(format!("{:064x}", addresses.len()));
        for address in addresses {
            let hex = address.trim_start_matches("0x");
            self.tail.push(format!("{:0>64}", hex));
        }
        self
    }

    pub fn build(self) -> String {
        let head_bytes = self.head.len() * 32;
        let mut out = self.selector;
        let mut tail_word = 0usize;
        for word in &self.head {
            match word {
                Word::Static(hex) => out.push_str(hex),
                Word::DynamicOffset(tail_index) => {
                    // Offsets count bytes from the start of the head.
                    out.push_str(&format!("{:064x}", head_bytes + tail_word * 32));
                    let len = usize::from_str_radix(&self.tail[*tail_index], 16).unwrap_or(0);
                    tail_word += 1 + len;
                }
            }
        }
        for word in &self.tail {
            out.push_str(word);
        }
        out
    }
}

/// Decode the `word_index`-th 32-byte word of 0x-prefixed return data.
pub fn decode_u256_at(data: &str, word_index: usize) -> Result<u128, AbiError> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    let start = word_index * 64;
    if hex.len() < start + 64 {
        return Err(AbiError::ShortReturnData {
            word: word_index,
            len: hex.len(),
        });
    }
    // High 16 bytes must be zero to fit u128; amounts in practice do.
    let word = &hex[start..start + 64];
    if word[..32].bytes().any(|b| b != b'0') {
        return Err(AbiError::InvalidWord(word_index));
    }
    u128::from_str_radix(&word[32..], 16).map_err(|_| AbiError::InvalidWord(word_index))
}

/// Last word of a `uint256[]` return, the final hop amount of
/// `getAmountsOut`.
pub fn decode_last_array_u256(data: &str) -> Result<u128, AbiError> {
    // Word 0: offset, word 1: length, then elements.
    let len = decode_u256_at(data, 1)? as usize;
    if len == 0 {
        return Err(AbiError::ShortReturnData { word: 2, len: 0 });
    }
    decode_u256_at(data, 1 + len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_args() {
        let data = CalldataBuilder::new("0xa9059cbb")
            .push_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .push_u256(1000)
            .build();
        assert_eq!(
            data,
            format!(
                "0xa9059cbb{:0>64}{:064x}",
                "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 1000u128
            )
        );
    }

    #[test]
    fn test_address_array_offset_and_length() {
        // getAmountsOut(uint256, address[])
        let data = CalldataBuilder::new("0xd06ca61f")
            .push_u256(5)
            .push_address_array(&[
                "0x1111111111111111111111111111111111111111",
                "0x2222222222222222222222222222222222222222",
            ])
            .build();
        let hex = data.strip_prefix("0xd06ca61f").unwrap();
        // Head: amount, then offset to the tail (2 head words = 0x40 bytes).
        assert_eq!(&hex[0..64], &format!("{:064x}", 5u128));
        assert_eq!(&hex[64..128], &format!("{:064x}", 0x40u128));
        // Tail: length 2, then the two addresses.
        assert_eq!(&hex[128..192], &format!("{:064x}", 2u128));
        assert!(hex[192..256].ends_with(&"11".repeat(20)));
        assert!(hex[256..320].ends_with(&"22".repeat(20)));
    }

    #[test]
    fn test_decode_u256() {
        let data = format!("0x{:064x}{:064x}", 7u128, 9u128);
        assert_eq!(decode_u256_at(&data, 0).unwrap(), 7);
        assert_eq!(decode_u256_at(&data, 1).unwrap(), 9);
        assert!(decode_u256_at(&data, 2).is_err());
    }

    #[test]
    fn test_decode_amounts_out_tail() {
        // offset, len 3, amounts [1, 2, 42]
        let data = format!(
            "0x{:064x}{:064x}{:064x}{:064x}{:064x}",
            0x20u128, 3u128, 1u128, 2u128, 42u128
        );
        assert_eq!(decode_last_array_u256(&data).unwrap(), 42);
    }
}
