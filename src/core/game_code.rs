//! Session Codes
//!
//! A session is addressed by a numeric code that is bijective with a
//! human-readable string. Two encodings exist:
//!
//! - **V1** (4 letters): the ASCII bytes read as a little-endian `i32`.
//! - **V2** (6 letters): letters indexed into a shuffled alphabet and
//!   packed into 30 bits, with the sign bit set.

use std::fmt;
use rand::Rng;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Alphabet used by V2 codes.
const V2_ALPHABET: &[u8; 26] = b"QWXRTYLPESDFGHUJKZOCVBINMA";

/// Numeric session code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameCode(pub i32);

/// Code parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameCodeError {
    /// Wrong number of characters.
    #[error("game code must be 4 or 6 letters, got {0}")]
    InvalidLength(usize),

    /// Non-letter character.
    #[error("game code contains a non-letter character")]
    InvalidCharacter,
}

impl GameCode {
    /// Parse a 4- or 6-letter code (case-insensitive).
    pub fn parse(text: &str) -> Result<Self, GameCodeError> {
        let upper = text.to_ascii_uppercase();
        let bytes = upper.as_bytes();

        if !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(GameCodeError::InvalidCharacter);
        }

        match bytes.len() {
            4 => Ok(Self(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))),
            6 => Ok(Self(encode_v2(bytes))),
            n => Err(GameCodeError::InvalidLength(n)),
        }
    }

    /// Random V2 code.
    pub fn random_v2<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut letters = [0u8; 6];
        for letter in &mut letters {
            *letter = V2_ALPHABET[rng.gen_range(0..26)];
        }
        Self(encode_v2(&letters))
    }

    /// Raw numeric value.
    pub fn value(self) -> i32 {
        self.0
    }

    /// True for 6-letter codes.
    pub fn is_v2(self) -> bool {
        self.0 < -1
    }
}

fn alphabet_index(letter: u8) -> u32 {
    V2_ALPHABET
        .iter()
        .position(|&c| c == letter)
        .unwrap_or(0) as u32
}

fn encode_v2(letters: &[u8]) -> i32 {
    let a = alphabet_index(letters[0]);
    let b = alphabet_index(letters[1]);
    let c = alphabet_index(letters[2]);
    let d = alphabet_index(letters[3]);
    let e = alphabet_index(letters[4]);
    let f = alphabet_index(letters[5]);

    let one = (a + 26 * b) & 0x3FF;
    let two = c + 26 * (d + 26 * (e + 26 * f));

    (one | ((two << 10) & 0x3FFF_FC00) | 0x8000_0000) as i32
}

fn decode_v2(value: i32) -> String {
    let a = (value & 0x3FF) as usize;
    let b = ((value >> 10) & 0xFFFFF) as usize;

    [
        V2_ALPHABET[a % 26],
        V2_ALPHABET[a / 26 % 26],
        V2_ALPHABET[b % 26],
        V2_ALPHABET[b / 26 % 26],
        V2_ALPHABET[b / 676 % 26],
        V2_ALPHABET[b / 17576 % 26],
    ]
    .iter()
    .map(|&c| c as char)
    .collect()
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_v2() {
            f.write_str(&decode_v2(self.0))
        } else {
            let bytes = self.0.to_le_bytes();
            f.write_str(&String::from_utf8_lossy(&bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_round_trip() {
        let code = GameCode::parse("QWXRTY").unwrap();
        assert!(code.is_v2());
        assert_eq!(code.to_string(), "QWXRTY");
    }

    #[test]
    fn test_v1_round_trip() {
        let code = GameCode::parse("abcd").unwrap();
        assert!(!code.is_v2());
        assert_eq!(code.to_string(), "ABCD");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(GameCode::parse("ABC"), Err(GameCodeError::InvalidLength(3)));
        assert_eq!(GameCode::parse("AB1D"), Err(GameCodeError::InvalidCharacter));
    }

    #[test]
    fn test_random_codes_render_six_letters() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = GameCode::random_v2(&mut rng);
            let text = code.to_string();
            assert_eq!(text.len(), 6);
            assert_eq!(GameCode::parse(&text).unwrap(), code);
        }
    }
}
