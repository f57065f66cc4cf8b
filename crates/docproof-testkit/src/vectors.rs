//! Golden fingerprint vectors.
//!
//! Published SHA-256 test vectors. Every window size must reproduce them.

use docproof_core::FileFingerprint;

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Bytes repeated `repeat` times form the file content.
    pub unit: &'static [u8],
    pub repeat: usize,
    /// Expected fingerprint (hex).
    pub expected: &'static str,
}

impl GoldenVector {
    pub fn content(&self) -> Vec<u8> {
        self.unit.repeat(self.repeat)
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "abc",
            unit: b"abc",
            repeat: 1,
            expected: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        },
        GoldenVector {
            name: "two-block message",
            unit: b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
            repeat: 1,
            expected: "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1",
        },
        GoldenVector {
            name: "quick brown fox",
            unit: b"The quick brown fox jumps over the lazy dog",
            repeat: 1,
            expected: "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592",
        },
        GoldenVector {
            name: "one million a",
            unit: b"a",
            repeat: 1_000_000,
            expected: "cdc76e5c9914fb9281a1c7e284d73e67f1809a48a497200e046d39ccc7112cd0",
        },
    ]
}

/// Check every vector against the one-shot fingerprint.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        let actual = FileFingerprint::of_bytes(&vector.content());
        if actual.as_str() != vector.expected {
            return Err(format!(
                "{}: expected {}, got {}",
                vector.name, vector.expected, actual
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_match() {
        verify_all_vectors().unwrap();
    }
}
