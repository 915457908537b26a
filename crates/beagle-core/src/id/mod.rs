use rand::Rng;

use beagle_model::{REQUEST_ID_ALPHABET, REQUEST_ID_LEN, RequestId};

use crate::error::CoreError;

/// Draws random request identifiers.
///
/// Not cryptographically strong; uniqueness is enforced by the caller against the
/// [`StatusRegistry`](crate::StatusRegistry).
#[derive(Debug, Clone)]
pub struct IdGenerator {
    alphabet: Vec<u8>,
    length: usize,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            alphabet: REQUEST_ID_ALPHABET.to_vec(),
            length: REQUEST_ID_LEN,
        }
    }

    /// Generator over a custom alphabet.
    ///
    /// Ids end up as container names, so only ASCII alphanumerics are accepted.
    pub fn with_alphabet(alphabet: &[u8], length: usize) -> Result<Self, CoreError> {
        if alphabet.is_empty() || length == 0 {
            return Err(CoreError::InvalidConfig(
                "id alphabet and length must be non-empty".into(),
            ));
        }
        if !alphabet.iter().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidConfig(
                "id alphabet must be ASCII alphanumeric".into(),
            ));
        }
        Ok(Self {
            alphabet: alphabet.to_vec(),
            length,
        })
    }

    pub fn generate(&self) -> RequestId {
        let mut rng = rand::rng();
        let id: String = (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())] as char)
            .collect();
        RequestId::from(id)
    }

    /// Number of distinct ids this generator can produce, saturating at `u128::MAX`.
    pub fn space(&self) -> u128 {
        (self.alphabet.len() as u128)
            .checked_pow(self.length as u32)
            .unwrap_or(u128::MAX)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
