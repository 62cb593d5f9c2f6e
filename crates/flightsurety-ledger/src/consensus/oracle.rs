//! Oracle index derivation
//!
//! Indices are pseudo-random but reproducible: each draw hashes the ledger
//! height, a monotonic nonce, and the account with BLAKE3. Replaying the same
//! sequence of ledger operations yields the same indices.

use flightsurety_common::{Address, OracleIndex, INDICES_PER_ORACLE};
use parking_lot::Mutex;

/// Nonce wraps to zero after this value
const NONCE_WRAP: u8 = 250;

/// Redraws before falling back to the first free index
const MAX_REDRAWS: usize = 64;

/// Draws oracle indices in `0..range`
pub struct IndexGenerator {
    nonce: Mutex<u8>,
    range: u8,
}

impl IndexGenerator {
    pub fn new(range: u8) -> Self {
        Self {
            nonce: Mutex::new(0),
            range: range.max(INDICES_PER_ORACLE as u8),
        }
    }

    /// One index for `account` at ledger `height`
    pub fn next_index(&self, height: u64, account: &Address) -> OracleIndex {
        let nonce = {
            let mut nonce = self.nonce.lock();
            let current = *nonce;
            *nonce = if current >= NONCE_WRAP { 0 } else { current + 1 };
            current
        };

        let mut hasher = blake3::Hasher::new();
        hasher.update(&height.to_be_bytes());
        hasher.update(&[nonce]);
        hasher.update(account.as_bytes());
        hasher.finalize().as_bytes()[0] % self.range
    }

    /// Three distinct indices for a newly registered oracle
    pub fn assign(&self, height: u64, account: &Address) -> [OracleIndex; INDICES_PER_ORACLE] {
        let mut indices = [0u8; INDICES_PER_ORACLE];
        for slot in 0..INDICES_PER_ORACLE {
            let taken = &indices[..slot];
            let mut drawn = self.next_index(height, account);
            let mut attempts = 1;
            while taken.contains(&drawn) && attempts < MAX_REDRAWS {
                drawn = self.next_index(height, account);
                attempts += 1;
            }
            if taken.contains(&drawn) {
                drawn = (0..self.range)
                    .find(|i| !taken.contains(i))
                    .unwrap_or(drawn);
            }
            indices[slot] = drawn;
        }
        indices
    }
}
