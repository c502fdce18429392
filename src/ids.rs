//! Identifier generation.
//!
//! Identifiers are an injected capability rather than a process-wide RNG so
//! that tests can pin a seed and replay a workflow deterministically: given
//! the same snapshot, the same input and the same seed, accept produces the
//! same tree and the same instance id.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Alphabet shared with the persisted id format: Crockford base32, no
/// ambiguous characters.
const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of generated workflow and instance ids.
const ID_LENGTH: usize = 32;

pub trait IdGenerator: Send + Sync {
    /// Stable identifier for a workflow; never changes once created.
    fn new_workflow_id(&self) -> String;

    /// Rotating identifier regenerated every time the tree changes.
    fn new_instance_id(&self) -> String;
}

/// Default generator backed by a seedable RNG.
pub struct RandomIdGenerator {
    rng: Mutex<StdRng>,
}

impl RandomIdGenerator {
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests and replay harnesses.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn next_id(&self) -> String {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (0..ID_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

impl IdGenerator for RandomIdGenerator {
    fn new_workflow_id(&self) -> String {
        self.next_id()
    }

    fn new_instance_id(&self) -> String {
        self.next_id()
    }
}
