//! Best-effort deterministic seeding.
//!
//! The random sources that matter (Python, NumPy and torch generators) live
//! in the inference server, so seeding means forwarding the request seed
//! with every generation call. Servers take an unsigned 32-bit seed; anything
//! else is logged and the call goes out unseeded. Seeding never fails a
//! request, and even a seeded call may vary across GPUs.

use log::{debug, warn};

/// Seed to forward with one generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPlan {
    Unseeded,
    Seeded(u32),
}

impl SeedPlan {
    pub fn prepare(seed: Option<i64>) -> Self {
        let Some(seed) = seed else {
            return SeedPlan::Unseeded;
        };

        match u32::try_from(seed) {
            Ok(value) => {
                debug!("Seeding generation with {}", value);
                SeedPlan::Seeded(value)
            }
            Err(_) => {
                warn!("Seed {} is outside 0..=4294967295, generating without a seed", seed);
                SeedPlan::Unseeded
            }
        }
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            SeedPlan::Seeded(value) => Some(*value),
            SeedPlan::Unseeded => None,
        }
    }
}
