//! Choosing which peer to catch up from

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks one peer out of a candidate list
///
/// Returns the index of the chosen candidate, or `None` to skip catch-up.
pub trait PeerSelector: Send {
    fn select(&mut self, candidates: &[String]) -> Option<usize>;
}

/// Uniformly random choice
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPeerSelector;

impl PeerSelector for RandomPeerSelector {
    fn select(&mut self, candidates: &[String]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(rand::rng().random_range(0..candidates.len()))
    }
}

/// Always the first candidate, for reproducible runs
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstPeerSelector;

impl PeerSelector for FirstPeerSelector {
    fn select(&mut self, candidates: &[String]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Random choice from a seeded generator, for replayable simulations
#[derive(Debug, Clone)]
pub struct SeededPeerSelector {
    rng: StdRng,
}

impl SeededPeerSelector {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl PeerSelector for SeededPeerSelector {
    fn select(&mut self, candidates: &[String]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(self.rng.random_range(0..candidates.len()))
    }
}

impl<F> PeerSelector for F
where
    F: FnMut(&[String]) -> Option<usize> + Send,
{
    fn select(&mut self, candidates: &[String]) -> Option<usize> {
        self(candidates)
    }
}
