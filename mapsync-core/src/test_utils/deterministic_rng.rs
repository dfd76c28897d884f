/*!
    Deterministic RNG helpers for reproducible tests

    Seeded generators and a random-edit factory, so convergence tests and
    the CLI simulation replay the same edits for the same seed.
*/

use crate::oplog::NewOperation;
use crate::sync::DEFAULT_SUBJECTS;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// Default seed for deterministic tests
pub const DEFAULT_TEST_SEED: u64 = 42;

/// Field names random edits write to
pub const EDIT_KEYS: [&str; 4] = ["name", "color", "weight", "opacity"];

/// Create a deterministic RNG with a custom seed
pub fn test_rng_with_seed(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A random field edit on one of `entities` entities per default subject
///
/// Four in five are updates, the rest deletes. Whole-entity upserts are
/// left out: a concurrent upsert and field write to the same entity can
/// resolve differently on different peers.
pub fn random_edit<R: Rng>(rng: &mut R, entities: u32) -> NewOperation {
    random_edit_for(rng, &DEFAULT_SUBJECTS[..], entities)
}

/// `random_edit` restricted to `subjects`; the default subjects when empty
pub fn random_edit_for<R: Rng, S: AsRef<str>>(rng: &mut R, subjects: &[S], entities: u32) -> NewOperation {
    let subject = if subjects.is_empty() {
        DEFAULT_SUBJECTS[rng.random_range(0..DEFAULT_SUBJECTS.len())]
    } else {
        subjects[rng.random_range(0..subjects.len())].as_ref()
    };
    let metadata = json!({ "id": rng.random_range(0..entities.max(1)) });
    let key = EDIT_KEYS[rng.random_range(0..EDIT_KEYS.len())];

    if rng.random_range(0..5u8) == 0 {
        NewOperation::delete(subject, metadata, key)
    } else {
        NewOperation::update(subject, metadata, key, json!(rng.random_range(0..1_000u32)))
    }
}
