//! Two peers editing one map through an in-process relay
//!
//! Run with:
//! ```bash
//! RUST_LOG=mapsync_core=debug cargo run --example two_peers
//! ```

use mapsync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use mapsync_core::sync::{drain, MemoryDocument, Relay, SyncEngine, Updaters};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_with_config(LogConfig::new(LogLevel::Debug).with_target(true))?;

    let relay = Relay::new();

    let alice_doc = Arc::new(MemoryDocument::new());
    let mut alice = SyncEngine::new(Updaters::for_default_subjects(alice_doc.clone()));
    let (transport, mut alice_inbox) = relay.join("alice-token")?;
    alice.start(Box::new(transport));
    drain(&mut alice, &mut alice_inbox)?;

    // Alice edits alone for a while
    alice.upsert("map", json!("m"), json!({"name": "Harbour walk"}))?;
    alice.update("feature", json!({"id": 1}), "color", json!("teal"))?;

    let bob_doc = Arc::new(MemoryDocument::new());
    let mut bob = SyncEngine::new(Updaters::for_default_subjects(bob_doc.clone()));
    let (transport, mut bob_inbox) = relay.join("bob-token")?;
    bob.start(Box::new(transport));

    // Bob asks Alice for everything, Alice answers
    while drain(&mut bob, &mut bob_inbox)? + drain(&mut alice, &mut alice_inbox)? > 0 {}

    bob.update("feature", json!({"id": 1}), "color", json!("orange"))?;
    while drain(&mut bob, &mut bob_inbox)? + drain(&mut alice, &mut alice_inbox)? > 0 {}

    info!(alice = ?alice_doc.snapshot(), "Alice's document");
    info!(bob = ?bob_doc.snapshot(), "Bob's document");
    info!(converged = alice_doc.snapshot() == bob_doc.snapshot(), "Done");

    alice.stop();
    bob.stop();
    Ok(())
}
