//! Peers editing through a shared relay end up with the same document

use mapsync_core::hlc::HlcTimestamp;
use mapsync_core::shutdown::ShutdownCoordinator;
use mapsync_core::sync::{run_session, ConnectionState, MemoryDocument, Relay, SyncEngine, Updaters};
use mapsync_core::test_utils::{assert_converged, random_edit, test_rng_with_seed, SimulatedRoom};
use rand::Rng;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn late_joiner_catches_up_from_a_peer() {
    let mut room = SimulatedRoom::new(3);
    let a = room.add_peer("a", 10_000);
    let b = room.add_peer("b", 10_000);
    room.connect(a).unwrap();
    room.settle().unwrap();

    room.peer_mut(a).engine.upsert("map", json!("m"), json!({"name": "Nantes"})).unwrap();
    room.peer_mut(a).engine.update("feature", json!({"id": 1}), "color", json!("red")).unwrap();
    room.settle().unwrap();

    room.connect(b).unwrap();
    room.settle().unwrap();

    assert_eq!(room.peer(b).engine.log().len(), 2);
    assert!(room.peer(b).engine.last_known_hlc().is_some());
    assert_converged(&room.documents());
}

#[test]
fn offline_edits_are_shared_after_reconnecting() {
    let mut room = SimulatedRoom::new(5);
    let a = room.add_peer("a", 1_000);
    let b = room.add_peer("b", 1_000);
    room.connect(a).unwrap();
    room.connect(b).unwrap();
    room.settle().unwrap();

    room.disconnect(b);
    room.peer_mut(b).wall.advance(500);
    room.peer_mut(b).engine.update("datalayer", json!(4), "name", json!("offline")).unwrap();
    assert_eq!(room.peer(b).engine.state(), ConnectionState::Disconnected);

    // A catches up from B once B is back
    room.connect(b).unwrap();
    room.settle().unwrap();
    assert!(room.peer(a).document.field("datalayer", &json!(4), "name").is_none());

    room.disconnect(a);
    room.connect(a).unwrap();
    room.settle().unwrap();
    assert_eq!(
        room.peer(a).document.field("datalayer", &json!(4), "name"),
        Some(json!("offline"))
    );
    assert_converged(&room.documents());
}

#[test]
fn concurrent_edits_converge() {
    let mut rng = test_rng_with_seed(2024);
    let mut room = SimulatedRoom::new(11);
    for node in ["a", "b", "c", "d"] {
        let index = room.add_peer(node, 50_000);
        room.connect(index).unwrap();
    }
    room.settle().unwrap();

    for _round in 0..30 {
        // Several peers edit before anyone reads, so edits cross in flight
        for index in 0..room.len() {
            if rng.random_bool(0.6) {
                let skew = rng.random_range(0..20);
                room.peer_mut(index).wall.advance(skew);
                let edit = random_edit(&mut rng, 3);
                let peer = room.peer_mut(index);
                let stamped = peer.engine.log().clock().current().clone();
                peer.engine.commit(edit).unwrap();
                assert!(peer.engine.log().clock().current() > &stamped);
            }
        }
        room.settle().unwrap();
    }

    assert_converged(&room.documents());
    let total: usize = room.peers().iter().map(|peer| peer.engine.stats().local_operations as usize).sum();
    for peer in room.peers() {
        assert_eq!(peer.engine.log().len(), total);
    }
}

#[tokio::test]
async fn sessions_converge_and_stop_on_shutdown() {
    let relay = Relay::new();
    let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_millis(50)));

    // Everyone joins before anyone edits
    let mut members = Vec::new();
    for _ in 0..3 {
        let document = Arc::new(MemoryDocument::new());
        let mut engine = SyncEngine::new(Updaters::for_default_subjects(document.clone()));
        let (transport, inbox) = relay.join("token").unwrap();
        engine.start(Box::new(transport));
        members.push((engine, inbox, document));
    }

    let mut handles = Vec::new();
    let mut documents = Vec::new();
    for (index, (mut engine, mut inbox, document)) in members.into_iter().enumerate() {
        documents.push(document);
        let mut shutdown = coordinator.subscribe();
        handles.push(tokio::spawn(async move {
            for step in 0..5 {
                engine
                    .update("feature", json!({"id": step}), "editor", json!(index))
                    .unwrap();
                tokio::task::yield_now().await;
            }
            run_session(&mut engine, &mut inbox, &mut shutdown).await.unwrap();
            engine
        }));
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    coordinator.shutdown().await;

    for handle in handles {
        let engine = handle.await.unwrap();
        assert_eq!(engine.state(), ConnectionState::Disconnected);
        // Catch-up may deliver operations a peer already had live
        let distinct: HashSet<&HlcTimestamp> = engine.log().iter().map(|op| &op.hlc).collect();
        assert_eq!(distinct.len(), 15);
    }
    let documents: Vec<&MemoryDocument> = documents.iter().map(|doc| doc.as_ref()).collect();
    assert_converged(&documents);
    assert!(relay.is_empty());
}
