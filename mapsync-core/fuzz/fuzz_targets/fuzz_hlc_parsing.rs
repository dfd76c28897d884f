#![no_main]

use libfuzzer_sys::fuzz_target;
use mapsync_core::hlc::{Hlc, HlcTimestamp, ManualClock, MAX_WALLTIME};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(parsed) = HlcTimestamp::parse(raw) else {
        return;
    };
    assert_eq!(HlcTimestamp::parse(&parsed.serialize()), Ok(parsed.clone()));

    // Merging any valid reading moves the clock past it
    let mut clock = Hlc::with_node_id("fuzz", Arc::new(ManualClock::new(0))).expect("valid node id");
    // Parsed readings are always within the wire width, so merging succeeds
    let merged = clock.receive(&parsed).expect("parsed reading merges");
    assert!(merged > parsed || (parsed.walltime, parsed.counter) == (MAX_WALLTIME, u32::MAX));
});
