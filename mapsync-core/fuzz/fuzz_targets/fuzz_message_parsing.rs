#![no_main]

use libfuzzer_sys::fuzz_target;
use mapsync_core::sync::Message;

fuzz_target!(|data: &[u8]| {
    // Inbound frames come straight off the wire; decoding must never panic
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(message) = Message::from_json(raw) {
        // Anything that decodes must survive a re-encode unchanged
        let encoded = message.to_json().expect("decoded message re-encodes");
        let decoded = Message::from_json(&encoded).expect("re-encoded message decodes");
        assert_eq!(decoded, message);
    }
});
