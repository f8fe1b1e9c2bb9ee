#![no_main]

use chain_reaction_server::protocol::ClientMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw-byte path, including serde_json's own UTF-8 validation.
    let _ = serde_json::from_slice::<ClientMessage>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(msg) = serde_json::from_str::<ClientMessage>(s) {
            // Anything we accept must re-encode and parse back to itself.
            let json = serde_json::to_string(&msg).expect("re-encode");
            let again: ClientMessage = serde_json::from_str(&json).expect("re-parse");
            assert_eq!(msg, again);
        }
    }
});
