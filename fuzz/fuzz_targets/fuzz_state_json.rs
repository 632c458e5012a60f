#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Fuzz simulation state parsing - this should never panic
        if let Ok(state) = serde_json::from_str::<tether::infrastructure::CloudState>(content) {
            let cloud = tether::InMemoryCloud::from_state(state);
            let _ = serde_json::to_string(&cloud.snapshot());
        }
    }
});
