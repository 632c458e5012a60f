#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use tether::config::{parse_inventory, InventoryFormat};

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Parsing and validation must reject, never panic, in either format
        let _ = parse_inventory(content, InventoryFormat::Yaml, Path::new("peers.yaml"));
        let _ = parse_inventory(content, InventoryFormat::Toml, Path::new("peers.toml"));
    }
});
