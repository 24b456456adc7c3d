#![no_main]

use compat_quake::map;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = map::parse_map(text);
    }
});
