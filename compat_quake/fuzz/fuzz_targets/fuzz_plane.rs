#![no_main]

use compat_quake::map;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let _ = map::parse_plane(&line);
});
