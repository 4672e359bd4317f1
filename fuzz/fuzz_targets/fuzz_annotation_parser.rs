#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(description) = std::str::from_utf8(data) {
        let _ = mcp_gite::domain::annotation::parse(description);
    }
});
