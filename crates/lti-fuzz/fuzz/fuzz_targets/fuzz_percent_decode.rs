#![no_main]

use libfuzzer_sys::fuzz_target;
use lti_gateway::oauth::encode;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = std::str::from_utf8(data) {
        if let Some(decoded) = encode::percent_decode(value) {
            let _ = encode::percent_encode(&decoded);
        }
    }
});
