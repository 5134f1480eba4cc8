#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use lti_gateway::oauth::header;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = std::str::from_utf8(data) {
        // Parsed oauth_* parameters must survive being rendered again
        if let Some(params) = header::parse_authorization(value) {
            let oauth: BTreeMap<String, String> = params
                .into_iter()
                .filter(|(key, _)| key.starts_with("oauth_"))
                .collect();

            let rendered = header::authorization_header(&oauth);
            let reparsed = header::parse_authorization(&rendered)
                .expect("rendered header must parse");
            assert_eq!(reparsed, oauth);
        }
    }
});
