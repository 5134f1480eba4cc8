#![no_main]

use libfuzzer_sys::fuzz_target;
use lti_gateway::{Consumer, ConsumerRegistry, LaunchRequest};

fuzz_target!(|data: &[u8]| {
    // Arbitrary form bodies must be rejected or accepted, never panic
    let registry: ConsumerRegistry =
        [Consumer::new("demo_key", "demo_secret")].into_iter().collect();
    let request = LaunchRequest::new("POST", "https://tool.example/launch")
        .with_parameters(url::form_urlencoded::parse(data).into_owned());
    let _ = lti_gateway::verify::verify(&registry, &request);
});
