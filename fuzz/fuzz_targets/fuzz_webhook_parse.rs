#![no_main]

use libfuzzer_sys::fuzz_target;
use wamedia::message::WebhookDelivery;

// Arbitrary bytes must never panic the webhook envelope parser; at worst
// they produce a deserialization error the gateway maps to a 400.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(delivery) = serde_json::from_str::<WebhookDelivery>(text) {
            let _ = delivery.is_status_update();
            let _ = delivery.into_messages();
        }
    }
});
