#![no_main]
use chargewatch::backend::types;
use chargewatch::status::StatusValue;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = StatusValue::from_token(text);
    }

    // Backend payloads are untrusted JSON; decoders must never panic
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let _ = types::decode_number(&value);
    let _ = types::decode_timestamp(&value);
    let _ = types::decode_status(&value);
    let _ = types::decode_telemetry(&value);
    let _ = types::decode_session_energy(&value);
    let _ = types::decode_price(&value);
    let _ = types::decode_balance(&value);
});
