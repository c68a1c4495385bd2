#![no_main]
use libfuzzer_sys::fuzz_target;
use tempo_sync::tempo::timefmt::parse_api_datetime;
use tempo_sync::tempo::{ParseOptions, parse_response};

fuzz_target!(|data: &[u8]| {
    // Arbitrary text through the timestamp codec
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_api_datetime(text);
    }

    // Arbitrary JSON through the payload parser
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Ok(result) = parse_response(&payload, &ParseOptions::default()) {
        assert_eq!(
            result.date_aligned_days.len(),
            result.hour_shifted_days.len()
        );
        assert_eq!(result.horizon.is_none(), result.date_aligned_days.is_empty());
    }
});
