//! Property tests for the response unwrapper

use super::{extract_payload, unwrap_json};
use proptest::prelude::*;
use serde_json::Value;

proptest! {
    // Any JSON document wrapped in a ```json fence, with prose on either
    // side, comes back out identical to the original.
    #[test]
    fn fenced_json_survives_extraction(
        n in -1_000_000i64..1_000_000,
        s in "[a-zA-Z0-9 ]{0,40}",
        lead in "[a-zA-Z ,.]{0,60}",
        trail in "[a-zA-Z ,.]{0,60}",
    ) {
        let doc = serde_json::json!({"n": n, "s": s, "nested": {"list": [n, n + 1]}});
        let body = serde_json::to_string_pretty(&doc).unwrap();
        let text = format!("{lead}\n\n```json\n{body}\n```\n\n{trail}");
        prop_assert_eq!(unwrap_json(&text).unwrap(), doc);
    }

    // Without any fence markers the unwrapper behaves exactly like a plain
    // JSON parse of the (trimmed) input. Tildes are excluded because they
    // open markdown fences of their own.
    #[test]
    fn no_fences_matches_direct_parse(input in "[^`~]{0,200}") {
        let extracted = extract_payload(&input);
        prop_assert!(!extracted.fenced);
        match serde_json::from_str::<Value>(input.trim()) {
            Ok(doc) => prop_assert_eq!(unwrap_json(&input).unwrap(), doc),
            Err(_) => prop_assert!(unwrap_json(&input).is_err()),
        }
    }

    // Garbage before a json fence never changes which payload is chosen.
    #[test]
    fn json_fence_wins_regardless_of_prefix(prefix in "[a-zA-Z0-9 \n]{0,80}") {
        let text = format!("{prefix}\n```json\n[true]\n```");
        prop_assert_eq!(unwrap_json(&text).unwrap(), serde_json::json!([true]));
    }
}
