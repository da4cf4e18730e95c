fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use roomdrop_protocol::{Acknowledgement, Action, Chunk, Message, Metadata};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_metadata() {
        let meta: Metadata = roundtrip_test("metadata.json");
        assert_eq!(meta.total_chunks, 3);
        assert!(meta.checksum.is_some());
    }

    #[test]
    fn fixture_metadata_without_checksum() {
        let meta: Metadata = roundtrip_test("metadata_minimal.json");
        assert_eq!(meta.size, 0);
        assert!(meta.checksum.is_none());
    }

    #[test]
    fn fixture_chunk() {
        let chunk: Chunk = roundtrip_test("chunk.json");
        assert_eq!(chunk.index, 2);
        assert!(chunk.is_last);
    }

    #[test]
    fn fixture_ack_accepted() {
        let ack: Acknowledgement = roundtrip_test("ack_accepted.json");
        assert!(ack.accepted);
        assert!(ack.reason.is_none());
    }

    #[test]
    fn fixture_ack_rejected() {
        let ack: Acknowledgement = roundtrip_test("ack_rejected.json");
        assert!(!ack.accepted);
        assert_eq!(ack.reason.as_deref(), Some("declined"));
    }

    #[test]
    fn fixture_message_envelope() {
        // RawValue payloads must be read from text, not from a parsed Value.
        let msg: Message = serde_json::from_str(&read_fixture("message_envelope.json")).unwrap();
        let reserialized = serde_json::to_value(&msg).unwrap();
        assert_eq!(reserialized, load_fixture("message_envelope.json"));
        assert_eq!(msg.action, Action::Chunk);
        let chunk: Chunk = msg.expect_payload(Action::Chunk).unwrap();
        assert_eq!(chunk.data, "AAEC");
    }

    #[test]
    fn envelope_encoded_len_matches_serialized_size() {
        let msg: Message = serde_json::from_str(&read_fixture("message_envelope.json")).unwrap();
        assert_eq!(msg.encoded_len(), serde_json::to_string(&msg).unwrap().len());

        let ack = Message::ack(&Acknowledgement::accepted("f".into())).unwrap();
        assert_eq!(ack.encoded_len(), serde_json::to_string(&ack).unwrap().len());
    }

    #[test]
    fn unknown_action_is_tolerated() {
        let msg: Message =
            serde_json::from_str(&read_fixture("message_unknown_action.json")).unwrap();
        assert_eq!(msg.action, Action::Unknown);
        assert!(msg.payload.is_some());
    }
}
