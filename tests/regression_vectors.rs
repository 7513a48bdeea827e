use tscodec::codec::{self, Bucket};
use tscodec::engine::{self, EncodeOptions};

#[derive(Debug)]
struct Vector {
    name: String,
    values: Vec<i64>,
    encoded: Vec<u8>,
}

fn hex_to_bytes(s: &str) -> Vec<u8> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    assert!(
        s.len().is_multiple_of(2),
        "hex string must have even length"
    );
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn load_vectors() -> Vec<Vector> {
    let manifest = include_str!("vectors/manifest.tsv");
    manifest
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            let parts: Vec<_> = line.split('|').collect();
            assert_eq!(parts.len(), 3, "invalid vector row: {line}");
            Vector {
                name: parts[0].to_string(),
                values: parts[1]
                    .split(',')
                    .map(|v| v.trim().parse().unwrap())
                    .collect(),
                encoded: hex_to_bytes(parts[2]),
            }
        })
        .collect()
}

#[test]
fn vector_database_is_non_empty() {
    let vectors = load_vectors();
    assert!(vectors.len() >= 10);
}

#[test]
fn encode_matches_all_vectors() {
    for v in load_vectors() {
        let encoded = codec::encode(&v.values)
            .unwrap_or_else(|e| panic!("encode failed for {}: {e}", v.name));
        assert_eq!(encoded, v.encoded, "vector {}", v.name);
    }
}

#[test]
fn decode_matches_all_vectors() {
    for v in load_vectors() {
        let decoded = codec::decode(&v.encoded)
            .unwrap_or_else(|e| panic!("decode failed for {}: {e}", v.name));
        assert_eq!(decoded, v.values, "vector {}", v.name);
    }
}

#[test]
fn engine_without_secondary_is_byte_identical() {
    for v in load_vectors() {
        let bytes = engine::encode_with_options(&v.values, &EncodeOptions::default()).unwrap();
        assert_eq!(bytes, v.encoded, "vector {}", v.name);
    }
}

#[test]
fn inspect_accounts_for_every_bitstream_byte() {
    for v in load_vectors() {
        let info = codec::inspect(&v.encoded).unwrap();
        assert_eq!(info.header.count, v.values.len(), "vector {}", v.name);
        assert_eq!(info.histogram.total(), v.values.len() - 2, "vector {}", v.name);
        assert_eq!(
            info.bitstream_used, info.bitstream_len,
            "vector {} has trailing bytes",
            v.name
        );
    }
}

#[test]
fn gorilla_random_uses_full_class() {
    let v = load_vectors()
        .into_iter()
        .find(|v| v.name == "gorilla_random")
        .unwrap();
    assert_eq!(
        &v.encoded[v.encoded.len() - 9..],
        &[0xf9, 0xbf, 0xde, 0xba, 0xff, 0xcb, 0xe1, 0x84, 0x5c]
    );
    let info = codec::inspect(&v.encoded).unwrap();
    assert_eq!(info.histogram.get(Bucket::Full), 1);
}
