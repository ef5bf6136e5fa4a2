//! Response serialization with optional gzip.
//!
//! # Design Decisions
//! - The canonical (uncompressed) text is always captured for logging
//! - Wire bytes keep the JSON encoder's trailing newline; the log text drops it
//! - The gzip stream is finished before `encode` returns

use std::io::{self, Write};

use bytes::{BufMut, BytesMut};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::api::handler::Payload;

/// Serializes payloads into caller-provided buffers.
#[derive(Debug, Clone, Copy)]
pub struct ResponseEncoder {
    level: Compression,
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { level: Compression::default() }
    }
}

impl ResponseEncoder {
    pub fn new(gzip_level: u32) -> Self {
        Self { level: Compression::new(gzip_level) }
    }

    /// Write `payload` into `sink` and return its log text.
    ///
    /// `canonical` is scratch space for the uncompressed bytes. A `None`
    /// payload writes nothing and returns an empty string.
    pub fn encode(
        &self,
        payload: Option<&Payload>,
        compress: bool,
        sink: &mut BytesMut,
        canonical: &mut BytesMut,
    ) -> io::Result<String> {
        let Some(payload) = payload else {
            return Ok(String::new());
        };

        write_canonical(payload, canonical)?;

        if compress {
            let mut gzip = GzEncoder::new((&mut *sink).writer(), self.level);
            gzip.write_all(canonical)?;
            gzip.finish()?;
        } else {
            sink.extend_from_slice(canonical);
        }

        Ok(trim_eol(&String::from_utf8_lossy(canonical)).to_owned())
    }
}

fn write_canonical(payload: &Payload, out: &mut BytesMut) -> io::Result<()> {
    match payload {
        Payload::Raw(bytes) => out.extend_from_slice(bytes),
        Payload::Json(value) => {
            serde_json::to_writer((&mut *out).writer(), value)?;
            out.put_u8(b'\n');
        }
    }
    Ok(())
}

/// Drop a single trailing `\n`.
fn trim_eol(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;

    fn run(payload: Option<&Payload>, compress: bool) -> (BytesMut, String) {
        let mut sink = BytesMut::new();
        let mut scratch = BytesMut::new();
        let text = ResponseEncoder::default()
            .encode(payload, compress, &mut sink, &mut scratch)
            .unwrap();
        (sink, text)
    }

    #[test]
    fn test_none_writes_nothing() {
        let (sink, text) = run(None, true);
        assert!(sink.is_empty());
        assert!(text.is_empty());
    }

    #[test]
    fn test_plain_json_keeps_newline_on_wire() {
        let payload = Payload::Json(json!({"ErrorCode": 500, "Cause": "bad id"}));
        let (sink, text) = run(Some(&payload), false);
        assert_eq!(&sink[..], b"{\"ErrorCode\":500,\"Cause\":\"bad id\"}\n");
        assert_eq!(text, r#"{"ErrorCode":500,"Cause":"bad id"}"#);
    }

    #[test]
    fn test_gzip_round_trip_and_log_text_uncompressed() {
        let value = json!({"id": 7, "title": "Solaris", "tags": ["sf", "classic"]});
        let (sink, text) = run(Some(&Payload::Json(value.clone())), true);

        assert_eq!(&sink[..2], &[0x1f, 0x8b], "gzip magic");
        let mut decoded = String::new();
        GzDecoder::new(&sink[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&decoded).unwrap(), value);
        assert_eq!(text, value.to_string());
    }

    #[test]
    fn test_raw_bytes_written_verbatim() {
        let payload = Payload::Raw(Bytes::from_static(b"[1,2,3]"));
        let (sink, text) = run(Some(&payload), false);
        assert_eq!(&sink[..], b"[1,2,3]");
        assert_eq!(text, "[1,2,3]");
    }

    #[test]
    fn test_uncompressed_encoding_is_idempotent() {
        let payload = Payload::Json(json!({"b": 1, "a": [true, null]}));
        let (first, _) = run(Some(&payload), false);
        let (second, _) = run(Some(&payload), false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_trim_eol_only_strips_one() {
        assert_eq!(trim_eol("x\n\n"), "x\n");
        assert_eq!(trim_eol("x"), "x");
        assert_eq!(trim_eol(""), "");
    }
}
