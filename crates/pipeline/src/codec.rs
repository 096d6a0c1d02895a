//! Codec registry: name-keyed decoders producing tagged values.
//!
//! Decoding is fault-tolerant. Any failure inside a codec (short input,
//! parse error, panic) surfaces as `None`, which the pipeline treats as a
//! decode failure.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use base64::Engine;
use tracing::warn;

use i3x_core::config::{CodecOptions, Endian};
use i3x_core::Value;

/// A payload decoder.
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;
    fn decode(&self, bytes: &[u8], options: &CodecOptions) -> Option<Value>;
}

/// Name-keyed codec mapping; later registration overwrites earlier.
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CodecRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry pre-loaded with every built-in codec.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Raw));
        registry.register(Arc::new(Utf8));
        registry.register(Arc::new(Json));
        registry.register(Arc::new(Base64Text));
        registry.register(Arc::new(Int::U8));
        registry.register(Arc::new(Int::I8));
        registry.register(Arc::new(Int::U16));
        registry.register(Arc::new(Int::I16));
        registry.register(Arc::new(Int::U32));
        registry.register(Arc::new(Int::I32));
        registry.register(Arc::new(Float::F32));
        registry.register(Arc::new(Float::F64));
        registry.register(Arc::new(Reserved("protobuf")));
        registry.register(Arc::new(Reserved("msgpack")));
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.name().to_string(), codec);
    }

    pub fn names(&self) -> Vec<String> {
        self.codecs.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }

    /// Decode with the named codec. Unknown codec, decode failure, and
    /// codec panics all yield `None`.
    pub fn decode(&self, name: &str, bytes: &[u8], options: &CodecOptions) -> Option<Value> {
        let codec = self.codecs.get(name)?;
        match catch_unwind(AssertUnwindSafe(|| codec.decode(bytes, options))) {
            Ok(value) => value,
            Err(_) => {
                warn!(codec = name, "codec panicked during decode");
                None
            }
        }
    }
}

// ----------------------------------------------------------------------
// Built-ins

struct Raw;

impl Codec for Raw {
    fn name(&self) -> &str {
        "raw"
    }
    fn decode(&self, bytes: &[u8], _: &CodecOptions) -> Option<Value> {
        Some(Value::Bytes(bytes.to_vec()))
    }
}

struct Utf8;

impl Codec for Utf8 {
    fn name(&self) -> &str {
        "utf8"
    }
    fn decode(&self, bytes: &[u8], _: &CodecOptions) -> Option<Value> {
        std::str::from_utf8(bytes).ok().map(|s| Value::String(s.to_string()))
    }
}

struct Json;

impl Codec for Json {
    fn name(&self) -> &str {
        "json"
    }
    fn decode(&self, bytes: &[u8], _: &CodecOptions) -> Option<Value> {
        serde_json::from_slice::<serde_json::Value>(bytes)
            .ok()
            .map(Value::from)
    }
}

/// Input bytes are base64 text; output is the decoded bytes.
struct Base64Text;

impl Codec for Base64Text {
    fn name(&self) -> &str {
        "base64"
    }
    fn decode(&self, bytes: &[u8], _: &CodecOptions) -> Option<Value> {
        let text = std::str::from_utf8(bytes).ok()?;
        base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .ok()
            .map(Value::Bytes)
    }
}

/// Fixed-width integer codecs. Short inputs yield `None`, not a partial
/// value.
enum Int {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl Int {
    fn width(&self) -> usize {
        match self {
            Int::U8 | Int::I8 => 1,
            Int::U16 | Int::I16 => 2,
            Int::U32 | Int::I32 => 4,
        }
    }
}

impl Codec for Int {
    fn name(&self) -> &str {
        match self {
            Int::U8 => "uint8",
            Int::I8 => "int8",
            Int::U16 => "uint16",
            Int::I16 => "int16",
            Int::U32 => "uint32",
            Int::I32 => "int32",
        }
    }

    fn decode(&self, bytes: &[u8], options: &CodecOptions) -> Option<Value> {
        let width = self.width();
        if bytes.len() < width {
            return None;
        }
        let raw = &bytes[..width];
        let big = options.endian == Endian::Big;
        let n = match self {
            Int::U8 => raw[0] as f64,
            Int::I8 => raw[0] as i8 as f64,
            Int::U16 => {
                let arr = [raw[0], raw[1]];
                (if big { u16::from_be_bytes(arr) } else { u16::from_le_bytes(arr) }) as f64
            }
            Int::I16 => {
                let arr = [raw[0], raw[1]];
                (if big { i16::from_be_bytes(arr) } else { i16::from_le_bytes(arr) }) as f64
            }
            Int::U32 => {
                let arr = [raw[0], raw[1], raw[2], raw[3]];
                (if big { u32::from_be_bytes(arr) } else { u32::from_le_bytes(arr) }) as f64
            }
            Int::I32 => {
                let arr = [raw[0], raw[1], raw[2], raw[3]];
                (if big { i32::from_be_bytes(arr) } else { i32::from_le_bytes(arr) }) as f64
            }
        };
        Some(Value::Number(n))
    }
}

/// IEEE 754 float codecs.
enum Float {
    F32,
    F64,
}

impl Codec for Float {
    fn name(&self) -> &str {
        match self {
            Float::F32 => "float32",
            Float::F64 => "float64",
        }
    }

    fn decode(&self, bytes: &[u8], options: &CodecOptions) -> Option<Value> {
        let big = options.endian == Endian::Big;
        match self {
            Float::F32 => {
                let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
                let n = if big { f32::from_be_bytes(raw) } else { f32::from_le_bytes(raw) };
                Some(Value::Number(n as f64))
            }
            Float::F64 => {
                let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
                let n = if big { f64::from_be_bytes(raw) } else { f64::from_le_bytes(raw) };
                Some(Value::Number(n))
            }
        }
    }
}

/// Reserved codec names that always fail to decode.
struct Reserved(&'static str);

impl Codec for Reserved {
    fn name(&self) -> &str {
        self.0
    }
    fn decode(&self, _: &[u8], _: &CodecOptions) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(name: &str, bytes: &[u8]) -> Option<Value> {
        CodecRegistry::with_builtins().decode(name, bytes, &CodecOptions::default())
    }

    fn decode_le(name: &str, bytes: &[u8]) -> Option<Value> {
        CodecRegistry::with_builtins().decode(
            name,
            bytes,
            &CodecOptions {
                endian: Endian::Little,
            },
        )
    }

    #[test]
    fn test_raw_passes_bytes_through() {
        assert_eq!(decode("raw", &[1, 2]), Some(Value::Bytes(vec![1, 2])));
    }

    #[test]
    fn test_utf8() {
        assert_eq!(
            decode("utf8", "hi".as_bytes()),
            Some(Value::String("hi".to_string()))
        );
        assert_eq!(decode("utf8", &[0xFF, 0xFE]), None);
    }

    #[test]
    fn test_json() {
        let decoded = decode("json", br#"{"t": 1.5}"#).unwrap();
        assert_eq!(decoded.get("t").and_then(Value::as_number), Some(1.5));
        assert_eq!(decode("json", b"{nope"), None);
    }

    #[test]
    fn test_base64_text_to_bytes() {
        assert_eq!(
            decode("base64", b"AQID"),
            Some(Value::Bytes(vec![1, 2, 3]))
        );
        assert_eq!(decode("base64", b"!!!"), None);
    }

    #[test]
    fn test_integers_big_and_little() {
        assert_eq!(decode("uint16", &[0x01, 0x00]), Some(Value::Number(256.0)));
        assert_eq!(decode_le("uint16", &[0x01, 0x00]), Some(Value::Number(1.0)));
        assert_eq!(decode("int8", &[0xFF]), Some(Value::Number(-1.0)));
        assert_eq!(decode("uint8", &[0xFF]), Some(Value::Number(255.0)));
        assert_eq!(
            decode("int32", &[0xFF, 0xFF, 0xFF, 0xFE]),
            Some(Value::Number(-2.0))
        );
    }

    #[test]
    fn test_signed_unsigned_agree_on_shared_range() {
        // R3: values representable in both widths decode identically.
        for n in [0u8, 1, 127] {
            assert_eq!(decode("uint8", &[n]), decode("int8", &[n]));
        }
        assert_eq!(decode("uint16", &[0x00, 0x7F]), decode("int16", &[0x00, 0x7F]));
        assert_eq!(
            decode("uint32", &[0x00, 0x00, 0x01, 0x02]),
            decode("int32", &[0x00, 0x00, 0x01, 0x02])
        );
    }

    #[test]
    fn test_float32_big_endian() {
        // 0x421C0000 is 39.0.
        assert_eq!(
            decode("float32", &[0x42, 0x1C, 0x00, 0x00]),
            Some(Value::Number(39.0))
        );
    }

    #[test]
    fn test_float64_little_endian() {
        let bytes = 1.5f64.to_le_bytes();
        assert_eq!(decode_le("float64", &bytes), Some(Value::Number(1.5)));
    }

    #[test]
    fn test_short_input_yields_none() {
        assert_eq!(decode("uint16", &[0x01]), None);
        assert_eq!(decode("uint32", &[0x01, 0x02]), None);
        assert_eq!(decode("float32", &[0x42]), None);
        assert_eq!(decode("float64", &[0; 7]), None);
        assert_eq!(decode("uint8", &[]), None);
    }

    #[test]
    fn test_reserved_codecs_always_fail() {
        assert_eq!(decode("protobuf", &[1, 2, 3]), None);
        assert_eq!(decode("msgpack", &[1, 2, 3]), None);
    }

    #[test]
    fn test_unknown_codec_yields_none() {
        assert_eq!(decode("nope", &[1]), None);
    }

    #[test]
    fn test_registration_overwrites() {
        struct Fixed;
        impl Codec for Fixed {
            fn name(&self) -> &str {
                "raw"
            }
            fn decode(&self, _: &[u8], _: &CodecOptions) -> Option<Value> {
                Some(Value::Number(42.0))
            }
        }
        let mut registry = CodecRegistry::with_builtins();
        registry.register(Arc::new(Fixed));
        assert_eq!(
            registry.decode("raw", &[], &CodecOptions::default()),
            Some(Value::Number(42.0))
        );
    }
}
