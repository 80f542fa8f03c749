//! JSON body codec with configurable key conventions.
//!
//! The default codec writes object keys in `snake_case` and reads `snake_case`
//! keys back as `camelCase`, at every nesting depth. Types decoded with it
//! are expected to carry `camelCase` field names, which for Rust structs
//! means `#[serde(rename_all = "camelCase")]`. A struct with multi-word
//! `snake_case` fields and no rename does not decode under the default
//! codec; use [`JsonCodec::plain`] for those.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// How object keys are written when encoding a request body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyEncodingStrategy {
    /// Keys are written exactly as serialized
    UseDefaultKeys,
    /// `camelCase` keys are rewritten to `snake_case`
    #[default]
    ConvertToSnakeCase,
}

/// How object keys are read when decoding a response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyDecodingStrategy {
    /// Keys are matched exactly as received
    UseDefaultKeys,
    /// `snake_case` keys are rewritten to `camelCase` before matching
    #[default]
    ConvertFromSnakeCase,
}

/// JSON encoder/decoder pair shared by a client
///
/// Immutable after construction; clients hold it behind an `Arc`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec {
    pub key_encoding: KeyEncodingStrategy,
    pub key_decoding: KeyDecodingStrategy,
}

impl JsonCodec {
    #[must_use]
    pub const fn new(key_encoding: KeyEncodingStrategy, key_decoding: KeyDecodingStrategy) -> Self {
        Self {
            key_encoding,
            key_decoding,
        }
    }

    /// Codec that leaves keys untouched in both directions
    #[must_use]
    pub const fn plain() -> Self {
        Self::new(
            KeyEncodingStrategy::UseDefaultKeys,
            KeyDecodingStrategy::UseDefaultKeys,
        )
    }

    /// Serialize `value` to JSON bytes
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `value` cannot be represented as JSON
    /// (for example a map with non-string keys).
    pub fn encode<B>(&self, value: &B) -> Result<Bytes, serde_json::Error>
    where
        B: Serialize + ?Sized,
    {
        match self.key_encoding {
            KeyEncodingStrategy::UseDefaultKeys => serde_json::to_vec(value).map(Bytes::from),
            KeyEncodingStrategy::ConvertToSnakeCase => {
                let tree = rewrite_keys(serde_json::to_value(value)?, to_snake_case);
                serde_json::to_vec(&tree).map(Bytes::from)
            }
        }
    }

    /// Deserialize JSON bytes into `T`
    ///
    /// # Errors
    ///
    /// Returns the deserializer error if `bytes` is not valid JSON or does not
    /// match the shape of `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, serde_json::Error> {
        match self.key_decoding {
            KeyDecodingStrategy::UseDefaultKeys => serde_json::from_slice(bytes),
            KeyDecodingStrategy::ConvertFromSnakeCase => {
                let tree = rewrite_keys(serde_json::from_slice(bytes)?, to_camel_case);
                serde_json::from_value(tree)
            }
        }
    }
}

fn rewrite_keys(value: Value, convert: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (convert(&key), rewrite_keys(value, convert)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|value| rewrite_keys(value, convert))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Convert a `camelCase` key to `snake_case`
///
/// A word boundary is placed before an uppercase letter that follows a
/// non-uppercase character, and before the last letter of an uppercase run
/// when a lowercase letter follows it, so `myURLValue` becomes
/// `my_url_value`.
#[must_use]
pub fn to_snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let starts_word = (!prev.is_uppercase() && prev != '_')
                || (prev.is_uppercase() && next_is_lower);
            if starts_word {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

/// Convert a `snake_case` key to `camelCase`
///
/// Leading and trailing underscores are kept. The first word is kept as-is
/// and each following word is capitalized (`user_id` becomes `userId`).
/// Keys without inner underscores are returned unchanged.
#[must_use]
pub fn to_camel_case(key: &str) -> String {
    let core = key.trim_matches('_');
    if core.is_empty() || !core.contains('_') {
        return key.to_owned();
    }

    let leading = key.len() - key.trim_start_matches('_').len();
    let trailing = key.len() - key.trim_end_matches('_').len();

    let mut out = String::with_capacity(key.len());
    out.push_str(&key[..leading]);

    let mut words = core.split('_').filter(|w| !w.is_empty());
    if let Some(first) = words.next() {
        out.push_str(first);
    }
    for word in words {
        let mut chars = word.chars();
        if let Some(head) = chars.next() {
            out.extend(head.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }

    out.push_str(&key[key.len() - trailing..]);
    out
}
