//! Serde helpers for byte fields that travel as JSON.

/// Serializes byte buffers as lowercase hex strings.
///
/// Works for any field type that can be viewed as a byte slice and built
/// from a `Vec<u8>` (`Vec<u8>`, `bytes::Bytes`).
pub mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: From<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map(T::from).map_err(de::Error::custom)
    }
}
