//! Codecs translate leaf values to and from the bytes stored on disk.

use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;

pub trait Codec: Send + Sync + 'static {
    type Value: Clone + PartialEq + Debug + Send + Sync + 'static;

    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, CodecError>;
}

/// UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    type Value = String;

    fn encode(&self, value: &String) -> Result<Vec<u8>, CodecError> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::decode("String", e))
    }
}

/// Raw bytes, stored untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

macro_rules! serde_codec {
    ($(#[$doc:meta])* $codec:ident) => {
        $(#[$doc])*
        pub struct $codec<T>(PhantomData<fn() -> T>);

        impl<T> $codec<T> {
            pub fn new() -> Self {
                Self(PhantomData)
            }
        }

        impl<T> Default for $codec<T> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T> Clone for $codec<T> {
            fn clone(&self) -> Self {
                Self::new()
            }
        }

        impl<T> Debug for $codec<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}<{}>", stringify!($codec), std::any::type_name::<T>())
            }
        }
    };
}

serde_codec!(
    /// Pretty-printed JSON via `serde_json`
    JsonCodec
);
serde_codec!(
    /// TOML documents via `toml`; the value must serialize as a table
    TomlCodec
);
serde_codec!(
    /// Compact binary via `bincode`
    BincodeCodec
);

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec_pretty(value)
            .map_err(|e| CodecError::encode(std::any::type_name::<T>(), e))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::decode(std::any::type_name::<T>(), e))
    }
}

impl<T> Codec for TomlCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        toml::to_string_pretty(value)
            .map(String::into_bytes)
            .map_err(|e| CodecError::encode(std::any::type_name::<T>(), e))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::decode(std::any::type_name::<T>(), e))?;
        toml::from_str(text).map_err(|e| CodecError::decode(std::any::type_name::<T>(), e))
    }
}

impl<T> Codec for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::encode(std::any::type_name::<T>(), e))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::decode(std::any::type_name::<T>(), e))
    }
}
