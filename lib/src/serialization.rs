//! Persistence of fitted parameters and pipeline artefacts.
//!
//! Everything written by the pipeline (raw samples, flattened tables, model
//! parameters, result tables) goes through [`SerializableParams`], which is
//! implemented for every serde type with bincode as the wire format.

use crate::error::Result;
use std::error::Error;
use std::path::Path;

/// A representation that can be serialized to and from bytes.
///
/// Implementors hold plain host data (`Vec<f32>`, scalars, strings), never
/// backend tensors.
pub trait SerializableParams: Sized {
    /// The error type returned during (de)serialization.
    type Error: Error + Send + Sync + 'static;

    /// Serialize into a byte buffer.
    fn to_bytes(&self) -> std::result::Result<Vec<u8>, Self::Error>;

    /// Deserialize from a byte buffer.
    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, Self::Error>;
}

impl<T> SerializableParams for T
where
    T: serde::Serialize + for<'de> serde::Deserialize<'de>,
{
    type Error = bincode::Error;

    fn to_bytes(&self) -> std::result::Result<Vec<u8>, Self::Error> {
        bincode::serialize(self)
    }

    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, Self::Error> {
        bincode::deserialize(bytes)
    }
}

/// Writes `value` to `path`, creating parent directories as needed.
pub fn save_bincode<T>(value: &T, path: &Path) -> Result<()>
where
    T: serde::Serialize + for<'de> serde::Deserialize<'de>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, value.to_bytes()?)?;
    Ok(())
}

/// Reads a value written by [`save_bincode`].
pub fn load_bincode<T>(path: &Path) -> Result<T>
where
    T: serde::Serialize + for<'de> serde::Deserialize<'de>,
{
    let bytes = std::fs::read(path)?;
    Ok(T::from_bytes(&bytes)?)
}
