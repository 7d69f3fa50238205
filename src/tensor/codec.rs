//! Headerless float32 tensor files
//!
//! A tensor file is the row-major values of one tensor as IEEE-754 binary32
//! in native byte order. No header, no length prefix, no padding: the file
//! size is exactly `4 * element_count`.
//!
//! Reading with an expected count is strict in both directions. A short file
//! is `TruncatedFile`, a long one is `TrailingBytes`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{MelBridgeError, Result};

/// Bytes per encoded element
pub const ELEMENT_SIZE: usize = std::mem::size_of::<f32>();

/// Encode values as raw native-endian binary32
pub fn encode(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * ELEMENT_SIZE);
    for value in values {
        bytes.extend_from_slice(&value.to_ne_bytes());
    }
    bytes
}

/// Decode raw native-endian binary32. Any partial trailing element is ignored;
/// callers check the byte length first.
pub fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(ELEMENT_SIZE)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Write values to `path`, returning the number of bytes written
pub fn write_tensor(path: &Path, values: &[f32]) -> Result<u64> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&encode(values))?;
    writer.flush()?;

    let bytes = (values.len() * ELEMENT_SIZE) as u64;
    debug!(path = %path.display(), bytes, "wrote tensor file");
    Ok(bytes)
}

/// Read exactly `expected_len` values from `path`
///
/// # Errors
/// * `MissingFile` - If the file does not exist
/// * `TruncatedFile` - If the file holds fewer than `expected_len` values
/// * `TrailingBytes` - If the file holds more data than `expected_len` values
pub fn read_tensor(path: &Path, expected_len: usize) -> Result<Vec<f32>> {
    let bytes = read_bytes(path)?;
    let expected_bytes = (expected_len * ELEMENT_SIZE) as u64;
    let actual_bytes = bytes.len() as u64;

    if actual_bytes < expected_bytes {
        return Err(MelBridgeError::TruncatedFile {
            path: path.to_path_buf(),
            expected_bytes,
            actual_bytes,
        });
    }
    if actual_bytes > expected_bytes {
        return Err(MelBridgeError::TrailingBytes {
            path: path.to_path_buf(),
            expected_bytes,
            actual_bytes,
        });
    }

    Ok(decode(&bytes))
}

/// Read every value in `path`, whatever the count
///
/// A byte length that is not a multiple of four is `TruncatedFile`: the last
/// element was cut short.
pub fn read_all(path: &Path) -> Result<Vec<f32>> {
    let bytes = read_bytes(path)?;
    let remainder = bytes.len() % ELEMENT_SIZE;
    if remainder != 0 {
        return Err(MelBridgeError::TruncatedFile {
            path: path.to_path_buf(),
            expected_bytes: (bytes.len() + ELEMENT_SIZE - remainder) as u64,
            actual_bytes: bytes.len() as u64,
        });
    }
    Ok(decode(&bytes))
}

/// Write values, read them back and require bit-identical contents
///
/// Any difference means the export step corrupted the data and is fatal.
pub fn write_verified(path: &Path, values: &[f32]) -> Result<u64> {
    let bytes = write_tensor(path, values)?;
    let loaded = read_tensor(path, values.len())?;

    if let Some(index) = first_bit_difference(values, &loaded) {
        return Err(MelBridgeError::RoundTripMismatch {
            path: path.to_path_buf(),
            index,
        });
    }

    debug!(path = %path.display(), "round-trip check passed");
    Ok(bytes)
}

/// Index of the first element whose bit pattern differs
pub fn first_bit_difference(a: &[f32], b: &[f32]) -> Option<usize> {
    if a.len() != b.len() {
        return Some(a.len().min(b.len()));
    }
    a.iter()
        .zip(b.iter())
        .position(|(x, y)| x.to_bits() != y.to_bits())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MelBridgeError::MissingFile {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(MelBridgeError::Io(e)),
    }
}
