use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

const HEADER_LEN_PREFIX: usize = 8;

#[derive(Debug, Deserialize)]
struct RawTensorInfo {
    dtype: String,
    shape: Vec<u64>,
    data_offsets: [u64; 2],
}

#[derive(Debug, Clone)]
pub struct TensorInfo {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<u64>,
    pub start: u64,
    pub end: u64,
}

impl TensorInfo {
    pub fn declared_byte_len(&self) -> u64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone)]
pub struct SafetensorsHeader {
    pub header_len: u64,
    pub tensors: Vec<TensorInfo>,
}

impl SafetensorsHeader {
    /// The absolute offset one-past-the-end of the declared data region:
    /// `8 + header_len + max(tensor end offsets)`.
    pub fn declared_total_len(&self) -> u64 {
        let max_end = self.tensors.iter().map(|t| t.end).max().unwrap_or(0);
        HEADER_LEN_PREFIX as u64 + self.header_len + max_end
    }
}

/// dtype -> size in bytes, per the safetensors spec's fixed scalar set.
pub fn dtype_size(dtype: &str) -> Option<u64> {
    Some(match dtype {
        "F64" | "I64" | "U64" => 8,
        "F32" | "I32" | "U32" => 4,
        "F16" | "BF16" | "I16" | "U16" => 2,
        "I8" | "U8" | "BOOL" | "F8_E4M3" | "F8_E5M2" => 1,
        _ => return None,
    })
}

pub fn parse_header(path: &Path) -> Result<SafetensorsHeader> {
    let mut file = File::open(path).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;

    let mut len_bytes = [0u8; HEADER_LEN_PREFIX];
    file.read_exact(&mut len_bytes).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;
    let header_len = u64::from_le_bytes(len_bytes);

    let mut header_bytes = vec![0u8; header_len as usize];
    file.read_exact(&mut header_bytes).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;

    let raw: HashMap<String, serde_json::Value> = serde_json::from_slice(&header_bytes)
        .map_err(|e| Error::SafetensorsMalformed { path: path.to_path_buf(), reason: e.to_string() })?;

    let mut tensors = Vec::with_capacity(raw.len());
    for (name, value) in raw {
        if name == "__metadata__" {
            continue;
        }
        let info: RawTensorInfo = serde_json::from_value(value)
            .map_err(|e| Error::SafetensorsMalformed { path: path.to_path_buf(), reason: format!("tensor {name}: {e}") })?;
        tensors.push(TensorInfo {
            name,
            dtype: info.dtype,
            shape: info.shape,
            start: info.data_offsets[0],
            end: info.data_offsets[1],
        });
    }
    tensors.sort_by_key(|t| t.start);

    Ok(SafetensorsHeader { header_len, tensors })
}

/// Validates every tensor's declared byte span equals `product(shape) * dtype_size`.
pub fn deep_validate(header: &SafetensorsHeader, path: &Path) -> Result<()> {
    for tensor in &header.tensors {
        let elem_size = dtype_size(&tensor.dtype).ok_or_else(|| Error::SafetensorsMalformed {
            path: path.to_path_buf(),
            reason: format!("unknown dtype {} for tensor {}", tensor.dtype, tensor.name),
        })?;
        let expected_elems: u64 = tensor.shape.iter().product();
        let expected_len = expected_elems * elem_size;
        if expected_len != tensor.declared_byte_len() {
            return Err(Error::SafetensorsMalformed {
                path: path.to_path_buf(),
                reason: format!(
                    "tensor {} declares {} bytes but shape {:?} x {} implies {}",
                    tensor.name,
                    tensor.declared_byte_len(),
                    tensor.shape,
                    tensor.dtype,
                    expected_len
                ),
            });
        }
    }
    Ok(())
}

/// Truncates or validates `path` against its safetensors header: extra
/// trailing bytes are trimmed away; a file shorter than the declared region
/// is a hard error (the content is genuinely missing, not merely padded).
pub fn reconcile_length(path: &Path) -> Result<()> {
    let header = parse_header(path)?;
    let declared = header.declared_total_len();

    let file = File::options().read(true).write(true).open(path).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;
    let actual = file.metadata().map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?.len();

    if actual < declared {
        return Err(Error::SafetensorsIncomplete { path: path.to_path_buf(), declared, actual });
    }
    if actual > declared {
        file.set_len(declared).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;
        file.sync_all().map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;
    }
    Ok(())
}
