//! GLB container parsing.
//!
//! Layout per the glTF 2.0 specification: a 12-byte header (`glTF` magic,
//! version 2, total length), then chunks of `{length, type, data}` padded
//! to 4 bytes. The first chunk must be JSON; BIN chunks follow and are
//! kept in memory, indexed by buffer.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ModelError;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

pub(crate) struct GlbParts {
    pub json: Vec<u8>,
    pub binary_chunks: Vec<Vec<u8>>,
}

pub(crate) fn parse(data: &[u8]) -> Result<GlbParts, ModelError> {
    let mut cursor = Cursor::new(data);
    let magic = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| ModelError::InvalidGlb("file shorter than the GLB header"))?;
    if magic != GLB_MAGIC {
        return Err(ModelError::InvalidGlb("missing glTF magic"));
    }
    let version = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| ModelError::InvalidGlb("file shorter than the GLB header"))?;
    if version != GLB_VERSION {
        return Err(ModelError::InvalidGlb("unsupported GLB container version"));
    }
    let total_length = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| ModelError::InvalidGlb("file shorter than the GLB header"))?
        as usize;
    if total_length > data.len() {
        return Err(ModelError::InvalidGlb(
            "header length exceeds the actual file size",
        ));
    }

    let mut json = None;
    let mut binary_chunks = Vec::new();
    let mut offset = 12usize;
    while offset + 8 <= total_length {
        let length = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
        let chunk_type = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap());
        let start = offset + 8;
        let end = start + length;
        if end > total_length {
            return Err(ModelError::InvalidGlb("chunk length exceeds the container"));
        }
        match chunk_type {
            CHUNK_JSON => {
                if json.is_some() {
                    return Err(ModelError::InvalidGlb("more than one JSON chunk"));
                }
                json = Some(data[start..end].to_vec());
            }
            CHUNK_BIN => binary_chunks.push(data[start..end].to_vec()),
            other => {
                log::debug!(target: "levikno", "skipping unknown GLB chunk type {:#x}", other);
            }
        }
        // chunks are 4-byte aligned
        offset = end + ((4 - end % 4) % 4);
    }

    let json = json.ok_or(ModelError::InvalidGlb("no JSON chunk"))?;
    if json.is_empty() {
        return Err(ModelError::InvalidGlb("empty JSON chunk"));
    }
    Ok(GlbParts {
        json,
        binary_chunks,
    })
}

/// Builds a GLB container from a JSON document and one BIN chunk; used by
/// the tests to produce matched `.gltf`/`.glb` inputs.
pub fn write(json: &[u8], binary: Option<&[u8]>) -> Vec<u8> {
    fn padded(len: usize) -> usize {
        len + ((4 - len % 4) % 4)
    }

    let json_padded = padded(json.len());
    let bin_padded = binary.map(|b| padded(b.len())).unwrap_or(0);
    let total = 12 + 8 + json_padded + binary.map(|_| 8 + bin_padded).unwrap_or(0);

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_padded as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(json);
    out.resize(out.len() + (json_padded - json.len()), b' ');

    if let Some(binary) = binary {
        out.extend_from_slice(&(bin_padded as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(binary);
        out.resize(out.len() + (bin_padded - binary.len()), 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        let bin = [1u8, 2, 3, 4, 5];
        let container = write(json, Some(&bin));
        let parts = parse(&container).unwrap();
        assert_eq!(parts.json.len() % 4, 0);
        assert!(parts.json.starts_with(json));
        assert_eq!(parts.binary_chunks.len(), 1);
        assert!(parts.binary_chunks[0].starts_with(&bin));
    }

    #[test]
    fn rejects_bad_magic() {
        let bad = [0u8; 16];
        assert!(matches!(parse(&bad), Err(ModelError::InvalidGlb(_))));
    }

    #[test]
    fn rejects_truncated_chunks() {
        let json = br#"{}"#;
        let mut container = write(json, None);
        // overstate the chunk length
        container[12] = 0xff;
        assert!(parse(&container).is_err());
    }
}
