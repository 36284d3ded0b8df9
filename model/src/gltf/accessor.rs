//! Accessor reads.
//!
//! Values are pulled element-wise through the buffer view (honoring its
//! stride) and converted to `f32`/`u32`. Integer inputs with the
//! accessor's `normalized` flag set map to [0, 1] or [-1, 1].

use crate::gltf::document::Document;
use crate::ModelError;

pub(crate) const COMPONENT_BYTE: u32 = 5120;
pub(crate) const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
pub(crate) const COMPONENT_SHORT: u32 = 5122;
pub(crate) const COMPONENT_UNSIGNED_SHORT: u32 = 5123;
pub(crate) const COMPONENT_UNSIGNED_INT: u32 = 5125;
pub(crate) const COMPONENT_FLOAT: u32 = 5126;

pub(crate) fn component_size(component_type: u32) -> usize {
    match component_type {
        COMPONENT_BYTE | COMPONENT_UNSIGNED_BYTE => 1,
        COMPONENT_SHORT | COMPONENT_UNSIGNED_SHORT => 2,
        _ => 4,
    }
}

pub(crate) fn type_components(accessor_type: &str) -> usize {
    match accessor_type {
        "SCALAR" => 1,
        "VEC2" => 2,
        "VEC3" => 3,
        "VEC4" => 4,
        "MAT2" => 4,
        "MAT3" => 9,
        "MAT4" => 16,
        _ => 1,
    }
}

struct AccessorView<'a> {
    data: &'a [u8],
    stride: usize,
    count: usize,
}

fn accessor_view<'a>(
    document: &Document,
    buffers: &'a [Vec<u8>],
    accessor_index: usize,
) -> Result<AccessorView<'a>, ModelError> {
    let accessor = document
        .accessors
        .get(accessor_index)
        .ok_or(ModelError::InvalidDocument("accessor index out of range"))?;
    let view_index = accessor
        .buffer_view
        .ok_or(ModelError::InvalidDocument("accessor without buffer view"))?;
    let view = document
        .buffer_views
        .get(view_index)
        .ok_or(ModelError::InvalidDocument("buffer view index out of range"))?;
    let buffer = buffers
        .get(view.buffer)
        .ok_or(ModelError::InvalidDocument("buffer index out of range"))?;

    let components = type_components(&accessor.accessor_type);
    let element_size = components * component_size(accessor.component_type);
    let stride = view.byte_stride.unwrap_or(element_size);

    // the view offset and the accessor offset are each applied exactly
    // once
    let begin = view.byte_offset + accessor.byte_offset;
    let last = begin
        + accessor
            .count
            .checked_sub(1)
            .map(|n| n * stride)
            .unwrap_or(0)
        + element_size;
    if accessor.count > 0 && last > buffer.len() {
        return Err(ModelError::InvalidDocument(
            "accessor reads past the end of its buffer",
        ));
    }

    Ok(AccessorView {
        data: &buffer[begin..],
        stride,
        count: accessor.count,
    })
}

fn convert_component(bytes: &[u8], component_type: u32, normalized: bool) -> f32 {
    match component_type {
        COMPONENT_BYTE => {
            let v = bytes[0] as i8;
            if normalized {
                (v as f32 / 127.0).max(-1.0)
            } else {
                v as f32
            }
        }
        COMPONENT_UNSIGNED_BYTE => {
            let v = bytes[0];
            if normalized {
                v as f32 / 255.0
            } else {
                v as f32
            }
        }
        COMPONENT_SHORT => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]);
            if normalized {
                (v as f32 / 32767.0).max(-1.0)
            } else {
                v as f32
            }
        }
        COMPONENT_UNSIGNED_SHORT => {
            let v = u16::from_le_bytes([bytes[0], bytes[1]]);
            if normalized {
                v as f32 / 65535.0
            } else {
                v as f32
            }
        }
        COMPONENT_UNSIGNED_INT => u32::from_le_bytes(bytes[..4].try_into().unwrap()) as f32,
        _ => f32::from_le_bytes(bytes[..4].try_into().unwrap()),
    }
}

/// Reads the accessor as tightly packed f32 components
/// (`count x components` values).
pub(crate) fn read_floats(
    document: &Document,
    buffers: &[Vec<u8>],
    accessor_index: usize,
) -> Result<Vec<f32>, ModelError> {
    let accessor = &document.accessors[accessor_index];
    let components = type_components(&accessor.accessor_type);
    let component_type = accessor.component_type;
    let normalized = accessor.normalized;
    let comp_size = component_size(component_type);

    let view = accessor_view(document, buffers, accessor_index)?;
    let mut out = Vec::with_capacity(view.count * components);
    for element in 0..view.count {
        let base = element * view.stride;
        for component in 0..components {
            let offset = base + component * comp_size;
            out.push(convert_component(
                &view.data[offset..offset + comp_size],
                component_type,
                normalized,
            ));
        }
    }
    Ok(out)
}

/// Reads scalar indices widened to u32.
pub(crate) fn read_indices(
    document: &Document,
    buffers: &[Vec<u8>],
    accessor_index: usize,
) -> Result<Vec<u32>, ModelError> {
    let accessor = &document.accessors[accessor_index];
    let component_type = accessor.component_type;
    let comp_size = component_size(component_type);

    let view = accessor_view(document, buffers, accessor_index)?;
    let mut out = Vec::with_capacity(view.count);
    for element in 0..view.count {
        let base = element * view.stride;
        let bytes = &view.data[base..base + comp_size];
        let value = match component_type {
            COMPONENT_UNSIGNED_BYTE => bytes[0] as u32,
            COMPONENT_UNSIGNED_SHORT => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            _ => u32::from_le_bytes(bytes[..4].try_into().unwrap()),
        };
        out.push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::document::{Accessor, Buffer, BufferView};

    fn document_with(accessor: Accessor, view: BufferView) -> Document {
        Document {
            accessors: vec![accessor],
            buffer_views: vec![view],
            buffers: vec![Buffer {
                uri: None,
                byte_length: 0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn float_vec3_reads_back_exactly() {
        let values: [f32; 6] = [1.0, 2.0, 3.0, -4.0, 0.5, 10.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let document = document_with(
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                component_type: COMPONENT_FLOAT,
                count: 2,
                accessor_type: String::from("VEC3"),
                normalized: false,
            },
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: bytes.len(),
                byte_stride: None,
            },
        );
        assert_eq!(
            read_floats(&document, &[bytes], 0).unwrap(),
            values.to_vec()
        );
    }

    #[test]
    fn normalized_unsigned_bytes_map_to_unit_range() {
        let bytes = vec![0u8, 127, 255, 51];
        let document = document_with(
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                component_type: COMPONENT_UNSIGNED_BYTE,
                count: 1,
                accessor_type: String::from("VEC4"),
                normalized: true,
            },
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 4,
                byte_stride: None,
            },
        );
        let floats = read_floats(&document, &[bytes], 0).unwrap();
        assert_eq!(floats[0], 0.0);
        assert!((floats[1] - 127.0 / 255.0).abs() < 1e-6);
        assert_eq!(floats[2], 1.0);
    }

    #[test]
    fn interleaved_views_honor_the_stride() {
        // two vec2 elements interleaved with 8 junk bytes between them
        let mut bytes = Vec::new();
        bytes.extend(1.0f32.to_le_bytes());
        bytes.extend(2.0f32.to_le_bytes());
        bytes.extend([0xAA; 8]);
        bytes.extend(3.0f32.to_le_bytes());
        bytes.extend(4.0f32.to_le_bytes());
        bytes.extend([0xBB; 8]);

        let document = document_with(
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                component_type: COMPONENT_FLOAT,
                count: 2,
                accessor_type: String::from("VEC2"),
                normalized: false,
            },
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: bytes.len(),
                byte_stride: Some(16),
            },
        );
        assert_eq!(
            read_floats(&document, &[bytes], 0).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn short_indices_widen_to_u32() {
        let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
        let bytes: Vec<u8> = indices.iter().flat_map(|v| v.to_le_bytes()).collect();
        let document = document_with(
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                component_type: COMPONENT_UNSIGNED_SHORT,
                count: 6,
                accessor_type: String::from("SCALAR"),
                normalized: false,
            },
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: bytes.len(),
                byte_stride: None,
            },
        );
        assert_eq!(
            read_indices(&document, &[bytes], 0).unwrap(),
            vec![0, 1, 2, 2, 3, 0]
        );
    }

    #[test]
    fn out_of_range_reads_are_rejected() {
        let document = document_with(
            Accessor {
                buffer_view: Some(0),
                byte_offset: 0,
                component_type: COMPONENT_FLOAT,
                count: 100,
                accessor_type: String::from("VEC3"),
                normalized: false,
            },
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 8,
                byte_stride: None,
            },
        );
        assert!(read_floats(&document, &[vec![0u8; 8]], 0).is_err());
    }
}
