//! Loader behavior against in-memory `.gltf`/`.glb` fixtures and the
//! headless null backend.

use std::sync::{Mutex, MutexGuard, OnceLock};

use base64::Engine;
use levikno_render::backend::RenderInitInfo;
use levikno_render::null::{NullBackend, NullBuffer, NullTexture};
use levikno_render::{Context, ContextCreateInfo, MemoryPoolInfo};
use levikno_model::{load_gltf_from_slice, load_glb_from_slice, Model};
use serde_json::json;

fn context_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn create_context() -> Context {
    let info = ContextCreateInfo {
        application_name: String::from("model tests"),
        memory_info: MemoryPoolInfo::default(),
        ..Default::default()
    };
    let mut ctx = Context::create(info, Box::new(NullBackend::new())).unwrap();
    let device = ctx.physical_devices().remove(0);
    ctx.render_init(&RenderInitInfo {
        physical_device: device,
        max_frames_in_flight: 2,
        gamma_correction: false,
    })
    .unwrap();
    ctx
}

/// Unit cube: 24 vertices (4 per face, per-face normals), 36 indices.
struct CubeData {
    buffer: Vec<u8>,
    position_count: usize,
    index_count: usize,
    normals_offset: usize,
    uvs_offset: usize,
    indices_offset: usize,
}

fn cube_buffer() -> CubeData {
    let face_normals: [[f32; 3]; 6] = [
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
    ];
    // four corners per face in the face's tangent plane
    let face_corners: [[[f32; 3]; 4]; 6] = [
        [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]],
        [[0.5, -0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5]],
        [[0.5, -0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5]],
        [[-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5]],
        [[-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5]],
        [[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5]],
    ];
    let corner_uvs: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut positions: Vec<f32> = Vec::new();
    let mut normals: Vec<f32> = Vec::new();
    let mut uvs: Vec<f32> = Vec::new();
    let mut indices: Vec<u16> = Vec::new();
    for (face, corners) in face_corners.iter().enumerate() {
        let base = (face * 4) as u16;
        for (corner, position) in corners.iter().enumerate() {
            positions.extend_from_slice(position);
            normals.extend_from_slice(&face_normals[face]);
            uvs.extend_from_slice(&corner_uvs[corner]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    let mut buffer: Vec<u8> = Vec::new();
    for v in &positions {
        buffer.extend_from_slice(&v.to_le_bytes());
    }
    let normals_offset = buffer.len();
    for v in &normals {
        buffer.extend_from_slice(&v.to_le_bytes());
    }
    let uvs_offset = buffer.len();
    for v in &uvs {
        buffer.extend_from_slice(&v.to_le_bytes());
    }
    let indices_offset = buffer.len();
    for i in &indices {
        buffer.extend_from_slice(&i.to_le_bytes());
    }

    CubeData {
        position_count: positions.len() / 3,
        index_count: indices.len(),
        buffer,
        normals_offset,
        uvs_offset,
        indices_offset,
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 60, 20, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut bytes, image::ImageOutputFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// The same cube document with the buffer either as an embedded data URI
/// (`.gltf` form) or as `None` (GLB BIN chunk form).
fn cube_document(cube: &CubeData, embed_buffer: bool, png: &[u8]) -> serde_json::Value {
    let buffer = if embed_buffer {
        json!({
            "byteLength": cube.buffer.len(),
            "uri": format!(
                "data:application/octet-stream;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(&cube.buffer)
            ),
        })
    } else {
        json!({ "byteLength": cube.buffer.len() })
    };

    json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0.0, 1.0, 0.0] }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 },
                "indices": 3,
                "material": 0,
            }],
        }],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": cube.position_count, "type": "VEC3" },
            { "bufferView": 1, "componentType": 5126, "count": cube.position_count, "type": "VEC3" },
            { "bufferView": 2, "componentType": 5126, "count": cube.position_count, "type": "VEC2" },
            { "bufferView": 3, "componentType": 5123, "count": cube.index_count, "type": "SCALAR" },
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": cube.normals_offset },
            { "buffer": 0, "byteOffset": cube.normals_offset, "byteLength": cube.uvs_offset - cube.normals_offset },
            { "buffer": 0, "byteOffset": cube.uvs_offset, "byteLength": cube.indices_offset - cube.uvs_offset },
            { "buffer": 0, "byteOffset": cube.indices_offset, "byteLength": cube.buffer.len() - cube.indices_offset },
        ],
        "buffers": [buffer],
        "materials": [{
            "pbrMetallicRoughness": {
                "baseColorFactor": [0.8, 0.7, 0.6, 1.0],
                "baseColorTexture": { "index": 0 },
                "metallicFactor": 0.25,
                "roughnessFactor": 0.5,
            },
            "emissiveFactor": [0.1, 0.2, 0.3],
            "doubleSided": true,
        }],
        "textures": [{ "source": 0 }],
        "images": [{
            "uri": format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(png)
            ),
        }],
        "animations": [{
            "samplers": [
                { "input": 4, "output": 5, "interpolation": "LINEAR" },
            ],
            "channels": [
                { "sampler": 0, "target": { "node": 0, "path": "translation" } },
            ],
        }],
    })
}

fn with_animation_data(mut document: serde_json::Value) -> serde_json::Value {
    // keyframe times 0.25..2.5 and vec3 outputs appended as a second buffer
    let times: [f32; 4] = [0.25, 1.0, 1.75, 2.5];
    let outputs: [f32; 12] = [
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
    ];
    let mut animation_buffer: Vec<u8> = Vec::new();
    for v in times.iter().chain(outputs.iter()) {
        animation_buffer.extend_from_slice(&v.to_le_bytes());
    }

    let buffers = document["buffers"].as_array_mut().unwrap();
    buffers.push(json!({
        "byteLength": animation_buffer.len(),
        "uri": format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&animation_buffer)
        ),
    }));

    let views = document["bufferViews"].as_array_mut().unwrap();
    views.push(json!({ "buffer": 1, "byteOffset": 0, "byteLength": 16 }));
    views.push(json!({ "buffer": 1, "byteOffset": 16, "byteLength": 48 }));

    let accessors = document["accessors"].as_array_mut().unwrap();
    accessors.push(json!({ "bufferView": 4, "componentType": 5126, "count": 4, "type": "SCALAR" }));
    accessors.push(json!({ "bufferView": 5, "componentType": 5126, "count": 4, "type": "VEC3" }));

    document
}

fn vertex_bytes(ctx: &Context, model: &Model) -> (Vec<u8>, Vec<u32>) {
    let primitive = &model.meshes[0].primitives[0];
    let buffer = ctx.buffer(primitive.buffer).unwrap();
    let payload = buffer.backend().downcast_ref::<NullBuffer>().unwrap();
    (payload.vertex.clone(), payload.index.clone())
}

#[test]
fn gltf_and_glb_forms_load_identically() {
    // matched assets must produce byte-identical vertex/index buffers and
    // identical material factors
    let _guard = context_lock();
    let cube = cube_buffer();
    let png = png_bytes(2, 2);

    let mut ctx = create_context();
    let gltf_json = cube_document(&cube, true, &png);
    let gltf_json = with_animation_data(gltf_json);
    let gltf_model =
        load_gltf_from_slice(&mut ctx, gltf_json.to_string().as_bytes(), None).unwrap();
    let (gltf_vertices, gltf_indices) = vertex_bytes(&ctx, &gltf_model);
    let gltf_material = gltf_model.meshes[0].primitives[0].material.clone();
    gltf_model.destroy(&mut ctx).unwrap();
    drop(ctx);

    let mut ctx = create_context();
    let glb_json = cube_document(&cube, false, &png);
    let glb_json = with_animation_data(glb_json);
    // the animation buffer stays a data URI; buffer 0 becomes the BIN chunk
    let container =
        levikno_model::glb::write(glb_json.to_string().as_bytes(), Some(&cube.buffer));
    let glb_model = load_glb_from_slice(&mut ctx, &container, None).unwrap();
    let (glb_vertices, glb_indices) = vertex_bytes(&ctx, &glb_model);
    let glb_material = glb_model.meshes[0].primitives[0].material.clone();

    assert_eq!(gltf_vertices, glb_vertices);
    assert_eq!(gltf_indices, glb_indices);
    assert_eq!(gltf_material.base_color_factor, glb_material.base_color_factor);
    assert_eq!(gltf_material.metallic_factor, glb_material.metallic_factor);
    assert_eq!(gltf_material.roughness_factor, glb_material.roughness_factor);
    assert_eq!(gltf_material.emissive_factor, glb_material.emissive_factor);

    glb_model.destroy(&mut ctx).unwrap();
}

#[test]
fn cube_loads_with_expected_shape() {
    let _guard = context_lock();
    let cube = cube_buffer();
    let png = png_bytes(4, 2);

    let mut ctx = create_context();
    let document = with_animation_data(cube_document(&cube, true, &png));
    let model = load_gltf_from_slice(&mut ctx, document.to_string().as_bytes(), None).unwrap();

    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.meshes[0].primitives.len(), 1);
    let primitive = &model.meshes[0].primitives[0];
    assert_eq!(primitive.vertex_count, 24);
    assert_eq!(primitive.index_count, 36);

    // albedo texture keeps the source PNG's dimensions
    let albedo = ctx.texture(primitive.material.albedo).unwrap();
    assert_eq!((albedo.width(), albedo.height()), (4, 2));
    let payload = albedo.backend().downcast_ref::<NullTexture>().unwrap();
    match payload {
        NullTexture::Image { width, height, pixels } => {
            assert_eq!((*width, *height), (4, 2));
            assert_eq!(pixels.len(), 4 * 2 * 4);
            assert_eq!(&pixels[..4], &[200, 60, 20, 255]);
        }
        other => panic!("unexpected texture payload: {:?}", other),
    }

    // material factors
    assert_eq!(primitive.material.metallic_factor, 0.25);
    assert_eq!(primitive.material.roughness_factor, 0.5);
    assert!(primitive.material.double_sided);

    // node transform reached the arena
    assert_eq!(model.root_nodes, vec![0]);
    assert_eq!(model.nodes[0].mesh, Some(0));
    assert_eq!(model.nodes[0].transform.translation.y, 1.0);

    // interleaved vertices carry synthesized tangents (triangle topology
    // with positions, normals and uvs present)
    let (vertices, _) = vertex_bytes(&ctx, &model);
    assert_eq!(
        vertices.len(),
        24 * std::mem::size_of::<levikno_model::MeshVertex>()
    );
    let typed: &[levikno_model::MeshVertex] = bytemuck::cast_slice(&vertices);
    assert!(typed.iter().any(|v| v.tangent != [0.0; 3]));
    assert!(typed.iter().all(|v| v.normal != [0.0; 3]));

    model.destroy(&mut ctx).unwrap();

    // every GPU object the loader created is destroyable exactly once
    for stype in levikno_render::StructureType::ALL {
        assert_eq!(ctx.object_count(stype), 0, "leak of {}", stype.name());
    }
}

#[test]
fn animation_times_span_channel_keyframes() {
    // start/end equal the min/max over all channel keyframes
    let _guard = context_lock();
    let cube = cube_buffer();
    let png = png_bytes(1, 1);

    let mut ctx = create_context();
    let document = with_animation_data(cube_document(&cube, true, &png));
    let model = load_gltf_from_slice(&mut ctx, document.to_string().as_bytes(), None).unwrap();

    assert_eq!(model.animations.len(), 1);
    let animation = &model.animations[0];
    assert_eq!(animation.start, 0.25);
    assert_eq!(animation.end, 2.5);
    assert_eq!(animation.channels.len(), 1);
    assert_eq!(animation.channels[0].key_frames, vec![0.25, 1.0, 1.75, 2.5]);
    assert_eq!(animation.channels[0].outputs[1], [1.0, 0.0, 0.0, 0.0]);
    assert_eq!(
        animation.channels[0].path,
        levikno_model::AnimationPath::Translation
    );

    model.destroy(&mut ctx).unwrap();
}

#[test]
fn missing_position_is_rejected() {
    let _guard = context_lock();
    let mut ctx = create_context();
    let document = json!({
        "asset": { "version": "2.0" },
        "scenes": [{ "nodes": [] }],
        "meshes": [{ "primitives": [{ "attributes": {} }] }],
    });
    let result = load_gltf_from_slice(&mut ctx, document.to_string().as_bytes(), None);
    assert!(result.is_err());
}

#[test]
fn glb_length_validation() {
    let _guard = context_lock();
    let mut ctx = create_context();
    // truncated header
    assert!(load_glb_from_slice(&mut ctx, &[0u8; 8], None).is_err());
}
