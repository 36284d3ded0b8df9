//! Animation and skin binding.

use levikno_render::buffer::{BufferTypeFlags, UniformBufferCreateInfo};
use levikno_render::Context;
use nalgebra_glm as glm;

use crate::gltf::accessor::read_floats;
use crate::gltf::document::Document;
use crate::model::{Animation, AnimationChannel, AnimationPath, Interpolation, Skin};
use crate::ModelError;

fn interpolation_from_str(interpolation: &str) -> Result<Interpolation, ModelError> {
    match interpolation {
        "STEP" => Ok(Interpolation::Step),
        "LINEAR" => Ok(Interpolation::Linear),
        // cubic spline samplers store in-tangent/value/out-tangent triples
        // per keyframe; decoding them as plain values would desynchronize
        // keyframes and outputs
        "CUBICSPLINE" => Err(ModelError::InvalidDocument(
            "CUBICSPLINE animation interpolation is not supported",
        )),
        other => {
            log::error!(target: "levikno", "unknown interpolation type: {}", other);
            Ok(Interpolation::Step)
        }
    }
}

fn path_from_str(path: &str) -> Option<AnimationPath> {
    match path {
        "translation" => Some(AnimationPath::Translation),
        "rotation" => Some(AnimationPath::Rotation),
        "scale" => Some(AnimationPath::Scale),
        // weights (morph targets) are not supported
        _ => None,
    }
}

/// Builds per-channel keyframe and output arrays; start/end are the
/// min/max over every channel's keyframes.
pub(crate) fn bind_animations(
    document: &Document,
    buffers: &[Vec<u8>],
) -> Result<Vec<Animation>, ModelError> {
    let mut animations = Vec::with_capacity(document.animations.len());

    for doc_animation in &document.animations {
        let mut animation = Animation {
            channels: Vec::with_capacity(doc_animation.channels.len()),
            start: f32::MAX,
            end: f32::MIN,
            current_time: 0.0,
        };

        for doc_channel in &doc_animation.channels {
            let Some(path) = path_from_str(&doc_channel.target.path) else {
                continue;
            };
            let Some(node) = doc_channel.target.node else {
                continue;
            };
            let sampler = doc_animation
                .samplers
                .get(doc_channel.sampler)
                .ok_or(ModelError::InvalidDocument("animation sampler out of range"))?;
            let interpolation = interpolation_from_str(&sampler.interpolation)?;

            let key_frames = read_floats(document, buffers, sampler.input)?;
            for &time in &key_frames {
                animation.start = animation.start.min(time);
                animation.end = animation.end.max(time);
            }

            let output_accessor = document
                .accessors
                .get(sampler.output)
                .ok_or(ModelError::InvalidDocument("animation output out of range"))?;
            let raw = read_floats(document, buffers, sampler.output)?;
            let outputs: Vec<[f32; 4]> = match output_accessor.accessor_type.as_str() {
                "VEC3" => raw
                    .chunks_exact(3)
                    .map(|c| [c[0], c[1], c[2], 0.0])
                    .collect(),
                _ => raw
                    .chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect(),
            };

            animation.channels.push(AnimationChannel {
                node,
                path,
                interpolation,
                key_frames,
                outputs,
            });
        }

        if animation.channels.iter().all(|c| c.key_frames.is_empty()) {
            animation.start = 0.0;
            animation.end = 0.0;
        }
        animations.push(animation);
    }

    Ok(animations)
}

/// Allocates each skin's joint-matrix storage buffer, seeded with the
/// inverse-bind matrices.
pub(crate) fn bind_skins(
    ctx: &mut Context,
    document: &Document,
    buffers: &[Vec<u8>],
) -> Result<Vec<Skin>, ModelError> {
    let mut skins = Vec::with_capacity(document.skins.len());

    for doc_skin in &document.skins {
        let inverse_bind_matrices: Vec<glm::Mat4> = match doc_skin.inverse_bind_matrices {
            Some(accessor) => {
                let floats = read_floats(document, buffers, accessor)?;
                floats
                    .chunks_exact(16)
                    .map(glm::make_mat4)
                    .collect()
            }
            None => vec![glm::Mat4::identity(); doc_skin.joints.len()],
        };

        let size = (doc_skin.joints.len() * 16 * std::mem::size_of::<f32>()) as u64;
        let mut initial = Vec::with_capacity(size as usize);
        for matrix in &inverse_bind_matrices {
            for value in matrix.as_slice() {
                initial.extend_from_slice(&value.to_le_bytes());
            }
        }
        initial.resize(size as usize, 0);

        let joint_matrix_buffer = ctx.create_uniform_buffer(&UniformBufferCreateInfo {
            buffer_type: BufferTypeFlags::STORAGE,
            binding: 0,
            size: size.max(16),
            initial_data: Some(&initial),
        })?;

        skins.push(Skin {
            joints: doc_skin.joints.clone(),
            inverse_bind_matrices,
            joint_matrix_buffer,
        });
    }

    Ok(skins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_modes() {
        assert_eq!(interpolation_from_str("STEP").unwrap(), Interpolation::Step);
        assert_eq!(
            interpolation_from_str("LINEAR").unwrap(),
            Interpolation::Linear
        );
        // unknown strings are logged and fall back to step
        assert_eq!(
            interpolation_from_str("BEZIER").unwrap(),
            Interpolation::Step
        );
    }

    #[test]
    fn cubic_spline_is_rejected() {
        // its outputs carry tangent triples this loader does not decode
        assert!(interpolation_from_str("CUBICSPLINE").is_err());
    }

    #[test]
    fn unsupported_paths_are_skipped() {
        assert_eq!(path_from_str("weights"), None);
        assert_eq!(path_from_str("rotation"), Some(AnimationPath::Rotation));
    }
}
