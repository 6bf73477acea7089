use std::collections::HashMap;

use crate::{
    BackendError, BlendMode, CompareFunction, CullMode, GBuffer, PipelineState, StencilFaceState,
    StencilOperation, Target, Technique, Vertex, MAX_UNIFORMS_SIZE,
};

macro_rules! shader_source {
    ($($file:literal),+) => {
        concat!(include_str!("shaders/common.wgsl"), $("\n", include_str!($file)),+)
    };
}

/// Shader modules, bind group layouts and every pipeline variant requested so far.
pub struct Pipelines {
    pub uniforms_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,
    pub gbuffer_layout: wgpu::BindGroupLayout,

    modules: HashMap<Technique, wgpu::ShaderModule>,
    layouts: HashMap<Technique, wgpu::PipelineLayout>,
    cache: HashMap<(Technique, PipelineState), wgpu::RenderPipeline>,
    surface_format: wgpu::TextureFormat,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, BackendError> {
        let uniforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniforms bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(MAX_UNIFORMS_SIZE as _),
                },
                count: None,
            }],
        });

        let texture_entry = |binding, filterable| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable },
            },
            count: None,
        };

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material bind group layout"),
            entries: &[
                // diffuse
                texture_entry(0, true),
                // bump
                texture_entry(1, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // read with textureLoad, the R32 depth is not filterable
        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GBuffer bind group layout"),
            entries: &[
                texture_entry(0, false),
                texture_entry(1, false),
                texture_entry(2, false),
            ],
        });

        let mut modules = HashMap::new();
        let mut layouts = HashMap::new();

        for technique in Technique::ALL {
            let source = match technique {
                Technique::GBufferFill => shader_source!("shaders/gbuffer_fill.wgsl"),
                Technique::SolidColour => shader_source!("shaders/solid_colour.wgsl"),
                Technique::LightGlyph => shader_source!("shaders/light_glyph.wgsl"),
                Technique::PointLight => {
                    shader_source!("shaders/gbuffer.wgsl", "shaders/point_light.wgsl")
                }
                Technique::DirectionalLight => {
                    shader_source!("shaders/gbuffer.wgsl", "shaders/directional_light.wgsl")
                }
                Technique::AmbientLight => {
                    shader_source!("shaders/gbuffer.wgsl", "shaders/ambient_light.wgsl")
                }
                Technique::TextureBlit | Technique::DepthBlit => {
                    shader_source!("shaders/gbuffer.wgsl", "shaders/blit.wgsl")
                }
            };

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(technique.name()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            if let Some(error) = pollster::block_on(device.pop_error_scope()) {
                return Err(BackendError::Effect {
                    technique: technique.name(),
                    reason: error.to_string(),
                });
            }
            modules.insert(technique, module);

            let bindings = technique.bindings();
            let mut bind_group_layouts = vec![&uniforms_layout];
            if bindings.material.is_some() {
                bind_group_layouts.push(&material_layout);
            }
            if bindings.gbuffer.is_some() {
                bind_group_layouts.push(&gbuffer_layout);
            }

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(technique.name()),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });
            layouts.insert(technique, layout);
        }

        log::debug!("Compiled {} techniques", modules.len());

        Ok(Self {
            uniforms_layout,
            material_layout,
            gbuffer_layout,

            modules,
            layouts,
            cache: HashMap::new(),
            surface_format,
        })
    }

    /// Builds the pipeline for `technique` under `state` unless it already exists.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        technique: Technique,
        state: &PipelineState,
    ) -> Result<(), BackendError> {
        if self.cache.contains_key(&(technique, *state)) {
            return Ok(());
        }

        let effect_error = |reason: String| BackendError::Effect {
            technique: technique.name(),
            reason,
        };

        let module = self
            .modules
            .get(&technique)
            .ok_or_else(|| effect_error("missing shader module".into()))?;
        let layout = self
            .layouts
            .get(&technique)
            .ok_or_else(|| effect_error("missing pipeline layout".into()))?;

        let write_mask = if state.color_writes {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        };

        let targets: Vec<Option<wgpu::ColorTargetState>> = match technique.target() {
            Target::GBuffer => GBuffer::RENDER_TARGETS
                .iter()
                .map(|target| {
                    target.clone().map(|target| wgpu::ColorTargetState {
                        write_mask,
                        ..target
                    })
                })
                .collect(),
            Target::Presentation => vec![Some(wgpu::ColorTargetState {
                format: self.surface_format,
                blend: blend_state(state.blend),
                write_mask,
            })],
        };

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as _,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Vertex::ATTRIBUTES,
        }];
        let buffers: &[wgpu::VertexBufferLayout] = match technique {
            Technique::GBufferFill
            | Technique::SolidColour
            | Technique::LightGlyph
            | Technique::PointLight => &vertex_buffers,
            _ => &[],
        };

        let fragment_entry = match technique {
            Technique::TextureBlit => "fs_texture",
            Technique::DepthBlit => "fs_depth",
            _ => "fs_main",
        };

        let stencil = state
            .stencil
            .map(|stencil| wgpu::StencilState {
                front: stencil_face(&stencil.front),
                back: stencil_face(&stencil.back),
                read_mask: stencil.read_mask as u32,
                write_mask: stencil.write_mask as u32,
            })
            .unwrap_or_default();

        let label = format!("{} pipeline", technique.name());

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(fragment_entry),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState {
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: cull_mode(state.cull),
                unclipped_depth: state.depth.clamp,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: GBuffer::DEPTH_STENCIL_FORMAT,
                depth_write_enabled: state.depth.compare.is_some() && state.depth.write,
                depth_compare: state
                    .depth
                    .compare
                    .map(compare_function)
                    .unwrap_or(wgpu::CompareFunction::Always),
                stencil,
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(effect_error(error.to_string()));
        }

        log::debug!("Created {label} for {state:?}");
        self.cache.insert((technique, *state), pipeline);

        Ok(())
    }

    pub fn get(&self, technique: Technique, state: &PipelineState) -> Option<&wgpu::RenderPipeline> {
        self.cache.get(&(technique, *state))
    }
}

fn cull_mode(cull: CullMode) -> Option<wgpu::Face> {
    match cull {
        CullMode::None => None,
        CullMode::Back => Some(wgpu::Face::Back),
        CullMode::Front => Some(wgpu::Face::Front),
    }
}

fn blend_state(blend: BlendMode) -> Option<wgpu::BlendState> {
    match blend {
        BlendMode::Replace => None,
        BlendMode::Additive => {
            let additive = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            };
            Some(wgpu::BlendState {
                color: additive,
                alpha: additive,
            })
        }
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
    }
}

fn compare_function(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn stencil_operation(op: StencilOperation) -> wgpu::StencilOperation {
    match op {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
        StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

fn stencil_face(face: &StencilFaceState) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: compare_function(face.compare),
        fail_op: stencil_operation(face.fail),
        depth_fail_op: stencil_operation(face.depth_fail),
        pass_op: stencil_operation(face.pass),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{GeometryPass, PointLightsPass};

    #[test]
    fn point_light_mark_counts_depth_failures_per_face() {
        let stencil = PointLightsPass::MARK_STATE.stencil.unwrap();
        let front = stencil_face(&stencil.front);
        let back = stencil_face(&stencil.back);

        assert_eq!(front.depth_fail_op, wgpu::StencilOperation::IncrementWrap);
        assert_eq!(back.depth_fail_op, wgpu::StencilOperation::DecrementWrap);
        assert_eq!(front.compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn blending_and_culling_map_directly() {
        assert_eq!(blend_state(BlendMode::Replace), None);
        assert_eq!(
            blend_state(BlendMode::Alpha),
            Some(wgpu::BlendState::ALPHA_BLENDING)
        );
        assert_eq!(cull_mode(GeometryPass::STATE.cull), Some(wgpu::Face::Back));
        assert_eq!(cull_mode(CullMode::None), None);
        assert_eq!(cull_mode(CullMode::Front), Some(wgpu::Face::Front));
    }
}
