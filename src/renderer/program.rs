//! Shader programs
//!
//! WGSL is parsed and validated on the CPU with naga before any GPU object
//! is created, so a broken shader fails with the full diagnostic text and
//! leaves nothing behind. Vertex input locations and uniform bindings are
//! resolved by name up front.

use std::collections::HashMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{Binding, Module, ShaderStage, TypeInner};

use crate::error::GpuError;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Named locations resolved from a validated module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    /// Vertex input name -> `@location`
    pub attributes: HashMap<String, u32>,
    /// Resource name -> `(@group, @binding)`
    pub uniforms: HashMap<String, (u32, u32)>,
}

impl ProgramInfo {
    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    pub fn uniform(&self, name: &str) -> Option<(u32, u32)> {
        self.uniforms.get(name).copied()
    }
}

/// Parse ("compile") and validate ("link") a WGSL program, then resolve
/// the requested names. Every requested name must exist.
pub fn compile(
    label: &str,
    source: &str,
    attribute_names: &[&str],
    uniform_names: &[&str],
) -> Result<ProgramInfo, GpuError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| GpuError::ShaderCompile {
        label: label.to_string(),
        log: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| GpuError::ShaderLink {
            label: label.to_string(),
            log: e.emit_to_string(source),
        })?;

    let link_error = |log: String| GpuError::ShaderLink {
        label: label.to_string(),
        log,
    };

    for (entry, stage) in [
        (VERTEX_ENTRY, ShaderStage::Vertex),
        (FRAGMENT_ENTRY, ShaderStage::Fragment),
    ] {
        if !module
            .entry_points
            .iter()
            .any(|ep| ep.name == entry && ep.stage == stage)
        {
            return Err(link_error(format!("missing entry point '{entry}'")));
        }
    }

    let all_attributes = vertex_inputs(&module);
    let all_uniforms = resource_bindings(&module);

    let mut info = ProgramInfo::default();
    for &name in attribute_names {
        let location = all_attributes
            .get(name)
            .ok_or_else(|| link_error(format!("no vertex input named '{name}'")))?;
        info.attributes.insert(name.to_string(), *location);
    }
    for &name in uniform_names {
        let binding = all_uniforms
            .get(name)
            .ok_or_else(|| link_error(format!("no resource named '{name}'")))?;
        info.uniforms.insert(name.to_string(), *binding);
    }

    log::debug!(
        "program '{label}' linked: {} attribute(s), {} uniform(s)",
        info.attributes.len(),
        info.uniforms.len()
    );
    Ok(info)
}

/// `@location` inputs of the vertex entry point, including struct members
fn vertex_inputs(module: &Module) -> HashMap<String, u32> {
    let mut out = HashMap::new();
    let Some(entry) = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Vertex && ep.name == VERTEX_ENTRY)
    else {
        return out;
    };

    for arg in &entry.function.arguments {
        match (&arg.binding, &arg.name) {
            (Some(Binding::Location { location, .. }), Some(name)) => {
                out.insert(name.clone(), *location);
            }
            (None, _) => {
                if let TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for member in members {
                        if let (Some(Binding::Location { location, .. }), Some(name)) =
                            (&member.binding, &member.name)
                        {
                            out.insert(name.clone(), *location);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Bound globals (uniforms, textures, samplers) by name
fn resource_bindings(module: &Module) -> HashMap<String, (u32, u32)> {
    module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            Some((var.name.clone()?, (binding.group, binding.binding)))
        })
        .collect()
}

/// A compiled program on the GPU: reflected names plus the pipeline built
/// from its shader module
pub struct Program {
    pub info: ProgramInfo,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::RenderPipeline,
}

/// Fixed-function state a program is built against
pub struct PipelineSpec<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub attribute_names: &'a [&'a str],
    pub uniform_names: &'a [&'a str],
    pub layout_entries: &'a [wgpu::BindGroupLayoutEntry],
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

impl Program {
    /// Validate the source, then create the module and pipeline.
    /// Nothing is created on the GPU if validation fails.
    pub fn new(device: &wgpu::Device, spec: &PipelineSpec<'_>) -> Result<Self, GpuError> {
        let info = compile(spec.label, spec.source, spec.attribute_names, spec.uniform_names)?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(spec.label),
            source: wgpu::ShaderSource::Wgsl(spec.source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(spec.label),
            entries: spec.layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(spec.label),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(spec.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: spec.vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: spec.format,
                    blend: spec.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            info,
            bind_group_layout,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: &str = include_str!("tile.wgsl");
    const SPRITE: &str = include_str!("sprite.wgsl");

    #[test]
    fn test_tile_shader_links() {
        let info = compile("tile", TILE, &["position"], &["uniforms", "atlas", "world_state"]).unwrap();
        assert_eq!(info.attribute("position"), Some(0));
        assert_eq!(info.uniform("uniforms"), Some((0, 0)));
        assert_eq!(info.uniform("atlas"), Some((0, 1)));
        assert_eq!(info.uniform("world_state"), Some((0, 2)));
    }

    #[test]
    fn test_sprite_shader_links() {
        let info = compile(
            "sprite",
            SPRITE,
            &["position", "tex_coord"],
            &["uniforms", "atlas", "atlas_sampler"],
        )
        .unwrap();
        assert_eq!(info.attribute("position"), Some(0));
        assert_eq!(info.attribute("tex_coord"), Some(1));
        assert_eq!(info.uniform("atlas_sampler"), Some((0, 2)));
    }

    #[test]
    fn test_syntax_error_reports_compile_log() {
        let err = compile("broken", "fn vs_main( {", &[], &[]).unwrap_err();
        match err {
            GpuError::ShaderCompile { label, log } => {
                assert_eq!(label, "broken");
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_type_error_reports_link_log() {
        let source = r#"
            @vertex fn vs_main() -> @builtin(position) vec4<f32> {
                let x: f32 = 1.0;
                return vec4<f32>(x, x, x, true);
            }
            @fragment fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0);
            }
        "#;
        assert!(matches!(
            compile("typed", source, &[], &[]),
            Err(GpuError::ShaderCompile { .. } | GpuError::ShaderLink { .. })
        ));
    }

    #[test]
    fn test_missing_name_is_link_error() {
        let err = compile("tile", TILE, &["no_such_input"], &[]).unwrap_err();
        assert!(matches!(err, GpuError::ShaderLink { .. }));
        let err = compile("tile", TILE, &[], &["no_such_uniform"]).unwrap_err();
        assert!(err.to_string().contains("no_such_uniform"));
    }

    #[test]
    fn test_missing_entry_point_is_link_error() {
        let source = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        assert!(matches!(
            compile("frag_only", source, &[], &[]),
            Err(GpuError::ShaderLink { .. })
        ));
    }
}
