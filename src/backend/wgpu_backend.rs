//! wgpu Backend
//!
//! Implements [`ProbeBackend`] over a `wgpu::Device` / `wgpu::Queue` pair.
//!
//! # Readback protocol
//!
//! A [`ReadbackBuffer`] is a `MAP_READ | COPY_DST` buffer plus interior
//! mapping state. Scheduled pixel reads become `copy_texture_to_buffer`
//! commands on a shared encoder; `submit_readback` submits the encoder and
//! starts `map_async`. Completion is observed by pumping
//! `device.poll(PollType::Poll)` and draining the mapping callback's
//! channel — never by blocking.
//!
//! # Copy pass
//!
//! A full-screen triangle samples the caller's depth view with a
//! non-filtering sampler and quantizes it into an `R32Uint` target
//! (`u32(depth * 4294967295.0)`), so a one-pixel read is exactly one `u32`.
//! The target texture is cached and only re-created when the requested
//! size changes.

use std::borrow::Cow;
use std::cell::RefCell;
use std::sync::mpsc;

use crate::backend::ProbeBackend;
use crate::errors::{ProbeError, Result};

const COPY_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) position : vec4<f32>,
    @location(0) uv : vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertexIndex : u32) -> VertexOutput {
    var pos = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 3.0, -1.0),
        vec2<f32>(-1.0,  3.0)
    );
    var output : VertexOutput;
    output.position = vec4<f32>(pos[vertexIndex], 0.0, 1.0);
    output.uv = pos[vertexIndex] * 0.5 + 0.5;
    output.uv.y = 1.0 - output.uv.y;
    return output;
}

@group(0) @binding(0) var t_depth : texture_depth_2d;
@group(0) @binding(1) var s_point : sampler;

@fragment
fn fs_main(in : VertexOutput) -> @location(0) u32 {
    let depth = textureSample(t_depth, s_point, in.uv);
    return u32(depth * 4294967295.0);
}
"#;

/// Compiled full-screen copy pipeline plus its bind group layout.
pub struct CopyPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

enum MapState {
    Idle,
    Mapping(mpsc::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>),
}

/// Pooled transfer resource: staging buffer + interior mapping state.
pub struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    state: RefCell<MapState>,
}

/// [`ProbeBackend`] implementation over wgpu.
///
/// Holds the device and queue (both internally reference-counted), the
/// cached copy target, and the command encoder shared between a copy pass
/// and the pixel reads scheduled from its continuation.
pub struct WgpuProbeBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    copy_target: RefCell<Option<wgpu::Texture>>,
    encoder: RefCell<Option<wgpu::CommandEncoder>>,
}

impl WgpuProbeBackend {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            copy_target: RefCell::new(None),
            encoder: RefCell::new(None),
        }
    }

    /// Re-create the cached copy target when the requested size changes.
    fn ensure_copy_target(&self, width: u32, height: u32) -> wgpu::Texture {
        let mut slot = self.copy_target.borrow_mut();

        if slot
            .as_ref()
            .is_some_and(|t| t.width() != width || t.height() != height)
        {
            *slot = None;
        }

        slot.get_or_insert_with(|| {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Probe Copy Target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R32Uint,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })
        .clone()
    }
}

impl ProbeBackend for WgpuProbeBackend {
    type Readback = ReadbackBuffer;
    type Pipeline = CopyPipeline;
    type Sampler = wgpu::Sampler;
    type SourceTexture = wgpu::TextureView;
    type CopyTarget = wgpu::Texture;

    fn create_readback(&self, byte_len: u64) -> ReadbackBuffer {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Probe Readback"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        ReadbackBuffer {
            buffer,
            state: RefCell::new(MapState::Idle),
        }
    }

    fn create_copy_pipeline(&self) -> CopyPipeline {
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Probe Copy Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(COPY_WGSL)),
        });

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Probe Copy Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Probe Copy Pipeline Layout"),
                bind_group_layouts: &[Some(&layout)],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Probe Copy Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::R32Uint,
                        blend: None,
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

        CopyPipeline { pipeline, layout }
    }

    fn pipeline_ready(&self, _pipeline: &CopyPipeline) -> bool {
        // wgpu pipeline creation is synchronous; the readiness probe exists
        // for backends with asynchronous shader compilation.
        true
    }

    fn create_point_sampler(&self) -> wgpu::Sampler {
        // Depth textures must be sampled with nearest filtering.
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Probe Point Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        })
    }

    fn run_copy_pass(
        &self,
        pipeline: &CopyPipeline,
        sampler: &wgpu::Sampler,
        source: &wgpu::TextureView,
        width: u32,
        height: u32,
        schedule_reads: &mut dyn FnMut(&wgpu::Texture),
    ) {
        let target = self.ensure_copy_target(width, height);
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Probe Copy BindGroup"),
            layout: &pipeline.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Probe Copy Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Probe Copy Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });

            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        *self.encoder.borrow_mut() = Some(encoder);

        schedule_reads(&target);

        // A continuation that scheduled no reads leaves the encoder behind;
        // submit it anyway so the pass is not silently dropped.
        if let Some(encoder) = self.encoder.borrow_mut().take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn read_pixel(
        &self,
        readback: &ReadbackBuffer,
        index: usize,
        target: &wgpu::Texture,
        x: u32,
        y: u32,
    ) {
        let mut slot = self.encoder.borrow_mut();
        let encoder = slot
            .as_mut()
            .expect("read_pixel called outside a copy pass continuation");

        // A normalized coordinate of exactly +1 maps one past the last
        // texel; the read itself must stay inside the target.
        let x = x.min(target.width() - 1);
        let y = y.min(target.height() - 1);

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: target,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: (index as u64) * 4,
                    bytes_per_row: None,
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }

    fn submit_readback(&self, readback: &ReadbackBuffer) {
        let encoder = self
            .encoder
            .borrow_mut()
            .take()
            .expect("submit_readback called with no pending copy pass");
        self.queue.submit(Some(encoder.finish()));

        let (sender, receiver) = mpsc::channel();
        readback
            .buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        *readback.state.borrow_mut() = MapState::Mapping(receiver);
    }

    fn try_complete_readback(&self, readback: &ReadbackBuffer, dst: &mut [u32]) -> Result<bool> {
        let _ = self.device.poll(wgpu::PollType::Poll);

        let mut state = readback.state.borrow_mut();
        let MapState::Mapping(receiver) = &*state else {
            return Ok(false);
        };

        match receiver.try_recv() {
            Ok(Ok(())) => {
                {
                    let mapped = readback.buffer.slice(..).get_mapped_range();
                    let raw: &[u32] = bytemuck::cast_slice(&mapped);
                    let len = dst.len().min(raw.len());
                    dst[..len].copy_from_slice(&raw[..len]);
                }
                readback.buffer.unmap();
                *state = MapState::Idle;
                Ok(true)
            }
            Ok(Err(err)) => {
                *state = MapState::Idle;
                Err(ProbeError::ReadbackMapFailed(err.to_string()))
            }
            Err(mpsc::TryRecvError::Empty) => Ok(false),
            Err(mpsc::TryRecvError::Disconnected) => {
                *state = MapState::Idle;
                Err(ProbeError::Backend(
                    "readback mapping callback dropped".into(),
                ))
            }
        }
    }

    fn destroy_readback(&self, readback: ReadbackBuffer) {
        // wgpu resources release on drop.
        drop(readback);
    }

    fn destroy_pipeline(&self, pipeline: CopyPipeline) {
        drop(pipeline);
    }

    fn destroy_sampler(&self, sampler: wgpu::Sampler) {
        drop(sampler);
    }
}
