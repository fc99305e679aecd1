//! wgpu renderer that draws one full-window texture.

use anyhow::{anyhow, bail};
use wgpu::*;
use winit::{dpi::PhysicalSize, event_loop::EventLoopWindowTarget, window::WindowBuilder};

use crate::image::Resolution;

const BACKGROUND: Color = Color::BLACK;

/// A handle to a GPU.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    /// Opens a suitable default GPU.
    pub async fn open() -> anyhow::Result<Self> {
        // The OpenGL backend panics spuriously, so don't enable it.
        let backends = Backends::PRIMARY;
        let instance = Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&Default::default())
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;
        let info = adapter.get_info();
        log::info!(
            "using {} ({:?}, {:?} backend)",
            info.name,
            info.device_type,
            info.backend,
        );

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    // Camera frames can exceed the downlevel texture size limit.
                    limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

pub struct Window {
    win: winit::window::Window,
    resolution: Resolution,
}

impl Window {
    pub fn open<T>(
        event_loop: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
    ) -> anyhow::Result<Self> {
        let win = WindowBuilder::new()
            .with_resizable(false)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_title(title)
            .build(event_loop)?;
        Ok(Self { win, resolution })
    }
}

struct Texture {
    inner: wgpu::Texture,
    size: Extent3d,
    label: String,
    format: TextureFormat,
}

impl Texture {
    fn empty(gpu: &Gpu, label: &str) -> Self {
        let format = TextureFormat::Rgba8UnormSrgb;
        Self {
            label: label.to_string(),
            inner: Self::create(gpu, label, Extent3d::default(), format),
            size: Extent3d::default(),
            format,
        }
    }

    fn create(gpu: &Gpu, label: &str, size: Extent3d, format: TextureFormat) -> wgpu::Texture {
        gpu.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    /// Uploads RGBA8 `data` to the texture. Returns whether the texture had to be reallocated.
    fn update(&mut self, gpu: &Gpu, size: Extent3d, data: &[u8]) -> bool {
        assert_eq!((size.width * size.height * 4) as usize, data.len());

        let mut reallocated = false;
        if self.size != size {
            log::trace!(
                "reallocating texture '{}' ({}x{} -> {}x{})",
                self.label,
                self.size.width,
                self.size.height,
                size.width,
                size.height
            );
            reallocated = true;
            self.inner = Self::create(gpu, &self.label, size, self.format);
            self.size = size;
        }

        gpu.queue.write_texture(
            ImageCopyTexture {
                texture: &self.inner,
                mip_level: 0,
                origin: Origin3d::default(),
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: None,
            },
            size,
        );

        reallocated
    }
}

fn create_bind_group(device: &Device, layout: &BindGroupLayout, texture: &Texture) -> BindGroup {
    let sampler = device.create_sampler(&SamplerDescriptor::default());
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("textured_quad"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(
                    &texture.inner.create_view(&Default::default()),
                ),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    })
}

/// Renders RGBA8 images into a [`Window`].
pub struct Renderer {
    gpu: Gpu,
    surface: Surface,
    surface_format: TextureFormat,
    pipeline: RenderPipeline,
    texture: Texture,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,

    /// Surface must be destroyed before `Window`.
    window: Window,
}

impl Renderer {
    pub fn new(window: Window, gpu: Gpu) -> anyhow::Result<Self> {
        let surface = unsafe { gpu.instance.create_surface(&window.win)? };
        let Some(&surface_format) = surface.get_capabilities(&gpu.adapter).formats.first() else {
            bail!("graphics adapter cannot render to window surface");
        };

        let shader = gpu.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("fullscreen texture shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let bind_group_layout = gpu
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: None,
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });

        let pipeline = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("textured_quad"),
            layout: Some(
                &gpu.device
                    .create_pipeline_layout(&PipelineLayoutDescriptor {
                        label: None,
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    }),
            ),
            vertex: VertexState {
                module: &shader,
                entry_point: "vert",
                buffers: &[],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "frag",
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    write_mask: ColorWrites::ALL,
                    blend: None,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
        });

        let texture = Texture::empty(&gpu, "frame");
        let bind_group = create_bind_group(&gpu.device, &bind_group_layout, &texture);

        let this = Self {
            gpu,
            surface,
            surface_format,
            pipeline,
            texture,
            bind_group_layout,
            bind_group,
            window,
        };
        this.configure_surface();
        Ok(this)
    }

    pub fn resolution(&self) -> Resolution {
        self.window.resolution
    }

    /// Resizes the window and its surface to `res`.
    pub fn resize(&mut self, res: Resolution) {
        log::debug!("resizing window from {} to {}", self.window.resolution, res);
        self.window
            .win
            .set_inner_size(PhysicalSize::new(res.width(), res.height()));
        self.window.resolution = res;
        self.configure_surface();
    }

    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) {
        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if self.texture.update(&self.gpu, size, data) {
            // The bind group refers to the old texture.
            self.bind_group =
                create_bind_group(&self.gpu.device, &self.bind_group_layout, &self.texture);
        }
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.configure_surface();
                self.surface.get_current_texture()?
            }
            Err(e) => bail!("failed to acquire frame: {e}"),
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(BACKGROUND),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        self.gpu.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }

    fn configure_surface(&self) {
        let res = self.window.win.inner_size();
        log::debug!(
            "creating target surface at {} (format: {:?})",
            self.window.resolution,
            self.surface_format,
        );
        if res.width != self.window.resolution.width()
            || res.height != self.window.resolution.height()
        {
            // Not an error right after a resize, the window manager may apply it later.
            log::debug!(
                "window dimensions {}x{} do not match configured output resolution {}",
                res.width,
                res.height,
                self.window.resolution,
            );
        }
        let config = surface_config(self.surface_format, self.window.resolution);
        self.surface.configure(&self.gpu.device, &config);
    }
}

/// Surface configuration for presenting frames at `res`.
///
/// Presentation does not wait for vertical blank.
fn surface_config(format: TextureFormat, res: Resolution) -> SurfaceConfiguration {
    SurfaceConfiguration {
        usage: TextureUsages::RENDER_ATTACHMENT,
        format,
        width: res.width(),
        height: res.height(),
        present_mode: PresentMode::AutoNoVsync,
        alpha_mode: CompositeAlphaMode::Auto,
        view_formats: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_follows_resolution() {
        let config = surface_config(TextureFormat::Bgra8UnormSrgb, Resolution::new(640, 360));
        assert_eq!((config.width, config.height), (640, 360));
        assert_eq!(config.format, TextureFormat::Bgra8UnormSrgb);
        assert_eq!(config.usage, TextureUsages::RENDER_ATTACHMENT);
    }

    #[test]
    fn presentation_does_not_wait_for_vblank() {
        let config = surface_config(TextureFormat::Rgba8UnormSrgb, Resolution::RES_VGA);
        assert_eq!(config.present_mode, PresentMode::AutoNoVsync);
    }
}
