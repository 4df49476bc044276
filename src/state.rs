use crate::camera::{Camera, CameraController, CameraUniform};
use crate::error::AppError;
use crate::render::{create_depth_view, ClothRenderer};
use crate::scene::{FrameContext, Scene, SceneObject};
use crate::{CameraParams, RunOptions};
use std::sync::Arc;
use std::time::Instant;
use wgpu::util::DeviceExt;
use winit::event::ElementState;
use winit::keyboard::*;
use winit::{
  dpi::PhysicalSize,
  event::{Event, KeyEvent, StartCause, WindowEvent},
  event_loop::{EventLoop, EventLoopWindowTarget},
  window::Window,
};

const FPS_REPORT_FRAMES: u64 = 300;

struct EventLoopWrapper {
  event_loop: EventLoop<()>,
  window: Arc<Window>,
}

impl EventLoopWrapper {
  pub fn new(title: &str) -> Result<Self, AppError> {
    let event_loop = EventLoop::new()?;
    let mut builder = winit::window::WindowBuilder::new();
    builder = builder.with_title(title).with_resizable(false);
    let window = Arc::new(builder.build(&event_loop)?);

    Ok(Self { event_loop, window })
  }
}

struct SurfaceWrapper {
  surface: wgpu::Surface<'static>,
  config: wgpu::SurfaceConfiguration,
}

impl SurfaceWrapper {
  fn configure(
    surface: wgpu::Surface<'static>,
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
    size: PhysicalSize<u32>,
  ) -> Result<Self, AppError> {
    let width = size.width.max(1);
    let height = size.height.max(1);
    let mut config = surface
      .get_default_config(adapter, width, height)
      .ok_or(AppError::NoSurfaceConfig)?;
    let view_format = config.format.add_srgb_suffix();
    config.view_formats.push(view_format);
    surface.configure(device, &config);
    Ok(Self { surface, config })
  }

  fn acquire(&self, device: &wgpu::Device) -> Option<wgpu::SurfaceTexture> {
    match self.surface.get_current_texture() {
      Ok(frame) => Some(frame),
      Err(wgpu::SurfaceError::Timeout) => self.surface.get_current_texture().ok(),
      Err(
        e @ (wgpu::SurfaceError::Outdated
        | wgpu::SurfaceError::Lost
        | wgpu::SurfaceError::OutOfMemory),
      ) => {
        log::warn!("surface {e:?}, reconfiguring");
        self.surface.configure(device, &self.config);
        self.surface.get_current_texture().ok()
      }
    }
  }
}

struct State {
  device: wgpu::Device,
  queue: wgpu::Queue,
  surface: SurfaceWrapper,
  depth_view: wgpu::TextureView,
  camera: Camera,
  camera_uniform: CameraUniform,
  camera_buffer: wgpu::Buffer,
  camera_bind_group: wgpu::BindGroup,
  camera_controller: CameraController,
  renderer: ClothRenderer,
  scene: Scene,
  frame: u64,
  last_report: Instant,
}

impl State {
  async fn init(window: Arc<Window>, options: &RunOptions) -> Result<Self, AppError> {
    let size = window.inner_size();
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
      #[cfg(not(target_arch = "wasm32"))]
      backends: wgpu::Backends::PRIMARY,
      ..Default::default()
    });
    let surface = instance.create_surface(window)?;

    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
      })
      .await
      .ok_or(AppError::NoAdapter)?;
    log::info!("using adapter {:?}", adapter.get_info());

    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: None,
          required_features: wgpu::Features::empty(),
          required_limits: wgpu::Limits::default(),
          memory_hints: Default::default(),
        },
        None,
      )
      .await?;
    let surface = SurfaceWrapper::configure(surface, &adapter, &device, size)?;
    let depth_view = create_depth_view(&device, &surface.config);

    let camera = Camera::framing_cloth(size.width.max(1) as f32 / size.height.max(1) as f32);
    let mut camera_uniform = CameraUniform::new();
    camera_uniform.update(&camera);

    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Camera Buffer"),
      contents: bytemuck::cast_slice(&[camera_uniform]),
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let camera_bind_group_layout =
      device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
          binding: 0,
          visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
          ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
          },
          count: None,
        }],
        label: Some("camera_bind_group_layout"),
      });
    let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      layout: &camera_bind_group_layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: camera_buffer.as_entire_binding(),
      }],
      label: Some("camera_bind_group"),
    });
    let camera_params = CameraParams::default();
    let camera_controller =
      CameraController::init(camera_params.speed, camera_params.rotational_speed);

    let renderer = ClothRenderer::init(&surface.config, &device, &camera_bind_group_layout);
    let mut scene = Scene::new();
    let object = SceneObject::build(&device, options)?;
    log::info!("added {}", object.label());
    scene.add(object);

    Ok(Self {
      device,
      queue,
      surface,
      depth_view,
      camera,
      camera_uniform,
      camera_buffer,
      camera_bind_group,
      camera_controller,
      renderer,
      scene,
      frame: 0,
      last_report: Instant::now(),
    })
  }

  fn input(&mut self, event: &WindowEvent) -> bool {
    self.camera_controller.process_events(event)
  }

  fn update_camera(&mut self) {
    self.camera_controller.update_camera(&mut self.camera);
    self.camera_uniform.update(&self.camera);
    self.queue.write_buffer(
      &self.camera_buffer,
      0,
      bytemuck::cast_slice(&[self.camera_uniform]),
    );
  }

  /// Advances every object by one step, then draws the snapshots the steps just published.
  fn redraw(&mut self) {
    self.update_camera();
    let Some(frame) = self.surface.acquire(&self.device) else {
      log::warn!("no surface texture, skipping frame {}", self.frame);
      return;
    };
    let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
      format: Some(self.surface.config.view_formats[0]),
      ..wgpu::TextureViewDescriptor::default()
    });
    let ctx = FrameContext {
      device: &self.device,
      queue: &self.queue,
      camera_bind_group: &self.camera_bind_group,
      frame: self.frame,
    };

    let mut command_encoder = ctx
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    self.scene.update(&ctx, &mut command_encoder);
    {
      let color_attachments = [Some(wgpu::RenderPassColorAttachment {
        view: &view,
        resolve_target: None,
        ops: wgpu::Operations {
          load: wgpu::LoadOp::Clear(wgpu::Color {
            r: 0.1,
            g: 0.1,
            b: 0.3,
            a: 1.0,
          }),
          store: wgpu::StoreOp::Store,
        },
      })];
      let mut rpass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("cloth draw"),
        color_attachments: &color_attachments,
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
          view: &self.depth_view,
          depth_ops: Some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
          }),
          stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
      });
      self.scene.draw(&mut rpass, &self.renderer, &ctx);
    }
    self.queue.submit(Some(command_encoder.finish()));
    frame.present();

    self.frame += 1;
    if self.frame % FPS_REPORT_FRAMES == 0 {
      let elapsed = self.last_report.elapsed().as_secs_f32();
      let steps: u64 = self.scene.iter().map(SceneObject::steps).sum();
      log::info!(
        "frame {}: {:.1} fps, {} steps total",
        self.frame,
        FPS_REPORT_FRAMES as f32 / elapsed.max(f32::EPSILON),
        steps
      );
      self.last_report = Instant::now();
    }
  }
}

async fn start(options: RunOptions) -> Result<(), AppError> {
  let window_loop = EventLoopWrapper::new("Cloth Sim")?;
  let mut context = State::init(window_loop.window.clone(), &options).await?;
  let window = window_loop.window.clone();

  window_loop.event_loop.run(
    move |event, target: &EventLoopWindowTarget<()>| match event {
      Event::NewEvents(StartCause::Init) => window.request_redraw(),
      Event::WindowEvent { event, window_id } if window_id == window.id() => {
        if !context.input(&event) {
          match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
              event:
                KeyEvent {
                  state: ElementState::Pressed,
                  physical_key: PhysicalKey::Code(KeyCode::Escape),
                  ..
                },
              ..
            } => target.exit(),
            WindowEvent::RedrawRequested => {
              window.request_redraw();
              context.redraw();
            }
            _ => {}
          }
        }
      }
      _ => {}
    },
  )?;
  Ok(())
}

/// Opens a window and runs the simulation until it is closed.
pub fn run(options: RunOptions) -> Result<(), AppError> {
  pollster::block_on(start(options))
}
