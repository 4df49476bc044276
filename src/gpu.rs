//! GPU backend: the same step as [`Stepper`], as two WGSL compute passes over
//! ping-pong storage buffers.

use crate::cloth::{ClothState, DoubleBuffer, Grid};
use crate::render::{ClothMesh, ClothRenderer};
use crate::stepper::{SpringParams, Stepper};
use std::borrow::Cow;
use wgpu::{util::DeviceExt, PipelineCompilationOptions};

const WORKGROUP_SIZE: u32 = 8;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpringUniform {
  stiffness: f32,
  damping: f32,
  rest_length: f32,
  _pad: f32,
}

impl From<&SpringParams> for SpringUniform {
  fn from(spring: &SpringParams) -> Self {
    Self {
      stiffness: spring.stiffness,
      damping: spring.damping,
      rest_length: spring.rest_length,
      _pad: 0.0,
    }
  }
}

/// Uniform block of `cloth_update.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClothUniforms {
  pub neighbour: SpringUniform,
  pub diagonal: SpringUniform,
  pub bending: SpringUniform,
  pub resolution: [u32; 2],
  pub time_step: f32,
  pub gravity: f32,
  pub pin_rule: u32,
  pub delta_sign: f32,
  pub damping_sign: f32,
  /// 0 disables the floor
  pub distance_floor: f32,
}

impl ClothUniforms {
  #[must_use]
  pub fn from_stepper(stepper: &Stepper) -> Self {
    let springs = stepper.springs();
    let grid = stepper.grid();
    Self {
      neighbour: (&springs.neighbour).into(),
      diagonal: (&springs.diagonal).into(),
      bending: (&springs.bending).into(),
      resolution: [grid.width(), grid.height()],
      time_step: stepper.time_step(),
      gravity: stepper.gravity(),
      pin_rule: stepper.pin_rule().code(),
      delta_sign: stepper.delta().sign(),
      damping_sign: stepper.damping().sign(),
      distance_floor: stepper.distance_floor().unwrap_or(0.0),
    }
  }
}

struct GpuSnapshot {
  positions: wgpu::Buffer,
  velocities: wgpu::Buffer,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility: wgpu::ShaderStages::COMPUTE,
    ty: wgpu::BindingType::Buffer {
      ty: wgpu::BufferBindingType::Storage { read_only },
      has_dynamic_offset: false,
      min_binding_size: None,
    },
    count: None,
  }
}

pub struct GpuCloth {
  grid: Grid,
  snapshots: DoubleBuffer<GpuSnapshot>,
  normals: wgpu::Buffer,
  // indexed by the read slot
  bind_groups: [wgpu::BindGroup; 2],
  integrate_pipeline: wgpu::ComputePipeline,
  normals_pipeline: wgpu::ComputePipeline,
  mesh: ClothMesh,
  work_group_count: [u32; 2],
  steps: u64,
}

impl GpuCloth {
  /// Uploads `state`'s read snapshot into both slots and its normals into the normal buffer.
  #[must_use]
  pub fn new(device: &wgpu::Device, stepper: &Stepper, state: &ClothState) -> Self {
    let grid = stepper.grid();
    let compute_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("Cloth Update Shader"),
      source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("shaders/cloth_update.wgsl"))),
    });
    let uniforms = ClothUniforms::from_stepper(stepper);
    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Cloth Parameter Buffer"),
      contents: bytemuck::bytes_of(&uniforms),
      usage: wgpu::BufferUsages::UNIFORM,
    });

    let compute_bind_group_layout =
      device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
          wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
              ty: wgpu::BufferBindingType::Uniform,
              has_dynamic_offset: false,
              min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ClothUniforms>() as _),
            },
            count: None,
          },
          storage_entry(1, true),
          storage_entry(2, true),
          storage_entry(3, false),
          storage_entry(4, false),
          storage_entry(5, false),
        ],
        label: Some("cloth_compute_bind_group_layout"),
      });
    let compute_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("cloth compute"),
      bind_group_layouts: &[&compute_bind_group_layout],
      push_constant_ranges: &[],
    });
    let compute_pipeline = |label: &str, entry_point: &str| {
      device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&compute_pipeline_layout),
        module: &compute_shader,
        entry_point,
        compilation_options: PipelineCompilationOptions::default(),
        cache: None,
      })
    };
    let integrate_pipeline = compute_pipeline("Cloth Integrate Pipeline", "integrate");
    let normals_pipeline = compute_pipeline("Cloth Normals Pipeline", "normals_main");

    let seed = state.read_snapshot();
    let snapshot_buffers = |slot: usize| GpuSnapshot {
      positions: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Cloth Position Buffer {slot}")),
        contents: bytemuck::cast_slice(&seed.positions),
        usage: wgpu::BufferUsages::VERTEX
          | wgpu::BufferUsages::STORAGE
          | wgpu::BufferUsages::COPY_DST
          | wgpu::BufferUsages::COPY_SRC,
      }),
      velocities: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Cloth Velocity Buffer {slot}")),
        contents: bytemuck::cast_slice(&seed.velocities),
        usage: wgpu::BufferUsages::STORAGE
          | wgpu::BufferUsages::COPY_DST
          | wgpu::BufferUsages::COPY_SRC,
      }),
    };
    let snapshots = DoubleBuffer::new(snapshot_buffers(0), snapshot_buffers(1));
    let normals = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Cloth Normal Buffer"),
      contents: bytemuck::cast_slice(state.normals()),
      usage: wgpu::BufferUsages::VERTEX
        | wgpu::BufferUsages::STORAGE
        | wgpu::BufferUsages::COPY_DST
        | wgpu::BufferUsages::COPY_SRC,
    });

    let bind_group = |read: usize| {
      let from = snapshots.get(read);
      let to = snapshots.get(read ^ 1);
      device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &compute_bind_group_layout,
        entries: &[
          wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
          },
          wgpu::BindGroupEntry {
            binding: 1,
            resource: from.positions.as_entire_binding(),
          },
          wgpu::BindGroupEntry {
            binding: 2,
            resource: from.velocities.as_entire_binding(),
          },
          wgpu::BindGroupEntry {
            binding: 3,
            resource: to.positions.as_entire_binding(),
          },
          wgpu::BindGroupEntry {
            binding: 4,
            resource: to.velocities.as_entire_binding(),
          },
          wgpu::BindGroupEntry {
            binding: 5,
            resource: normals.as_entire_binding(),
          },
        ],
        label: Some(&format!("Cloth Bind Group {read}")),
      })
    };
    let bind_groups = [bind_group(0), bind_group(1)];

    let work_group_count = [
      grid.width().div_ceil(WORKGROUP_SIZE),
      grid.height().div_ceil(WORKGROUP_SIZE),
    ];
    log::debug!(
      "gpu cloth {}x{}, {:?} workgroups",
      grid.width(),
      grid.height(),
      work_group_count
    );

    Self {
      grid,
      snapshots,
      normals,
      bind_groups,
      integrate_pipeline,
      normals_pipeline,
      mesh: ClothMesh::new(device, grid),
      work_group_count,
      steps: 0,
    }
  }

  /// Encodes one step and publishes its output slot. Later passes in the same encoder
  /// see the new snapshot.
  pub fn update(&mut self, command_encoder: &mut wgpu::CommandEncoder) {
    let bind_group = &self.bind_groups[self.snapshots.read_index()];
    let [groups_x, groups_y] = self.work_group_count;
    {
      let mut cpass = command_encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("cloth integrate"),
        timestamp_writes: None,
      });
      cpass.set_pipeline(&self.integrate_pipeline);
      cpass.set_bind_group(0, bind_group, &[]);
      cpass.dispatch_workgroups(groups_x, groups_y, 1);
    }
    // separate pass: every position is written before any normal is built
    {
      let mut cpass = command_encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("cloth normals"),
        timestamp_writes: None,
      });
      cpass.set_pipeline(&self.normals_pipeline);
      cpass.set_bind_group(0, bind_group, &[]);
      cpass.dispatch_workgroups(groups_x, groups_y, 1);
    }
    self.snapshots.swap();
    self.steps += 1;
  }

  pub fn draw(
    &self,
    rpass: &mut wgpu::RenderPass<'_>,
    renderer: &ClothRenderer,
    camera_bind_group: &wgpu::BindGroup,
  ) {
    renderer.draw(
      rpass,
      camera_bind_group,
      self.positions(),
      &self.normals,
      &self.mesh,
    );
  }

  pub fn grid(&self) -> Grid {
    self.grid
  }

  pub fn read_index(&self) -> usize {
    self.snapshots.read_index()
  }

  pub fn positions(&self) -> &wgpu::Buffer {
    &self.snapshots.read().positions
  }

  pub fn normals(&self) -> &wgpu::Buffer {
    &self.normals
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::stepper::{KernelVariant, PinRule};
  use crate::ClothDesc;

  #[test]
  fn uniform_block_matches_shader_layout() {
    assert_eq!(std::mem::size_of::<SpringUniform>(), 16);
    assert_eq!(std::mem::size_of::<ClothUniforms>(), 80);
  }

  #[test]
  fn uniforms_mirror_the_stepper() {
    let grid = Grid::new(64, 32).unwrap();
    let stepper = Stepper::new(&ClothDesc::default(), grid, KernelVariant::FlippedDelta)
      .unwrap()
      .with_pin_rule(PinRule::TopRow)
      .with_distance_floor(Some(0.001));
    let uniforms = ClothUniforms::from_stepper(&stepper);
    assert_eq!(uniforms.resolution, [64, 32]);
    assert_eq!(uniforms.time_step, 0.001);
    assert_eq!(uniforms.gravity, 9.8);
    assert_eq!(uniforms.pin_rule, 2);
    assert_eq!(uniforms.delta_sign, -1.0);
    assert_eq!(uniforms.damping_sign, -1.0);
    assert_eq!(uniforms.distance_floor, 0.001);
    assert_eq!(uniforms.bending, SpringUniform::from(&stepper.springs().bending));
  }

  #[test]
  fn no_floor_encodes_as_zero() {
    let grid = Grid::new(8, 8).unwrap();
    let stepper = Stepper::new(&ClothDesc::default(), grid, KernelVariant::AddedDamping).unwrap();
    let uniforms = ClothUniforms::from_stepper(&stepper);
    assert_eq!(uniforms.distance_floor, 0.0);
    assert_eq!(uniforms.damping_sign, 1.0);
    assert_eq!(uniforms.pin_rule, 1);
  }
}
