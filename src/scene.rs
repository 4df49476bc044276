use crate::cloth::ClothState;
use crate::error::ClothError;
use crate::gpu::GpuCloth;
use crate::render::{ClothMesh, ClothRenderer};
use crate::stepper::Stepper;
use crate::{Backend, RunOptions};
use wgpu::util::DeviceExt;

/// Host resources for one frame, handed to every object instead of living in globals.
pub struct FrameContext<'a> {
  pub device: &'a wgpu::Device,
  pub queue: &'a wgpu::Queue,
  pub camera_bind_group: &'a wgpu::BindGroup,
  pub frame: u64,
}

/// Cloth stepped by the CPU kernel and uploaded to the GPU for drawing.
pub struct CpuCloth {
  state: ClothState,
  stepper: Stepper,
  positions: wgpu::Buffer,
  normals: wgpu::Buffer,
  mesh: ClothMesh,
}

impl CpuCloth {
  #[must_use]
  pub fn new(device: &wgpu::Device, state: ClothState, stepper: Stepper) -> Self {
    let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Cloth Position Upload Buffer"),
      contents: bytemuck::cast_slice(&state.read_snapshot().positions),
      usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    });
    let normals = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Cloth Normal Upload Buffer"),
      contents: bytemuck::cast_slice(state.normals()),
      usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    });
    let mesh = ClothMesh::new(device, state.grid());
    Self {
      state,
      stepper,
      positions,
      normals,
      mesh,
    }
  }

  pub fn update(&mut self, queue: &wgpu::Queue) {
    self.state.advance(&self.stepper);
    queue.write_buffer(
      &self.positions,
      0,
      bytemuck::cast_slice(&self.state.read_snapshot().positions),
    );
    queue.write_buffer(&self.normals, 0, bytemuck::cast_slice(self.state.normals()));
  }

  pub fn state(&self) -> &ClothState {
    &self.state
  }
}

/// Everything the scene can hold.
pub enum SceneObject {
  Gpu(GpuCloth),
  Cpu(CpuCloth),
}

impl SceneObject {
  pub fn build(device: &wgpu::Device, options: &RunOptions) -> Result<Self, ClothError> {
    let (state, stepper) = options.build_simulation()?;
    Ok(match options.backend {
      Backend::Gpu => SceneObject::Gpu(GpuCloth::new(device, &stepper, &state)),
      Backend::Cpu => SceneObject::Cpu(CpuCloth::new(device, state, stepper)),
    })
  }

  pub fn label(&self) -> &'static str {
    match self {
      SceneObject::Gpu(_) => "gpu cloth",
      SceneObject::Cpu(_) => "cpu cloth",
    }
  }

  pub fn steps(&self) -> u64 {
    match self {
      SceneObject::Gpu(cloth) => cloth.steps(),
      SceneObject::Cpu(cloth) => cloth.state().steps(),
    }
  }

  pub fn update(&mut self, ctx: &FrameContext<'_>, command_encoder: &mut wgpu::CommandEncoder) {
    match self {
      SceneObject::Gpu(cloth) => cloth.update(command_encoder),
      SceneObject::Cpu(cloth) => cloth.update(ctx.queue),
    }
  }

  pub fn draw(
    &self,
    rpass: &mut wgpu::RenderPass<'_>,
    renderer: &ClothRenderer,
    ctx: &FrameContext<'_>,
  ) {
    match self {
      SceneObject::Gpu(cloth) => cloth.draw(rpass, renderer, ctx.camera_bind_group),
      SceneObject::Cpu(cloth) => renderer.draw(
        rpass,
        ctx.camera_bind_group,
        &cloth.positions,
        &cloth.normals,
        &cloth.mesh,
      ),
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle(u32);

/// Insertion-ordered registry. Handles are never reused.
pub struct ObjectList<T> {
  next_id: u32,
  objects: Vec<(ObjectHandle, T)>,
}

impl<T> Default for ObjectList<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> ObjectList<T> {
  pub fn new() -> Self {
    Self {
      next_id: 0,
      objects: Vec::new(),
    }
  }

  pub fn add(&mut self, object: T) -> ObjectHandle {
    let handle = ObjectHandle(self.next_id);
    self.next_id += 1;
    self.objects.push((handle, object));
    handle
  }

  pub fn remove(&mut self, handle: ObjectHandle) -> Option<T> {
    let position = self.objects.iter().position(|(h, _)| *h == handle)?;
    Some(self.objects.remove(position).1)
  }

  pub fn get(&self, handle: ObjectHandle) -> Option<&T> {
    self.objects.iter().find(|(h, _)| *h == handle).map(|(_, o)| o)
  }

  pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut T> {
    self
      .objects
      .iter_mut()
      .find(|(h, _)| *h == handle)
      .map(|(_, o)| o)
  }

  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.objects.iter().map(|(_, o)| o)
  }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
    self.objects.iter_mut().map(|(_, o)| o)
  }
}

pub type Scene = ObjectList<SceneObject>;

impl ObjectList<SceneObject> {
  pub fn update(&mut self, ctx: &FrameContext<'_>, command_encoder: &mut wgpu::CommandEncoder) {
    for object in self.iter_mut() {
      object.update(ctx, command_encoder);
    }
  }

  pub fn draw(
    &self,
    rpass: &mut wgpu::RenderPass<'_>,
    renderer: &ClothRenderer,
    ctx: &FrameContext<'_>,
  ) {
    for object in self.iter() {
      object.draw(rpass, renderer, ctx);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handles_are_unique_and_stable() {
    let mut list = ObjectList::new();
    let a = list.add("a");
    let b = list.add("b");
    assert_ne!(a, b);
    assert_eq!(list.remove(a), Some("a"));
    let c = list.add("c");
    assert_ne!(c, a);
    assert_eq!(list.get(b), Some(&"b"));
    assert_eq!(list.get(a), None);
    assert_eq!(list.len(), 2);
  }

  #[test]
  fn removing_twice_is_a_no_op() {
    let mut list = ObjectList::new();
    let a = list.add(1);
    assert_eq!(list.remove(a), Some(1));
    assert_eq!(list.remove(a), None);
    assert!(list.is_empty());
  }

  #[test]
  fn iterates_in_insertion_order() {
    let mut list = ObjectList::new();
    list.add(1);
    let middle = list.add(2);
    list.add(3);
    if let Some(v) = list.get_mut(middle) {
      *v = 20;
    }
    for v in list.iter_mut() {
      *v += 1;
    }
    assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![2, 21, 4]);
  }
}
