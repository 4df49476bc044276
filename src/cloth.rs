use crate::error::ClothError;
use crate::initialize::{seed_snapshot, Corners};
use crate::stepper::Stepper;
use cgmath::Vector3;

/// Fixed lattice of cloth particles, addressed by `y * width + x`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Grid {
  width: u32,
  height: u32,
}

impl Grid {
  pub fn new(width: u32, height: u32) -> Result<Self, ClothError> {
    if width < 2 || height < 1 {
      return Err(ClothError::GridTooSmall { width, height });
    }
    Ok(Self { width, height })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn len(&self) -> usize {
    self.width as usize * self.height as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn index(&self, x: u32, y: u32) -> usize {
    y as usize * self.width as usize + x as usize
  }

  pub fn coords(&self, index: usize) -> (u32, u32) {
    let w = self.width as usize;
    ((index % w) as u32, (index / w) as u32)
  }

  /// Index of the cell at `(x + dx, y + dy)`, or `None` when it falls off the lattice.
  pub fn offset(&self, x: u32, y: u32, dx: i32, dy: i32) -> Option<usize> {
    let nx = x as i64 + dx as i64;
    let ny = y as i64 + dy as i64;
    if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
      return None;
    }
    Some(self.index(nx as u32, ny as u32))
  }

  /// Structural rest length: the seeded cloth spans two world units across its width.
  pub fn spacing(&self) -> f32 {
    2.0 / (self.width - 1) as f32
  }
}

pub(crate) fn xyz(v: [f32; 4]) -> Vector3<f32> {
  Vector3::new(v[0], v[1], v[2])
}

pub(crate) fn point(v: Vector3<f32>) -> [f32; 4] {
  [v.x, v.y, v.z, 1.0]
}

pub(crate) fn direction(v: Vector3<f32>) -> [f32; 4] {
  [v.x, v.y, v.z, 0.0]
}

pub(crate) fn try_filled(len: usize, value: [f32; 4]) -> Result<Vec<[f32; 4]>, ClothError> {
  let mut data = Vec::new();
  data
    .try_reserve_exact(len)
    .map_err(|_| ClothError::Allocation(len))?;
  data.resize(len, value);
  Ok(data)
}

/// Positions and velocities of every particle at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
  pub positions: Vec<[f32; 4]>,
  pub velocities: Vec<[f32; 4]>,
}

impl Snapshot {
  pub fn zeroed(len: usize) -> Result<Self, ClothError> {
    Ok(Self {
      positions: try_filled(len, [0.0, 0.0, 0.0, 1.0])?,
      velocities: try_filled(len, [0.0; 4])?,
    })
  }

  pub fn len(&self) -> usize {
    self.positions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }
}

/// Two slots with alternating read/write roles. The write slot is never the read slot.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
  slots: [T; 2],
  read: usize,
}

impl<T> DoubleBuffer<T> {
  pub fn new(front: T, back: T) -> Self {
    Self {
      slots: [front, back],
      read: 0,
    }
  }

  pub fn read_index(&self) -> usize {
    self.read
  }

  pub fn write_index(&self) -> usize {
    self.read ^ 1
  }

  pub fn swap(&mut self) {
    self.read ^= 1;
  }

  pub fn read(&self) -> &T {
    &self.slots[self.read]
  }

  pub fn write(&mut self) -> &mut T {
    &mut self.slots[self.read ^ 1]
  }

  pub fn get(&self, slot: usize) -> &T {
    &self.slots[slot & 1]
  }

  /// Borrows the read slot shared and the write slot exclusively.
  pub fn split_mut(&mut self) -> (&T, &mut T) {
    let (first, second) = self.slots.split_at_mut(1);
    if self.read == 0 {
      (&first[0], &mut second[0])
    } else {
      (&second[0], &mut first[0])
    }
  }
}

/// Summary of a snapshot, for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClothStats {
  pub min: [f32; 3],
  pub max: [f32; 3],
  pub max_speed: f32,
  pub non_finite: usize,
}

/// Double-buffered particle state plus the shared normal field.
pub struct ClothState {
  grid: Grid,
  snapshots: DoubleBuffer<Snapshot>,
  normals: Vec<[f32; 4]>,
  steps: u64,
}

impl ClothState {
  pub fn new(grid: Grid, corners: &Corners) -> Result<Self, ClothError> {
    let seed = seed_snapshot(grid, corners)?;
    let back = seed.clone();
    let normals = try_filled(grid.len(), [0.0, 0.0, 1.0, 0.0])?;
    log::debug!("allocated cloth state for {} cells", grid.len());
    Ok(Self {
      grid,
      snapshots: DoubleBuffer::new(seed, back),
      normals,
      steps: 0,
    })
  }

  pub fn grid(&self) -> Grid {
    self.grid
  }

  pub fn read_index(&self) -> usize {
    self.snapshots.read_index()
  }

  pub fn swap(&mut self) {
    self.snapshots.swap();
  }

  /// Most recently completed snapshot; the next step reads it.
  pub fn read_snapshot(&self) -> &Snapshot {
    self.snapshots.read()
  }

  pub fn snapshot(&self, slot: usize) -> &Snapshot {
    self.snapshots.get(slot)
  }

  pub fn normals(&self) -> &[[f32; 4]] {
    &self.normals
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }

  /// Runs one step into the write slot, then publishes it.
  pub fn advance(&mut self, stepper: &Stepper) {
    assert_eq!(stepper.grid(), self.grid, "stepper was built for another grid");
    let (read, write) = self.snapshots.split_mut();
    stepper.advance(read, write, &mut self.normals);
    self.snapshots.swap();
    self.steps += 1;
  }

  /// Rebuilds normals from the read snapshot without stepping.
  pub fn refresh_normals(&mut self, stepper: &Stepper) {
    stepper.reconstruct_normals(&self.snapshots.read().positions, &mut self.normals);
  }

  pub fn stats(&self) -> ClothStats {
    let snapshot = self.snapshots.read();
    let mut stats = ClothStats {
      min: [f32::INFINITY; 3],
      max: [f32::NEG_INFINITY; 3],
      max_speed: 0.0,
      non_finite: 0,
    };
    for (p, v) in snapshot.positions.iter().zip(&snapshot.velocities) {
      for axis in 0..3 {
        if !p[axis].is_finite() || !v[axis].is_finite() {
          stats.non_finite += 1;
          continue;
        }
        stats.min[axis] = stats.min[axis].min(p[axis]);
        stats.max[axis] = stats.max[axis].max(p[axis]);
      }
      let speed = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
      if speed.is_finite() {
        stats.max_speed = stats.max_speed.max(speed);
      }
    }
    stats
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::initialize::ClothPreset;

  #[test]
  fn grid_rejects_degenerate_sizes() {
    assert!(Grid::new(1, 4).is_err());
    assert!(Grid::new(4, 0).is_err());
    assert!(Grid::new(2, 1).is_ok());
  }

  #[test]
  fn grid_index_round_trips_coordinates() {
    let grid = Grid::new(5, 3).unwrap();
    assert_eq!(grid.index(0, 0), 0);
    assert_eq!(grid.index(4, 0), 4);
    assert_eq!(grid.index(0, 1), 5);
    assert_eq!(grid.coords(13), (3, 2));
    assert_eq!(grid.len(), 15);
  }

  #[test]
  fn offsets_stop_at_the_boundary() {
    let grid = Grid::new(4, 4).unwrap();
    assert_eq!(grid.offset(0, 0, -1, 0), None);
    assert_eq!(grid.offset(3, 3, 0, 1), None);
    assert_eq!(grid.offset(1, 1, 2, 0), Some(grid.index(3, 1)));
    assert_eq!(grid.offset(2, 2, 2, 0), None);
  }

  #[test]
  fn spacing_spans_two_units() {
    let grid = Grid::new(5, 5).unwrap();
    assert!((grid.spacing() * 4.0 - 2.0).abs() < 1e-6);
  }

  #[test]
  fn double_buffer_alternates_roles() {
    let mut buffer = DoubleBuffer::new("a", "b");
    assert_eq!(buffer.read_index(), 0);
    assert_eq!(buffer.write_index(), 1);
    assert_eq!(*buffer.read(), "a");
    buffer.swap();
    assert_eq!(buffer.read_index(), 1);
    assert_eq!(*buffer.read(), "b");
    *buffer.write() = "c";
    assert_eq!(*buffer.get(0), "c");
  }

  #[test]
  fn split_mut_hands_out_distinct_slots() {
    let mut buffer = DoubleBuffer::new(vec![1], vec![2]);
    {
      let (read, write) = buffer.split_mut();
      assert_eq!(read, &vec![1]);
      write.push(3);
    }
    buffer.swap();
    let (read, write) = buffer.split_mut();
    assert_eq!(read, &vec![2, 3]);
    assert_eq!(write, &mut vec![1]);
  }

  #[test]
  fn new_state_seeds_both_snapshots() {
    let grid = Grid::new(4, 4).unwrap();
    let state = ClothState::new(grid, &ClothPreset::Flat.corners()).unwrap();
    assert_eq!(state.read_index(), 0);
    assert_eq!(state.snapshot(0), state.snapshot(1));
    assert_eq!(state.normals().len(), 16);
    assert!(state.read_snapshot().velocities.iter().all(|v| *v == [0.0; 4]));
  }

  #[test]
  fn stats_cover_the_seeded_plane() {
    let grid = Grid::new(4, 4).unwrap();
    let state = ClothState::new(grid, &ClothPreset::Flat.corners()).unwrap();
    let stats = state.stats();
    assert_eq!(stats.min, [-1.0, -1.0, 0.0]);
    assert_eq!(stats.max, [1.0, 1.0, 0.0]);
    assert_eq!(stats.max_speed, 0.0);
    assert_eq!(stats.non_finite, 0);
  }

  #[test]
  fn stats_count_non_finite_components() {
    let grid = Grid::new(2, 1).unwrap();
    let mut state = ClothState::new(grid, &ClothPreset::Flat.corners()).unwrap();
    state.snapshots.write().positions[0] = [f32::NAN, 0.0, 0.0, 1.0];
    state.swap();
    assert_eq!(state.stats().non_finite, 1);
  }
}
