//! Mass-spring update kernel for the CPU.
//!
//! A step reads one [`Snapshot`], writes the other and then rebuilds the normal field from
//! the freshly written positions. Every cell is independent within a phase, so both
//! phases run in parallel; the end of the integration phase is the barrier the normal
//! phase relies on.

use crate::cloth::{direction, point, xyz, Grid, Snapshot};
use crate::error::ClothError;
use crate::{ClothDesc, Spring};
use cgmath::{InnerSpace, Vector3};
use rayon::prelude::*;
use std::f32::consts::SQRT_2;

pub const GRAVITY: f32 = 9.8;

/// Normal used when a cell's triangle fan degenerates.
pub const FALLBACK_NORMAL: [f32; 4] = [0.0, 0.0, 1.0, 0.0];

const NEIGHBOUR_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL_OFFSETS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const BENDING_OFFSETS: [(i32, i32); 4] = [(2, 0), (-2, 0), (0, 2), (0, -2)];

/// A spring class bound to a grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpringParams {
  pub stiffness: f32,
  pub damping: f32,
  pub rest_length: f32,
}

impl SpringParams {
  fn bind(spring: &Spring, rest_length: f32) -> Self {
    Self {
      stiffness: spring.stiffness,
      damping: spring.damping,
      rest_length,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpringSet {
  pub neighbour: SpringParams,
  pub diagonal: SpringParams,
  pub bending: SpringParams,
}

impl SpringSet {
  #[must_use]
  pub fn for_grid(desc: &ClothDesc, grid: Grid) -> Self {
    let spacing = grid.spacing();
    Self {
      neighbour: SpringParams::bind(&desc.neighbour, spacing),
      diagonal: SpringParams::bind(&desc.diagonal, spacing * SQRT_2),
      bending: SpringParams::bind(&desc.bending, spacing * 2.0),
    }
  }

  fn classes(&self) -> [(&SpringParams, &[(i32, i32); 4]); 3] {
    [
      (&self.neighbour, &NEIGHBOUR_OFFSETS),
      (&self.diagonal, &DIAGONAL_OFFSETS),
      (&self.bending, &BENDING_OFFSETS),
    ]
  }
}

/// Which cells are anchored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PinRule {
  Unpinned,
  /// `y == 0 && (x == 0 || x == W - 1)`
  #[default]
  TopCorners,
  TopRow,
}

impl PinRule {
  pub fn is_pinned(self, grid: Grid, x: u32, y: u32) -> bool {
    match self {
      PinRule::Unpinned => false,
      PinRule::TopCorners => y == 0 && (x == 0 || x == grid.width() - 1),
      PinRule::TopRow => y == 0,
    }
  }

  pub(crate) fn code(self) -> u32 {
    match self {
      PinRule::Unpinned => 0,
      PinRule::TopCorners => 1,
      PinRule::TopRow => 2,
    }
  }
}

/// Orientation of `Δp` and `Δv` in the pairwise spring term.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeltaConvention {
  SelfMinusNeighbour,
  NeighbourMinusSelf,
}

impl DeltaConvention {
  pub fn sign(self) -> f32 {
    match self {
      DeltaConvention::SelfMinusNeighbour => 1.0,
      DeltaConvention::NeighbourMinusSelf => -1.0,
    }
  }
}

/// Whether the damping term is subtracted from or added to the spring term.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DampingConvention {
  Subtract,
  Add,
}

impl DampingConvention {
  pub fn sign(self) -> f32 {
    match self {
      DampingConvention::Subtract => -1.0,
      DampingConvention::Add => 1.0,
    }
  }
}

/// Known flavours of the kernel. Only `Reference` is physically consistent; the others
/// reproduce sign slips and are kept so their behaviour stays pinned down.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum KernelVariant {
  #[default]
  Reference,
  FlippedDelta,
  AddedDamping,
}

impl KernelVariant {
  pub fn grid_size(self) -> u32 {
    match self {
      KernelVariant::Reference => 128,
      KernelVariant::FlippedDelta | KernelVariant::AddedDamping => 64,
    }
  }

  pub fn pin_rule(self) -> PinRule {
    PinRule::TopCorners
  }

  pub fn delta(self) -> DeltaConvention {
    match self {
      KernelVariant::FlippedDelta => DeltaConvention::NeighbourMinusSelf,
      KernelVariant::Reference | KernelVariant::AddedDamping => DeltaConvention::SelfMinusNeighbour,
    }
  }

  pub fn damping(self) -> DampingConvention {
    match self {
      KernelVariant::AddedDamping => DampingConvention::Add,
      KernelVariant::Reference | KernelVariant::FlippedDelta => DampingConvention::Subtract,
    }
  }
}

/// Immutable step configuration for one grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stepper {
  grid: Grid,
  springs: SpringSet,
  time_step: f32,
  gravity: f32,
  pin_rule: PinRule,
  delta: DeltaConvention,
  damping: DampingConvention,
  distance_floor: Option<f32>,
}

impl Stepper {
  pub fn new(desc: &ClothDesc, grid: Grid, variant: KernelVariant) -> Result<Self, ClothError> {
    desc.validate()?;
    Ok(Self {
      grid,
      springs: SpringSet::for_grid(desc, grid),
      time_step: desc.time_step,
      gravity: GRAVITY,
      pin_rule: variant.pin_rule(),
      delta: variant.delta(),
      damping: variant.damping(),
      distance_floor: None,
    })
  }

  #[must_use]
  pub fn with_gravity(mut self, gravity: f32) -> Self {
    self.gravity = gravity;
    self
  }

  #[must_use]
  pub fn with_pin_rule(mut self, pin_rule: PinRule) -> Self {
    self.pin_rule = pin_rule;
    self
  }

  /// Clamps pair distances to at least `floor`, so coincident particles stay finite.
  #[must_use]
  pub fn with_distance_floor(mut self, floor: Option<f32>) -> Self {
    self.distance_floor = floor.filter(|f| f.is_finite() && *f > 0.0);
    self
  }

  pub fn grid(&self) -> Grid {
    self.grid
  }

  pub fn springs(&self) -> &SpringSet {
    &self.springs
  }

  pub fn time_step(&self) -> f32 {
    self.time_step
  }

  pub fn gravity(&self) -> f32 {
    self.gravity
  }

  pub fn pin_rule(&self) -> PinRule {
    self.pin_rule
  }

  pub fn delta(&self) -> DeltaConvention {
    self.delta
  }

  pub fn damping(&self) -> DampingConvention {
    self.damping
  }

  pub fn distance_floor(&self) -> Option<f32> {
    self.distance_floor
  }

  /// Spring-damper force on the first particle from the second. Arguments are
  /// `(position, velocity)` pairs.
  pub fn pair_force(
    &self,
    spring: &SpringParams,
    (p_self, v_self): (Vector3<f32>, Vector3<f32>),
    (p_other, v_other): (Vector3<f32>, Vector3<f32>),
  ) -> Vector3<f32> {
    let sign = self.delta.sign();
    let dp = (p_self - p_other) * sign;
    let dv = (v_self - v_other) * sign;
    let mut len2 = dp.magnitude2();
    if let Some(floor) = self.distance_floor {
      len2 = len2.max(floor * floor);
    }
    let len = len2.sqrt();
    let spring_term = spring.stiffness * (spring.rest_length / len - 1.0);
    let damping_term = self.damping.sign() * spring.damping * dp.dot(dv) / len2;
    dp * (spring_term + damping_term)
  }

  /// Acceleration of cell `(x, y)` from springs and gravity. Pinned cells get none.
  pub fn acceleration(&self, read: &Snapshot, x: u32, y: u32) -> Vector3<f32> {
    let mut accel = Vector3::new(0.0, 0.0, 0.0);
    if self.pin_rule.is_pinned(self.grid, x, y) {
      return accel;
    }
    let i = self.grid.index(x, y);
    let me = (xyz(read.positions[i]), xyz(read.velocities[i]));
    for (spring, offsets) in self.springs.classes() {
      for &(dx, dy) in offsets {
        if let Some(j) = self.grid.offset(x, y, dx, dy) {
          let other = (xyz(read.positions[j]), xyz(read.velocities[j]));
          accel += self.pair_force(spring, me, other);
        }
      }
    }
    accel.y -= self.gravity;
    accel
  }

  /// One full step from `read` into `write`, then normals from `write`.
  pub fn advance(&self, read: &Snapshot, write: &mut Snapshot, normals: &mut [[f32; 4]]) {
    debug_assert_eq!(read.len(), self.grid.len());
    debug_assert_eq!(write.len(), self.grid.len());
    let dt = self.time_step;
    let grid = self.grid;

    write
      .positions
      .par_iter_mut()
      .zip(write.velocities.par_iter_mut())
      .enumerate()
      .for_each(|(i, (position, velocity))| {
        let (x, y) = grid.coords(i);
        let accel = self.acceleration(read, x, y);
        let v = xyz(read.velocities[i]) + accel * dt;
        let p = xyz(read.positions[i]) + v * dt;
        *velocity = direction(v);
        *position = point(p);
      });

    self.reconstruct_normals(&write.positions, normals);
  }

  pub fn reconstruct_normals(&self, positions: &[[f32; 4]], normals: &mut [[f32; 4]]) {
    let grid = self.grid;
    normals.par_iter_mut().enumerate().for_each(|(i, normal)| {
      let (x, y) = grid.coords(i);
      *normal = self.normal_at(positions, x, y);
    });
  }

  /// Sum of the face normals of the (up to four) triangles around a cell, normalised.
  pub fn normal_at(&self, positions: &[[f32; 4]], x: u32, y: u32) -> [f32; 4] {
    let grid = self.grid;
    let centre = xyz(positions[grid.index(x, y)]);
    let edge = |dx, dy| grid.offset(x, y, dx, dy).map(|j| xyz(positions[j]) - centre);
    let right = edge(1, 0);
    let up = edge(0, -1);
    let left = edge(-1, 0);
    let down = edge(0, 1);

    let mut sum = Vector3::new(0.0, 0.0, 0.0);
    for (a, b) in [(down, right), (right, up), (up, left), (left, down)] {
      if let (Some(a), Some(b)) = (a, b) {
        sum += a.cross(b);
      }
    }
    let len = sum.magnitude();
    if len.is_finite() && len > f32::EPSILON {
      direction(sum / len)
    } else {
      FALLBACK_NORMAL
    }
  }
}
