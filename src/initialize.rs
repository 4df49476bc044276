use crate::cloth::{point, Grid, Snapshot};
use crate::error::ClothError;
use cgmath::Vector3;
use std::f32::consts::SQRT_2;

/// World positions of the four lattice corners, `(0, 0)`, `(W-1, 0)`, `(0, H-1)`, `(W-1, H-1)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Corners {
  pub top_left: Vector3<f32>,
  pub top_right: Vector3<f32>,
  pub bottom_left: Vector3<f32>,
  pub bottom_right: Vector3<f32>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ClothPreset {
  /// Square in the z = 0 plane
  Flat,
  /// Leans back from the top edge, so it folds forward over it once released
  #[default]
  Drape,
}

impl ClothPreset {
  #[must_use]
  pub fn corners(self) -> Corners {
    match self {
      ClothPreset::Flat => Corners {
        top_left: Vector3::new(-1.0, 1.0, 0.0),
        top_right: Vector3::new(1.0, 1.0, 0.0),
        bottom_left: Vector3::new(-1.0, -1.0, 0.0),
        bottom_right: Vector3::new(1.0, -1.0, 0.0),
      },
      ClothPreset::Drape => Corners {
        top_left: Vector3::new(-1.0, 1.0, 0.0),
        top_right: Vector3::new(1.0, 1.0, 0.0),
        bottom_left: Vector3::new(-1.0, SQRT_2 - 1.0, SQRT_2),
        bottom_right: Vector3::new(1.0, SQRT_2 - 1.0, SQRT_2),
      },
    }
  }
}

#[must_use]
pub fn bilinear(corners: &Corners, u: f32, v: f32) -> Vector3<f32> {
  let top = corners.top_left + (corners.top_right - corners.top_left) * u;
  let bottom = corners.bottom_left + (corners.bottom_right - corners.bottom_left) * u;
  top + (bottom - top) * v
}

/// Positions interpolated between the corners, velocities at rest.
pub fn seed_snapshot(grid: Grid, corners: &Corners) -> Result<Snapshot, ClothError> {
  let mut snapshot = Snapshot::zeroed(grid.len())?;
  let du = 1.0 / (grid.width() - 1) as f32;
  // single-row lattices sit on the top edge
  let dv = if grid.height() > 1 {
    1.0 / (grid.height() - 1) as f32
  } else {
    0.0
  };
  for (i, position) in snapshot.positions.iter_mut().enumerate() {
    let (x, y) = grid.coords(i);
    *position = point(bilinear(corners, x as f32 * du, y as f32 * dv));
  }
  Ok(snapshot)
}

/// Two triangles per lattice quad; expands the point lattice into a surface.
#[must_use]
pub fn triangle_indices(grid: Grid) -> Vec<u32> {
  let w = grid.width();
  let h = grid.height();
  let quads = (w as usize - 1) * (h as usize).saturating_sub(1);
  let mut indices = Vec::with_capacity(quads * 6);
  for y in 0..h.saturating_sub(1) {
    for x in 0..w - 1 {
      let top_left = y * w + x;
      let top_right = top_left + 1;
      let bottom_left = top_left + w;
      let bottom_right = bottom_left + 1;
      indices.extend_from_slice(&[
        top_left,
        bottom_left,
        top_right,
        top_right,
        bottom_left,
        bottom_right,
      ]);
    }
  }
  indices
}
