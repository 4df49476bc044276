pub mod camera;
pub mod cloth;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod initialize;
pub mod render;
pub mod scene;
pub mod state;
pub mod stepper;

use cloth::{ClothState, Grid};
use error::ClothError;
use initialize::ClothPreset;
use stepper::{KernelVariant, Stepper};

/// Stiffness and damping of one spring class. Rest length is derived from the grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Spring {
  pub stiffness: f32,
  pub damping: f32,
}

impl Spring {
  fn is_valid(&self) -> bool {
    self.stiffness.is_finite()
      && self.damping.is_finite()
      && self.stiffness >= 0.0
      && self.damping >= 0.0
  }
}

/// Construction-time configuration of a cloth simulation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClothDesc {
  pub neighbour: Spring,
  pub diagonal: Spring,
  pub bending: Spring,
  pub time_step: f32,
}

impl Default for ClothDesc {
  fn default() -> Self {
    Self {
      neighbour: Spring {
        stiffness: 100000.0,
        damping: 30.0,
      },
      diagonal: Spring {
        stiffness: 100000.0,
        damping: 30.0,
      },
      bending: Spring {
        stiffness: 400000.0,
        damping: 20.0,
      },
      time_step: 0.001,
    }
  }
}

impl ClothDesc {
  pub fn validate(&self) -> Result<(), ClothError> {
    if !(self.time_step.is_finite() && self.time_step > 0.0) {
      return Err(ClothError::InvalidTimeStep(self.time_step));
    }
    for (name, spring) in [
      ("neighbour", &self.neighbour),
      ("diagonal", &self.diagonal),
      ("bending", &self.bending),
    ] {
      if !spring.is_valid() {
        return Err(ClothError::InvalidSpring(name));
      }
    }
    Ok(())
  }
}

pub struct CameraParams {
  pub speed: f32,
  pub rotational_speed: f32,
}

impl Default for CameraParams {
  fn default() -> Self {
    Self {
      speed: 0.05,
      rotational_speed: 0.02,
    }
  }
}

/// Where the kernel runs in windowed mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
  #[default]
  Gpu,
  Cpu,
}

/// Everything needed to build and drive one cloth, gathered from the command line.
#[derive(Clone, Debug)]
pub struct RunOptions {
  pub variant: KernelVariant,
  pub resolution: Option<u32>,
  pub preset: ClothPreset,
  pub backend: Backend,
  pub desc: ClothDesc,
  pub distance_floor: Option<f32>,
  pub steps: Option<u64>,
  pub report_every: u64,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      variant: KernelVariant::Reference,
      resolution: None,
      preset: ClothPreset::Drape,
      backend: Backend::Gpu,
      desc: ClothDesc::default(),
      distance_floor: None,
      steps: None,
      report_every: 100,
    }
  }
}

impl RunOptions {
  pub fn grid(&self) -> Result<Grid, ClothError> {
    let size = self.resolution.unwrap_or_else(|| self.variant.grid_size());
    Grid::new(size, size)
  }

  /// Builds the seeded state and its stepper, with normals ready for the first frame.
  pub fn build_simulation(&self) -> Result<(ClothState, Stepper), ClothError> {
    let grid = self.grid()?;
    let stepper =
      Stepper::new(&self.desc, grid, self.variant)?.with_distance_floor(self.distance_floor);
    let mut state = ClothState::new(grid, &self.preset.corners())?;
    state.refresh_normals(&stepper);
    log::info!(
      "cloth {}x{} ({:?}, {:?} preset, dt = {})",
      grid.width(),
      grid.height(),
      self.variant,
      self.preset,
      self.desc.time_step
    );
    Ok((state, stepper))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_desc_is_valid() {
    assert_eq!(ClothDesc::default().validate(), Ok(()));
  }

  #[test]
  fn rejects_bad_time_step() {
    let desc = ClothDesc {
      time_step: 0.0,
      ..ClothDesc::default()
    };
    assert_eq!(desc.validate(), Err(ClothError::InvalidTimeStep(0.0)));
  }

  #[test]
  fn rejects_negative_damping() {
    let mut desc = ClothDesc::default();
    desc.bending.damping = -1.0;
    assert_eq!(desc.validate(), Err(ClothError::InvalidSpring("bending")));
  }

  #[test]
  fn resolution_overrides_variant_size() {
    let options = RunOptions {
      resolution: Some(16),
      ..RunOptions::default()
    };
    let grid = options.grid().unwrap();
    assert_eq!((grid.width(), grid.height()), (16, 16));
    assert_eq!(RunOptions::default().grid().unwrap().width(), 128);
  }
}
