use crate::cloth::{ClothState, ClothStats};
use crate::error::AppError;
use crate::stepper::Stepper;
use crate::RunOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Steps until `limit` is reached or `running` is cleared, logging stats every
/// `report_every` steps (0 disables reports). Returns the final stats.
pub fn simulate(
  state: &mut ClothState,
  stepper: &Stepper,
  limit: Option<u64>,
  report_every: u64,
  running: &AtomicBool,
) -> ClothStats {
  let mut warned = false;
  while running.load(Ordering::SeqCst) && limit.map_or(true, |n| state.steps() < n) {
    state.advance(stepper);
    if report_every == 0 || state.steps() % report_every != 0 {
      continue;
    }
    let stats = state.stats();
    log::info!(
      "step {}: y in [{:.4}, {:.4}], max speed {:.4}",
      state.steps(),
      stats.min[1],
      stats.max[1],
      stats.max_speed
    );
    if stats.non_finite > 0 && !warned {
      log::warn!(
        "{} non-finite components after step {}; the simulation has diverged",
        stats.non_finite,
        state.steps()
      );
      warned = true;
    }
  }
  state.stats()
}

/// Runs the CPU kernel without a window until `options.steps` or Ctrl-C.
pub fn run(options: &RunOptions) -> Result<ClothStats, AppError> {
  let (mut state, stepper) = options.build_simulation()?;
  let running = Arc::new(AtomicBool::new(true));
  {
    let running = running.clone();
    ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
  }

  let start = Instant::now();
  let stats = simulate(
    &mut state,
    &stepper,
    options.steps,
    options.report_every,
    &running,
  );
  let elapsed = start.elapsed().as_secs_f64();
  log::info!(
    "ran {} steps in {:.2}s ({:.1} steps/s)",
    state.steps(),
    elapsed,
    state.steps() as f64 / elapsed.max(f64::EPSILON)
  );
  Ok(stats)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::initialize::ClothPreset;
  use crate::stepper::KernelVariant;

  fn options() -> RunOptions {
    RunOptions {
      resolution: Some(8),
      preset: ClothPreset::Flat,
      ..RunOptions::default()
    }
  }

  #[test]
  fn stops_at_the_step_limit() {
    let (mut state, stepper) = options().build_simulation().unwrap();
    let mean_y = |state: &ClothState| {
      let positions = &state.read_snapshot().positions;
      positions.iter().map(|p| p[1]).sum::<f32>() / positions.len() as f32
    };
    let before = mean_y(&state);
    let running = AtomicBool::new(true);
    let stats = simulate(&mut state, &stepper, Some(25), 10, &running);
    assert_eq!(state.steps(), 25);
    assert_eq!(stats.non_finite, 0);
    assert!(mean_y(&state) < before);
  }

  #[test]
  fn cleared_flag_stops_immediately() {
    let (mut state, stepper) = options().build_simulation().unwrap();
    let running = AtomicBool::new(false);
    simulate(&mut state, &stepper, None, 1, &running);
    assert_eq!(state.steps(), 0);
  }

  #[test]
  fn reference_kernel_stays_finite_on_the_drape() {
    let options = RunOptions {
      resolution: Some(16),
      variant: KernelVariant::Reference,
      ..RunOptions::default()
    };
    let (mut state, stepper) = options.build_simulation().unwrap();
    let running = AtomicBool::new(true);
    let stats = simulate(&mut state, &stepper, Some(200), 0, &running);
    assert_eq!(stats.non_finite, 0);
  }
}
