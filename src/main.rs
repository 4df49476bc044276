use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use cloth_sim::initialize::ClothPreset;
use cloth_sim::stepper::KernelVariant;
use cloth_sim::{Backend, ClothDesc, RunOptions};
use std::io;

/// Mass-spring cloth simulation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Kernel variant to run
  #[arg(long, value_enum, default_value_t = KernelVariant::Reference)]
  variant: KernelVariant,
  /// Cells per side, overriding the variant's grid size
  #[arg(short, long)]
  resolution: Option<u32>,
  /// Initial cloth shape
  #[arg(long, value_enum, default_value_t = ClothPreset::Drape)]
  preset: ClothPreset,
  /// Where the kernel runs when a window is open
  #[arg(long, value_enum, default_value_t = Backend::Gpu)]
  backend: Backend,
  /// Integration time step in seconds
  #[arg(long)]
  time_step: Option<f32>,
  /// Smallest particle separation used in spring forces
  #[arg(long)]
  distance_floor: Option<f32>,
  /// Run in headless mode (no window)
  #[arg(long, default_value_t = false)]
  headless: bool,
  /// Stop after this many steps (headless only)
  #[arg(long)]
  steps: Option<u64>,
  /// Log cloth stats every N steps in headless mode, 0 to disable
  #[arg(long, default_value_t = 100)]
  report_every: u64,
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Generate shell completion scripts
  Completions {
    /// The shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
  },
}

impl Args {
  fn options(&self) -> RunOptions {
    let mut desc = ClothDesc::default();
    if let Some(time_step) = self.time_step {
      desc.time_step = time_step;
    }
    RunOptions {
      variant: self.variant,
      resolution: self.resolution,
      preset: self.preset,
      backend: self.backend,
      desc,
      distance_floor: self.distance_floor,
      steps: self.steps,
      report_every: self.report_every,
    }
  }
}

fn main() {
  let args = Args::parse();

  if let Some(Commands::Completions { shell }) = args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    return;
  }

  env_logger::init();
  let options = args.options();
  let result = if args.headless {
    cloth_sim::headless::run(&options).map(|_| ())
  } else {
    cloth_sim::state::run(options)
  };
  if let Err(e) = result {
    log::error!("{e}");
    std::process::exit(1);
  }
}
