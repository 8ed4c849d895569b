use std::io::{self, BufRead};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser};

use fieldnav::field::ScalarField;
use fieldnav::filter::{Localizer, NullSink, StepOutcome};
use fieldnav::sim::{CommandRecord, CycleRecord, run_script};
use fieldnav::{Command, FilterConfig, Pose};

const LONG_ABOUT: &str = "FIELDNAV: Monte Carlo Localization over a known scalar field.

This program tracks the 2-D pose (position and heading) of an agent moving over a known scalar field using only discrete motion commands and noisy scalar sensor readings - no direct position observation. A particle population represents the pose belief; each translation command triggers a sense-weigh-resample-diffuse correction cycle.

The field is a headerless numeric CSV grid (rows are y, columns are x). Commands come either from a CSV script with an `action` column (forward/backward/left/right/halt) or interactively from stdin, where the first character of each line is mapped like the classic keyboard controls: w=forward, s=backward, a=left, d=right, anything else halts.

Per-cycle results (true pose, estimate, whether a correction ran) can be written to an output CSV for analysis.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about, long_about = LONG_ABOUT)]
struct Cli {
    /// Scalar field CSV file path (headerless numeric grid)
    #[arg(short, long, value_parser)]
    field: PathBuf,
    /// Command script CSV path; omit for an interactive stdin session
    #[arg(short, long)]
    commands: Option<PathBuf>,
    /// Output CSV path for per-cycle records
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Path to a filter config file (json|yaml|yml|toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// RNG seed (applies to all stochastic components)
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Filter parameter overrides
    #[command(flatten)]
    filter: FilterArgs,
    /// Initial true pose (defaults to W/4, H/4, heading 0)
    #[command(flatten)]
    start: StartArgs,
}

#[derive(Args, Clone, Debug)]
struct FilterArgs {
    /// Particle population size
    #[arg(long)]
    particles: Option<usize>,
    /// Translation distance per forward/backward command
    #[arg(long)]
    step: Option<f64>,
    /// Rotation per turn command, degrees
    #[arg(long)]
    turn_deg: Option<f64>,
    /// Standard deviation of true-pose translation noise
    #[arg(long)]
    sigma_step: Option<f64>,
    /// Standard deviation of true-pose rotation noise, degrees
    #[arg(long)]
    sigma_turn_deg: Option<f64>,
    /// Standard deviation of the scalar sensor noise
    #[arg(long)]
    sigma_sensor: Option<f64>,
    /// Standard deviation of post-resample positional diffusion
    #[arg(long)]
    sigma_pos: Option<f64>,
    /// Weight sharpening exponent
    #[arg(long)]
    weight_exponent: Option<i32>,
}

#[derive(Args, Clone, Debug)]
struct StartArgs {
    /// Initial true x position
    #[arg(long)]
    initial_x: Option<f64>,
    /// Initial true y position
    #[arg(long)]
    initial_y: Option<f64>,
    /// Initial true heading, radians
    #[arg(long, default_value_t = 0.0)]
    initial_theta: f64,
}

fn build_config(cli: &Cli) -> Result<FilterConfig> {
    let mut config = match &cli.config {
        Some(path) => FilterConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => FilterConfig::default(),
    };
    let args = &cli.filter;
    if let Some(n) = args.particles {
        config.num_particles = n;
    }
    if let Some(step) = args.step {
        config.step = step;
    }
    if let Some(turn_deg) = args.turn_deg {
        config.turn = turn_deg.to_radians();
    }
    if let Some(sigma_step) = args.sigma_step {
        config.sigma_step = sigma_step;
    }
    if let Some(sigma_turn_deg) = args.sigma_turn_deg {
        config.sigma_turn = sigma_turn_deg.to_radians();
    }
    if let Some(sigma_sensor) = args.sigma_sensor {
        config.sigma_sensor = sigma_sensor;
    }
    if let Some(sigma_pos) = args.sigma_pos {
        config.sigma_pos = sigma_pos;
    }
    if let Some(exponent) = args.weight_exponent {
        config.weight_exponent = exponent;
    }
    Ok(config)
}

/// Interactive session: one command per stdin line, blocking, until halt.
fn run_interactive(localizer: &mut Localizer) -> Result<Vec<CycleRecord>> {
    let config = localizer.config().clone();
    let mut records = Vec::new();
    let stdin = io::stdin();
    println!("Controls: w=forward, s=backward, a=left, d=right, anything else halts.");
    for line in stdin.lock().lines() {
        let line = line?;
        let key = line.chars().next().unwrap_or(' ');
        let command = Command::from_key(key, config.step, config.turn);
        match localizer.step(command, &mut NullSink)? {
            StepOutcome::Halted => break,
            StepOutcome::Cycle(report) => {
                let truth = localizer.true_pose();
                println!("Estimated Robot Position (Best Guess):");
                println!("X: {}", report.estimate.0);
                println!("Y: {}", report.estimate.1);
                records.push(CycleRecord {
                    cycle: localizer.cycle_count(),
                    true_x: truth.x,
                    true_y: truth.y,
                    true_theta: truth.theta,
                    est_x: report.estimate.0,
                    est_y: report.estimate.1,
                    corrected: report.corrected,
                });
            }
        }
    }
    Ok(records)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.field.exists() {
        bail!("Field file '{}' does not exist.", cli.field.display());
    }
    if !cli.field.is_file() {
        bail!("Field path '{}' is not a file.", cli.field.display());
    }
    if let Some(parent) = cli.output.as_ref().and_then(|p| p.parent()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let field = ScalarField::from_csv(&cli.field)
        .with_context(|| format!("Failed to load field {}", cli.field.display()))?;
    let (width, height) = field.dimensions();
    println!("Loaded {width} x {height} scalar field from {}", cli.field.display());

    let config = build_config(&cli)?;
    let initial_pose = Pose::new(
        cli.start.initial_x.unwrap_or(width as f64 / 4.0),
        cli.start.initial_y.unwrap_or(height as f64 / 4.0),
        cli.start.initial_theta,
    );
    println!(
        "Initialized filter with {} particles, true pose {initial_pose}, seed {}",
        config.num_particles, cli.seed
    );

    let mut localizer = Localizer::new_with_seed(Rc::new(field), config.clone(), initial_pose, cli.seed);

    let records = match &cli.commands {
        Some(script) => {
            let command_records = CommandRecord::from_csv(script)
                .with_context(|| format!("Failed to read command script {}", script.display()))?;
            let commands: Vec<Command> = command_records
                .iter()
                .map(|r| r.to_command(&config))
                .collect::<Result<_, _>>()?;
            println!("Running {} scripted commands", commands.len());
            let records = run_script(&mut localizer, &commands, &mut NullSink)?;
            for record in &records {
                println!(
                    "cycle {:4}: estimate ({:.3}, {:.3}), truth ({:.3}, {:.3}){}",
                    record.cycle,
                    record.est_x,
                    record.est_y,
                    record.true_x,
                    record.true_y,
                    if record.corrected { "" } else { " [no correction]" },
                );
            }
            records
        }
        None => run_interactive(&mut localizer)?,
    };

    println!(
        "Processed {} cycles ({} corrections)",
        localizer.cycle_count(),
        localizer.correction_count()
    );

    if let Some(output) = &cli.output {
        CycleRecord::to_csv(&records, output)
            .with_context(|| format!("Failed to write records to {}", output.display()))?;
        println!("Results written to {}", output.display());
    }
    Ok(())
}
