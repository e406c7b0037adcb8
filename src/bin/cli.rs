// CLI binary: errors are reported and turned into an exit code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use formulabrot::engine::{spawn_worker, FormulaTarget, Frame, RenderEvent, RenderOutcome};
use formulabrot::error::AppError;
use formulabrot::formula::builtins::BUILTINS;
use formulabrot::formula::{compile, Program};
use formulabrot::model::load_palette;
use formulabrot::settings::{self, FractalSettings, JuliaConstant};

/// Events buffered between the render thread and the CLI.
const EVENT_CAPACITY: usize = 256;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "formulabrot-cli", about = "Formula-driven escape-time fractal renderer", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a fractal to a PNG file
    Render {
        /// Settings file (JSON); defaults to the standard Mandelbrot preset
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Iteration formula over complex z, c, i
        #[arg(long)]
        formula: Option<String>,
        /// Palette column formula
        #[arg(long)]
        palette_x: Option<String>,
        /// Palette row formula
        #[arg(long)]
        palette_y: Option<String>,
        #[arg(long)]
        iterations: Option<u32>,
        #[arg(long)]
        passes: Option<u32>,
        /// World units per pixel
        #[arg(long)]
        scale: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        center_x: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        center_y: Option<f64>,
        /// Julia constant as RE,IM
        #[arg(long, allow_hyphen_values = true, value_parser = parse_julia)]
        julia: Option<JuliaConstant>,
        /// Palette image (PNG or JPEG)
        #[arg(long)]
        palette: Option<PathBuf>,
        #[arg(long, default_value = "640")]
        width: u32,
        #[arg(long, default_value = "480")]
        height: u32,
        #[arg(long, short, default_value = "fractal.png")]
        out: PathBuf,
    },
    /// Compile a formula and print its bytecode
    Check {
        formula: String,
        #[arg(long, value_enum, default_value = "formula")]
        target: TargetArg,
    },
    /// List built-in functions
    Builtins,
    /// Print the standard preset as a settings file
    Preset,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Formula,
    PaletteX,
    PaletteY,
}

impl From<TargetArg> for FormulaTarget {
    fn from(t: TargetArg) -> Self {
        match t {
            TargetArg::Formula => FormulaTarget::Iteration,
            TargetArg::PaletteX => FormulaTarget::PaletteX,
            TargetArg::PaletteY => FormulaTarget::PaletteY,
        }
    }
}

fn parse_julia(s: &str) -> Result<JuliaConstant, String> {
    let (re, im) = s
        .split_once(',')
        .ok_or_else(|| format!("expected RE,IM, got '{s}'"))?;
    let re = re.trim().parse().map_err(|e| format!("real part: {e}"))?;
    let im = im.trim().parse().map_err(|e| format!("imaginary part: {e}"))?;
    Ok(JuliaConstant { re, im })
}

// ── Render ───────────────────────────────────────────────────────

struct RenderArgs {
    settings: FractalSettings,
    palette: Option<PathBuf>,
    width: u32,
    height: u32,
    out: PathBuf,
}

async fn run_render(args: RenderArgs) -> Result<RenderOutcome, AppError> {
    args.settings.validate()?;
    let (handle, mut events) = spawn_worker(EVENT_CAPACITY)?;
    args.settings.apply_to_worker(&handle)?;
    if let Some(path) = &args.palette {
        handle.set_palette(load_palette(path)?)?;
    }
    handle.render(args.settings.render_request(args.width, args.height))?;

    let total_lines = u64::from(args.height) * u64::from(args.settings.passes.max(1));
    let mut last_frame: Option<Frame> = None;
    let outcome = loop {
        let Some(event) = events.recv().await else {
            return Err(AppError::WorkerClosed);
        };
        match event {
            RenderEvent::ErrorMask(mask) if !mask.is_empty() => {
                tracing::error!(errors = ?mask, "formula errors block the render");
            }
            RenderEvent::ErrorMask(_) => {}
            RenderEvent::Progress(lines) => {
                tracing::info!("rendered {lines}/{total_lines} lines");
            }
            RenderEvent::Frame(frame) => {
                tracing::info!(pass = frame.pass, "pass complete");
                last_frame = Some(frame);
            }
            RenderEvent::Finished(outcome) => break outcome,
        }
    };

    if let Some(frame) = last_frame {
        save_frame(&frame, &args.out)?;
        tracing::info!(path = %args.out.display(), "wrote image");
    }
    drop(events);
    handle.shutdown()?;
    Ok(outcome)
}

fn save_frame(frame: &Frame, path: &Path) -> Result<(), AppError> {
    let image = frame
        .to_image()
        .ok_or_else(|| AppError::validation("frame size does not match its pixel buffer"))?;
    image.save(path)?;
    Ok(())
}

// ── Check ────────────────────────────────────────────────────────

fn run_check(formula: &str, target: FormulaTarget) -> Result<String, String> {
    let listing = match target {
        FormulaTarget::Iteration => compile::<num_complex::Complex64>(formula).map(|p| p.to_string()),
        FormulaTarget::PaletteX | FormulaTarget::PaletteY => {
            compile::<f64>(formula).map(|p: Program<f64>| p.to_string())
        }
    };
    listing.map_err(|e| e.format_with_source(formula))
}

// ── Entry point ──────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    formulabrot::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            settings: settings_path,
            formula,
            palette_x,
            palette_y,
            iterations,
            passes,
            scale,
            center_x,
            center_y,
            julia,
            palette,
            width,
            height,
            out,
        } => {
            let mut s = match settings_path {
                Some(path) => settings::load_settings(&path).unwrap_or_else(|e| {
                    eprintln!("Failed to load settings '{}': {e}", path.display());
                    process::exit(1);
                }),
                None => FractalSettings::default(),
            };
            if let Some(f) = formula {
                s.formula = f;
            }
            if let Some(f) = palette_x {
                s.palette_x = f;
            }
            if let Some(f) = palette_y {
                s.palette_y = f;
            }
            if let Some(n) = iterations {
                s.iterations = n;
            }
            if let Some(p) = passes {
                s.passes = p;
            }
            if let Some(v) = scale {
                s.scale = v;
            }
            if let Some(x) = center_x {
                s.center.0 = x;
            }
            if let Some(y) = center_y {
                s.center.1 = y;
            }
            if julia.is_some() {
                s.julia = julia;
            }

            let args = RenderArgs {
                settings: s,
                palette,
                width,
                height,
                out,
            };
            match run_render(args).await {
                Ok(RenderOutcome::Completed) => {}
                Ok(outcome) => {
                    eprintln!("Render did not complete: {outcome:?}");
                    process::exit(2);
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Check { formula, target } => match run_check(&formula, target.into()) {
            Ok(listing) => print!("{listing}"),
            Err(diagnostic) => {
                eprintln!("{diagnostic}");
                process::exit(1);
            }
        },
        Commands::Builtins => {
            for b in BUILTINS {
                let args = if b.arity == 2 { "a, b" } else { "x" };
                println!("{:<16} {}", format!("{}({args})", b.name), b.description);
            }
        }
        Commands::Preset => {
            println!(
                "{}",
                serde_json::to_string_pretty(&FractalSettings::default()).unwrap_or_default()
            );
        }
    }
}
