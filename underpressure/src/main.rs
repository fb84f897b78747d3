mod app;
mod input;
mod render;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "underpressure")]
#[command(about = "Drag a block into a tank and watch buoyancy and pressure change", long_about = None)]
pub(crate) struct Args {
    /// FPS cap. Overrides the saved setting.
    #[arg(long)]
    fps: Option<u32>,

    /// Fluid key: water, oil, honey, mercury, gasoline
    #[arg(long)]
    fluid: Option<String>,

    /// Object key: cube, ball, brick, wood, anchor
    #[arg(long)]
    object: Option<String>,

    /// Scene units of surface rise per metre of real rise
    #[arg(long)]
    amplification: Option<f64>,

    /// Screen to start on
    #[arg(long, value_enum, default_value_t = app::Screen::Tank)]
    screen: app::Screen,

    /// Hide the readout panel
    #[arg(long, default_value_t = false)]
    no_hud: bool,

    /// Monochrome output
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// Write logs here (RUST_LOG filters, default info). Without it logging is off.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Don't write settings on exit
    #[arg(long, default_value_t = false)]
    no_save: bool,
}

fn init_logging(path: Option<&PathBuf>) -> Result<()> {
    // stderr would scribble over the alternate screen
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;
    app::run(&args)
}
