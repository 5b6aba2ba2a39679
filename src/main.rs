mod capture;
mod config;
mod error;
mod format;
mod net;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use capture::{BlockPos, CaptureSession, FillMode, FillOptions, SetMode, SetOptions};
use config::Config;
use format::CaptureReport;
use net::Connection;

/// Output format for the capture report
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output (default)
    #[default]
    Pretty,
    /// Machine-readable JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "scribemc")]
#[command(about = "Build on a Minecraft server and save the result as a structure template", long_about = None)]
struct Args {
    /// Server address (e.g., localhost:25565)
    #[arg(short, long)]
    server: Option<String>,

    /// Bot username
    #[arg(short, long)]
    username: Option<String>,

    /// Game version announced during login
    #[arg(long)]
    game_version: Option<String>,

    /// Delay in milliseconds between commands (default: 250)
    #[arg(short = 'd', long = "command-delay")]
    command_delay: Option<u64>,

    /// Name to save the structure under (default: derived from current time)
    #[arg(short, long)]
    name: Option<String>,

    /// Build origin; defaults to the block under the bot's spawn position
    #[arg(long, num_args = 3, allow_negative_numbers = true, value_names = ["X", "Y", "Z"])]
    origin: Option<Vec<i32>>,

    /// Demo shell size
    #[arg(long, num_args = 3, default_values_t = [5, 4, 5], value_names = ["W", "H", "D"])]
    size: Vec<i32>,

    /// Block type for the demo shell
    #[arg(short, long, default_value = "oak_planks")]
    block: String,

    /// Show the command plan without connecting to the server
    #[arg(long)]
    dry_run: bool,

    /// Output format for the capture report
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Verbose output: print every dispatched command
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: suppress status output
    #[arg(short, long)]
    quiet: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

/// One operation handed to the capture pipeline by the build driver
enum BuildOp {
    Fill {
        corner1: [f64; 3],
        corner2: [f64; 3],
        block: String,
        options: FillOptions,
    },
    Place {
        pos: [f64; 3],
        block: String,
        options: SetOptions,
    },
}

/// A hollow rectangular shell with a doorway: the smallest build that
/// exercises both capture operations
fn shell_ops(origin: BlockPos, size: [i32; 3], block: &str) -> Vec<BuildOp> {
    let far = origin.offset(size[0] - 1, size[1] - 1, size[2] - 1);
    let mut ops = vec![BuildOp::Fill {
        corner1: [origin.x as f64, origin.y as f64, origin.z as f64],
        corner2: [far.x as f64, far.y as f64, far.z as f64],
        block: block.to_string(),
        options: FillOptions {
            mode: Some(FillMode::Hollow),
            ..Default::default()
        },
    }];

    if size[0] >= 3 && size[1] >= 3 {
        let door = origin.offset(size[0] / 2, 1, 0);
        ops.push(BuildOp::Place {
            pos: [door.x as f64, door.y as f64, door.z as f64],
            block: "air".to_string(),
            options: SetOptions {
                mode: Some(SetMode::Replace),
                ..Default::default()
            },
        });
    }

    ops
}

/// Render an operation as the command it would dispatch
fn op_command(op: &BuildOp) -> error::Result<String> {
    match op {
        BuildOp::Fill {
            corner1,
            corner2,
            block,
            options,
        } => {
            let c1 = BlockPos::floored(corner1[0], corner1[1], corner1[2])?;
            let c2 = BlockPos::floored(corner2[0], corner2[1], corner2[2])?;
            Ok(capture::fill_command(c1, c2, block, options))
        }
        BuildOp::Place {
            pos,
            block,
            options,
        } => {
            let pos = BlockPos::floored(pos[0], pos[1], pos[2])?;
            Ok(capture::set_block_command(pos, block, options))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(
            shell,
            &mut Args::command(),
            "scribemc",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    if args.size.iter().any(|&v| v < 1) {
        eprintln!("{} --size values must be positive", "Error:".red().bold());
        std::process::exit(1);
    }
    let size = [args.size[0], args.size[1], args.size[2]];

    let config = Config::resolve(
        args.server.as_deref(),
        args.username.clone(),
        args.game_version.clone(),
        args.command_delay,
        args.name.clone(),
    );

    if args.dry_run {
        let origin = args
            .origin
            .as_ref()
            .map(|o| BlockPos::new(o[0], o[1], o[2]))
            .unwrap_or(BlockPos::new(0, 0, 0));
        let ops = shell_ops(origin, size, &args.block);
        println!(
            "{} commands for a {}x{}x{} shell at {}, saved as {}:",
            ops.len(),
            size[0],
            size[1],
            size[2],
            origin,
            capture::namespaced(&config.structure_name)
        );
        for op in &ops {
            println!("  {}", op_command(op)?);
        }
        return Ok(());
    }

    let quiet = args.quiet || !matches!(args.format, OutputFormat::Pretty);

    if !quiet {
        println!(
            "{} Connecting to {}:{}...",
            "→".blue(),
            config.host,
            config.port
        );
    }
    let connection = Arc::new(Connection::connect(&config).await?);
    let spawn = connection.wait_for_spawn().await?;
    if !quiet {
        println!("{} Connected as {}", "✓".green(), config.username);
    }

    let start_time = Instant::now();
    let mut session = CaptureSession::new(
        connection.clone(),
        config.command_delay,
        config.username.clone(),
    );
    session.set_verbose(args.verbose);

    // Build on the layer below the bot's feet, like a player would
    let origin = match args.origin {
        Some(o) => BlockPos::new(o[0], o[1], o[2]),
        None => BlockPos::floored(spawn[0], spawn[1] - 1.0, spawn[2])?,
    };

    if !quiet {
        println!(
            "{} Building a {}x{}x{} shell at {}...",
            "→".blue(),
            size[0],
            size[1],
            size[2],
            origin
        );
    }
    for op in shell_ops(origin, size, &args.block) {
        match op {
            BuildOp::Fill {
                corner1,
                corner2,
                block,
                options,
            } => session.fill(corner1, corner2, &block, &options).await?,
            BuildOp::Place {
                pos,
                block,
                options,
            } => session.set_block(pos, &block, &options).await?,
        }
    }

    if !quiet && let Some(dims) = session.dimensions() {
        println!(
            "{} Capturing {}x{}x{} region as {}...",
            "→".blue(),
            dims.width,
            dims.height,
            dims.depth,
            config.structure_name.cyan()
        );
    }
    let request = session.persist(&config.structure_name).await?;

    let bounds = session
        .bounding_box()
        .context("bounds missing after a successful capture")?;
    let report = CaptureReport {
        request,
        bounds,
        commands_sent: session.commands_sent(),
        elapsed: start_time.elapsed(),
    };

    match args.format {
        OutputFormat::Pretty => format::print_pretty(&report),
        OutputFormat::Json => format::print_json(&report),
    }

    Ok(())
}
