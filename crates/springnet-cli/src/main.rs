#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use springnet_core::Network;
use springnet_scheduler::{Axis, ElongationAreaY, QuasiStaticProtocol, Shear};
use springnet_trace::{BinV2DumpSink, CsvTimeSeriesSink};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "springnet",
    about = "2D periodic sheared-box spring-network rupture simulator",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the quasi-static strain protocol against a TOML configuration.
    Run {
        /// Path to the run configuration (TOML)
        #[arg(long)]
        config: PathBuf,
    },

    /// Generate a synthetic triangular-lattice network and save it as BinV2.
    Generate {
        /// Lattice width, in unit cells
        #[arg(long, default_value_t = 20)]
        nx: usize,

        /// Lattice height, in unit cells
        #[arg(long, default_value_t = 20)]
        ny: usize,

        /// Unit cell width
        #[arg(long, default_value_t = 1.0)]
        cell_w: f64,

        /// Unit cell height
        #[arg(long, default_value_t = 0.866_025_403_784_438_6)]
        cell_h: f64,

        /// Fraction of bonds tagged sacrificial (breakable) rather than matrix
        #[arg(long, default_value_t = 0.3)]
        dilution: f64,

        /// RNG seed, for reproducible lattices
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output BinV2 path
        #[arg(long, default_value = "network.bin")]
        out: PathBuf,
    },

    /// Print summary statistics for a BinV2 network file.
    Inspect {
        /// Path to the BinV2 network file
        network: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run { config } => run(config),
        Cmd::Generate {
            nx,
            ny,
            cell_w,
            cell_h,
            dilution,
            seed,
            out,
        } => generate(nx, ny, cell_w, cell_h, dilution, seed, out),
        Cmd::Inspect { network } => inspect(network),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Ensure the parent directory for a file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn load_network(path: &Path) -> Result<Network> {
    let file =
        File::open(path).with_context(|| format!("opening network file {}", path.display()))?;
    springnet_trace::binv2::load(file)
        .with_context(|| format!("loading BinV2 network from {}", path.display()))
}

fn run(config_path: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading config file {}", config_path.display()))?;
    let cfg: Config = toml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", config_path.display()))?;

    info!(input = %cfg.network.input.display(), "loading network");
    let mut net = load_network(&cfg.network.input)?;

    ensure_parent_dir(&cfg.output.time_series_csv)?;
    ensure_parent_dir(&cfg.output.bond_events_csv)?;
    let mut ts_sink = CsvTimeSeriesSink::create(&cfg.output.time_series_csv)
        .with_context(|| format!("opening {}", cfg.output.time_series_csv.display()))?;
    let mut bond_sink = CsvTimeSeriesSink::create(&cfg.output.bond_events_csv)
        .with_context(|| format!("opening {}", cfg.output.bond_events_csv.display()))?;
    let mut dump_sink = cfg.output.dump_dir.as_ref().map(BinV2DumpSink::new);

    let quasi_config = cfg.protocol.to_quasistatic_config();
    let save_points = cfg.save_points.clone().into();

    info!(max_strain = quasi_config.max_strain, axis = ?cfg.protocol.axis, "starting quasi-static run");

    let result = match cfg.protocol.axis {
        config::DeformAxisKind::Shear => {
            let mut protocol = QuasiStaticProtocol::new(Axis::Shear(Shear), quasi_config, save_points);
            protocol.run(
                &mut net,
                &mut ts_sink,
                &mut bond_sink,
                dump_sink.as_mut().map(|s| s as &mut dyn springnet_core::NetworkDumpSink),
            )
        }
        config::DeformAxisKind::Elongation => {
            let mut protocol = QuasiStaticProtocol::new(
                Axis::ElongationAreaY(ElongationAreaY),
                quasi_config,
                save_points,
            );
            protocol.run(
                &mut net,
                &mut ts_sink,
                &mut bond_sink,
                dump_sink.as_mut().map(|s| s as &mut dyn springnet_core::NetworkDumpSink),
            )
        }
    };

    match result {
        Ok(()) => {
            info!("run reached max strain with nothing left to break");
            Ok(())
        }
        Err(springnet_core::Error::Protocol(
            springnet_core::ProtocolError::MaxStrainReached,
        )) => {
            info!("run reached max strain");
            Ok(())
        }
        Err(e) => Err(e).context("quasi-static run failed"),
    }
}

fn generate(
    nx: usize,
    ny: usize,
    cell_w: f64,
    cell_h: f64,
    dilution: f64,
    seed: u64,
    out: PathBuf,
) -> Result<()> {
    info!(nx, ny, cell_w, cell_h, dilution, seed, "generating triangular lattice");
    let net = springnet_trace::generate_triangular_lattice(nx, ny, cell_w, cell_h, dilution, seed);

    ensure_parent_dir(&out)?;
    let file = File::create(&out).with_context(|| format!("creating {}", out.display()))?;
    springnet_trace::binv2::save(&net, BufWriter::new(file))
        .with_context(|| format!("writing network to {}", out.display()))?;

    println!(
        "Generated {}x{} lattice: {} nodes, {} bonds -> {}",
        nx,
        ny,
        net.nodes().len(),
        net.bonds().len(),
        out.display()
    );
    Ok(())
}

fn inspect(network: PathBuf) -> Result<()> {
    let net = load_network(&network)?;
    let connected = net.bonds().count_connected();
    println!("network:        {}", network.display());
    println!("nodes:          {}", net.nodes().len());
    println!("bonds:          {} ({} connected)", net.bonds().len(), connected);
    println!("box:            Lx={:.6} Ly={:.6} xy={:.6}", net.box2().lx(), net.box2().ly(), net.box2().xy());
    println!("shear strain:   {:.6e}", net.shear_strain());
    Ok(())
}
