use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use dgc_core::{Driver, RunConfig, SingleProcess};

#[derive(Parser)]
#[command(
    name = "dgc",
    about = "Density-guided lossy compressor for N-body particle snapshots",
    version
)]
struct Cli {
    /// JSON run descriptor (input/output paths, density chunks, bins)
    config: PathBuf,

    /// Lossy kernel applied per bucket: bitround | passthrough
    #[arg(long, default_value = "bitround")]
    lossy: String,

    /// Lossless kernel chained after the lossy stage, for size accounting
    /// only: zstd | lz4
    #[arg(long)]
    chain: Option<String>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    // The config is validated before any data I/O.
    let config = RunConfig::from_file(&cli.config)
        .with_context(|| format!("loading run descriptor '{}'", cli.config.display()))?;

    let mut lossy = dgc_codecs::create(&cli.lossy)
        .with_context(|| format!("selecting lossy kernel '{}'", cli.lossy))?;
    let mut chain = cli
        .chain
        .as_deref()
        .map(dgc_codecs::create)
        .transpose()
        .context("selecting chained lossless kernel")?;

    let comm = SingleProcess;
    let started = Instant::now();

    let mut driver = Driver::new(config, &comm).context("validating run")?;
    if let Some(c) = &mut chain {
        driver
            .run(lossy.as_mut(), Some(&mut **c))
            .context("compression pipeline")?;
    } else {
        driver
            .run(lossy.as_mut(), None)
            .context("compression pipeline")?;
    }

    info!(
        particles = driver.local_particles(),
        elapsed = %format!("{:.2?}", started.elapsed()),
        "run complete"
    );
    Ok(())
}
