use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use avatar_inversion::config::{CliArgs, PipelineConfig};
use avatar_inversion::pipeline::Pipeline;

/// `RUST_LOG` wins over `-v` when set.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "avatar_inversion=debug"
    } else {
        "avatar_inversion=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let config = PipelineConfig::from(args);
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .with_context(|| format!("cannot start {threads} worker threads"))?;
    }

    let result = Pipeline::run(&config)
        .with_context(|| format!("inversion into {} failed", config.output.display()))?;
    if result.failed > 0 {
        warn!(failed = result.failed, "Some subjects were skipped");
    }
    println!("{result}");
    Ok(())
}
