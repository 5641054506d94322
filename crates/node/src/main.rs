//! Rollup node binary

use clap::Parser;
use rollup_node::{RollupNode, RollupNodeArgs};

#[tokio::main]
async fn main() {
    init_tracing_subscriber();

    let args = RollupNodeArgs::parse();
    if let Err(err) = run(args).await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

async fn run(args: RollupNodeArgs) -> eyre::Result<()> {
    if !args.dev_args.dev {
        eyre::bail!("no parent chain client is available, run with --dev");
    }
    let (mut handle, _chain) = RollupNode::launch_dev(&args)?;

    let fatal = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!(target: "rollup::node", "received ctrl-c");
            None
        }
        fatal = handle.fatal_error() => fatal,
    };

    handle.shutdown().await;
    match fatal {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Initialize the tracing subscriber, reading the filter from `RUST_LOG` and defaulting to `info`.
fn init_tracing_subscriber() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
