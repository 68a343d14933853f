mod cli;

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use xarb::arbitrage::{Evaluator, VenueHandle};
use xarb::config::AppConfig;
use xarb::orderbook::OrderBook;
use xarb::venue::{binance_adapter, ftx_adapter, VenueId};
use xarb::watchdog::Supervisor;

fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let cli = cli::Cli::parse();

    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    // A single-threaded runtime plus an explicit `LocalSet`: every piece of
    // shared state in this crate is `Rc<RefCell<_>>`, not `Send`, so the
    // default multi-threaded runtime is the wrong tool here. Cooperative
    // scheduling on one thread is what makes "no locks anywhere" a property
    // the type system enforces rather than an operational claim.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run(config));
}

async fn run(config: AppConfig) {
    info!(pair = %config.pair, demo = config.demo, profit_size = %config.profit_size, "xarb starting");

    let cancel = setup_signal_handlers();

    let binance_book = Rc::new(RefCell::new(OrderBook::new()));
    let ftx_book = Rc::new(RefCell::new(OrderBook::new()));

    let evaluator = Rc::new(Evaluator::new(
        VenueHandle {
            id: VenueId::Binance,
            book: Rc::clone(&binance_book),
        },
        VenueHandle {
            id: VenueId::Ftx,
            book: Rc::clone(&ftx_book),
        },
        config.profit_size,
        config.demo,
    ));

    let supervisor = Supervisor::new(
        config.pair,
        binance_adapter(),
        ftx_adapter(),
        binance_book,
        ftx_book,
        evaluator,
    );

    supervisor.run(cancel).await;
    info!("xarb stopped");
}

/// Register SIGINT and SIGTERM handlers that cancel the returned token.
/// Spawned with `spawn_local` since we're inside a `LocalSet`; these tasks
/// themselves only touch a `CancellationToken`, which is `Send`, but
/// `spawn_local` keeps everything in this binary on one scheduling path.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::task::spawn_local(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::task::spawn_local(async move {
            let mut sig =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            sig.recv().await;
            info!("received SIGTERM, shutting down");
            cancel_clone.cancel();
        });
    }

    cancel
}
