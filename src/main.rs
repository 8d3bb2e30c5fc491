//! Raffle — local simulation runner.
//!
//! Wires the core state machine to in-process versions of its three
//! external collaborators: a synthetic entrant stream, an automation
//! ticker polling the upkeep predicate, and a mock coordinator whose
//! issued requests are fulfilled after a configurable delay.

use clap::Parser;
use raffle::{
    service, Address, MockCoordinator, Ledgered, Raffle, RaffleConfig, RaffleError, RaffleEvent,
    ServiceError, DEFAULT_CALLBACK_GAS_LIMIT,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "raffle", version, about = "Raffle: local lottery simulation")]
struct Args {
    /// Entrance fee in wei (default 0.01 ether)
    #[arg(short = 'f', long, default_value = "10000000000000000")]
    entrance_fee: u128,

    /// Minimum seconds a round stays open
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Seconds between synthetic entries
    #[arg(long, default_value = "2")]
    entry_cadence: u64,

    /// Seconds the mock coordinator waits before fulfilling
    #[arg(long, default_value = "3")]
    fulfill_delay: u64,

    /// Deterministic seed for the mock coordinator
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("raffle=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let config = match RaffleConfig::new(
        args.entrance_fee,
        args.interval,
        DEFAULT_CALLBACK_GAS_LIMIT,
        rand::random(),
        1,
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    info!("════════════════════════════════════════════════════════════");
    info!("  Raffle v{} — local simulation", VERSION);
    info!("════════════════════════════════════════════════════════════");
    info!(
        "Entrance fee: {} | Interval: {}s | Fulfill delay: {}s",
        config.entrance_fee, config.interval, args.fulfill_delay
    );

    // Mock coordinator reports issued request ids here; the driver task
    // below plays the role of the asynchronous provider callback.
    let (issued_tx, mut issued_rx) = mpsc::unbounded_channel();
    let coordinator = match args.seed {
        Some(seed) => MockCoordinator::seeded(seed),
        None => MockCoordinator::new(),
    }
    .with_outbox(issued_tx);

    let (raffle, mut events) = Raffle::new(
        config.clone(),
        Box::new(coordinator),
        Box::new(Ledgered::new()),
        raffle::now(),
    );
    let handle = service::spawn(raffle);

    // Event logger.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RaffleEvent::EntryRecorded(addr) => info!("event: entry recorded {}", addr),
                RaffleEvent::ClosingRequested(id) => info!("event: closing requested {}", id),
                RaffleEvent::WinnerPicked(addr) => info!("event: winner picked {}", addr),
            }
        }
    });

    // Automation ticker: dry-run poll, trigger when eligible.
    let automation = handle.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tick.tick().await;
            let check = match automation.check_upkeep().await {
                Ok(c) => c,
                Err(ServiceError::Closed) => return,
                Err(e) => {
                    warn!("upkeep check failed: {}", e);
                    continue;
                }
            };
            if !check.upkeep_needed() {
                continue;
            }
            match automation.perform_upkeep().await {
                Ok(id) => info!("upkeep performed, request {}", id),
                // Lost the race with another trigger; harmless.
                Err(ServiceError::Raffle(RaffleError::AlreadyClosing)) => {}
                Err(ServiceError::Raffle(RaffleError::UpkeepNotNeeded { .. })) => {}
                Err(ServiceError::Closed) => return,
                Err(e) => warn!("perform_upkeep failed: {}", e),
            }
        }
    });

    // Fulfillment driver: delayed delivery of random values.
    let fulfiller = handle.clone();
    let fulfill_delay = args.fulfill_delay;
    tokio::spawn(async move {
        while let Some(id) = issued_rx.recv().await {
            tokio::time::sleep(Duration::from_secs(fulfill_delay)).await;
            let random_value: u64 = rand::random();
            match fulfiller.fulfill_randomness(id, random_value).await {
                Ok(winner) => info!("request {} fulfilled, winner {}", id, winner),
                Err(ServiceError::Closed) => return,
                Err(e) => warn!("fulfillment of {} failed: {}", id, e),
            }
        }
    });

    // Synthetic entrants.
    let entrants = handle.clone();
    let fee = config.entrance_fee;
    let cadence = args.entry_cadence;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(cadence)).await;
            let who = Address::from(rand::random::<[u8; 20]>());
            match entrants.enter(who, fee).await {
                Ok(()) => {}
                Err(ServiceError::Raffle(RaffleError::Entry(_))) => {
                    debug!("entry rejected while round resolves");
                }
                Err(ServiceError::Closed) => return,
                Err(e) => warn!("entry failed: {}", e),
            }
        }
    });

    // Status printer.
    let status = handle.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(10));
        loop {
            tick.tick().await;
            match status.status().await {
                Ok(s) => info!(
                    "Status: {} | {} entrants | stake {} | recent winner {}",
                    s.state,
                    s.entrant_count,
                    s.stake_total,
                    s.recent_winner
                        .map(|w| w.to_string())
                        .unwrap_or_else(|| "none".into())
                ),
                Err(_) => return,
            }
        }
    });

    info!("Raffle running. Ctrl-C to stop.");
    tokio::signal::ctrl_c().await.ok();
    info!("Shutting down...");
}
