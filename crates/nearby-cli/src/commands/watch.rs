//! Watch command implementation.
//!
//! Runs the scan coordinator until Ctrl+C (or `--count` reports) and prints
//! each report tick. With `--demo` the Bluetooth adapter is replaced by a
//! mock radio fed by a few simulated peers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nearby_core::{
    BtleRadio, MockRadio, ProximityEvent, Radio, ScanCoordinator, ScannerConfig, TransportId,
    identity_for_transport,
};
use owo_colors::OwoColorize;
use rand::Rng;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::{FormatOptions, format_event_text, format_report_json, format_report_text};

/// Simulated peers: user id, name, mean RSSI.
const DEMO_PEERS: [(i64, &str, f32); 3] = [(1, "Ada", -55.0), (2, "Kay", -80.0), (3, "Lin", -92.0)];

/// Advertisement period of each simulated peer.
const DEMO_ADVERTISE_INTERVAL: Duration = Duration::from_millis(100);

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub format: OutputFormat,
    pub count: u32,
    pub events: bool,
    pub report_interval_ms: Option<u64>,
    pub demo: bool,
    pub quiet: bool,
    pub config: &'a Config,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_watch(args: WatchArgs<'_>) -> Result<()> {
    let mut scanner_config = args.config.scanner_config();
    if let Some(ms) = args.report_interval_ms {
        scanner_config = scanner_config.report_interval(Duration::from_millis(ms));
    }

    if args.demo {
        let radio = Arc::new(MockRadio::new());
        radio.set_connect_latency(Duration::from_millis(300));
        let stop = CancellationToken::new();
        let advertiser = tokio::spawn(run_demo_peers(Arc::clone(&radio), stop.clone()));
        let result = watch(radio, scanner_config, &args).await;
        stop.cancel();
        let _ = advertiser.await;
        result
    } else {
        let radio = BtleRadio::new(args.config.btle_options())
            .await
            .context("No usable Bluetooth adapter (try --demo)")?;
        watch(Arc::new(radio), scanner_config, &args).await
    }
}

async fn watch<R: Radio>(radio: Arc<R>, config: ScannerConfig, args: &WatchArgs<'_>) -> Result<()> {
    let opts = match args.format {
        OutputFormat::Json => args.opts.with_compact(true),
        OutputFormat::Text => *args.opts,
    };

    let mut coordinator = ScanCoordinator::new(radio, config);
    let mut events = coordinator.subscribe();
    coordinator.configure(args.config.roster.clone()).await;
    coordinator
        .start()
        .await
        .context("Failed to start scanning")?;

    if !args.quiet {
        let interval = coordinator.config().report_interval;
        let banner = format!(
            "Watching for nearby devices (report every {:?}, {} known) | Press Ctrl+C to stop",
            interval,
            args.config.roster.len()
        );
        if opts.no_color {
            eprintln!("{}", banner);
        } else {
            eprintln!("{}", banner.dimmed());
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut reports: u32 = 0;

    let outcome = loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => {
                if !args.quiet {
                    eprintln!("\nShutting down...");
                }
                break Ok(());
            }
            event = events.recv() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                warn!("Output fell behind, skipped {} event(s)", n);
                continue;
            }
            Err(RecvError::Closed) => break Ok(()),
        };

        match (&event, args.format) {
            (ProximityEvent::Report(report), OutputFormat::Text) => {
                print!("{}", format_report_text(report, &opts));
            }
            (ProximityEvent::Report(report), OutputFormat::Json) => {
                match format_report_json(report, &opts) {
                    Ok(json) => print!("{}", json),
                    Err(e) => break Err(e),
                }
            }
            (_, OutputFormat::Text) if args.events => {
                if let Some(line) = format_event_text(&event, &opts) {
                    println!("{}", line);
                }
            }
            (_, OutputFormat::Json) if args.events => match opts.as_json(&event) {
                Ok(json) => print!("{}", json),
                Err(e) => break Err(e),
            },
            _ => debug!(?event, "Coordinator event"),
        }

        if matches!(event, ProximityEvent::Report(_)) {
            reports += 1;
            if args.count > 0 && reports >= args.count {
                break Ok(());
            }
        }
    };

    coordinator.stop().await;
    if args.count > 0 && !args.quiet {
        eprintln!("Completed {} report(s).", reports);
    }
    outcome
}

/// Advertise the demo peers with jittered RSSI until cancelled.
async fn run_demo_peers(radio: Arc<MockRadio>, stop: CancellationToken) {
    let peers: Vec<(TransportId, f32)> = DEMO_PEERS
        .iter()
        .map(|(user_id, name, rssi)| {
            (
                TransportId::new(format!("DEMO-{:02}-{}", user_id, name.to_uppercase())),
                *rssi,
            )
        })
        .collect();
    for ((user_id, name, _), (id, _)) in DEMO_PEERS.iter().zip(&peers) {
        radio.set_payload(id, format!("{},{}", user_id, name)).await;
    }

    let mut ticker = tokio::time::interval(DEMO_ADVERTISE_INTERVAL);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }
        for (id, rssi) in &peers {
            let jitter: f32 = rand::rng().random_range(-5.0..=5.0);
            radio.discover(id, identity_for_transport(id), rssi + jitter);
        }
    }
}
