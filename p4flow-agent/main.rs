use axum::{extract::State, response::IntoResponse, routing::get, Router};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use p4flow::common::topology::{detect_online_cpus, parse_cpu_list};
use p4flow::config::parse_event_spec;
use p4flow::counters::netburst::catalog::NUM_COUNTERS_NON_HT;
use p4flow::{
    Backend, CounterConfig, P4FlowError, ProfileConfig, Result, SampleExporter, Sampler,
    SamplerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "p4flow")]
#[command(about = "Overflow sampling on Pentium 4 / NetBurst performance counters")]
struct Args {
    #[arg(
        long = "cpu",
        help = "CPUs to sample (ranges and comma-separated lists: --cpu 0-3,6)",
        action = clap::ArgAction::Append
    )]
    cpus: Vec<String>,

    #[arg(long, help = "YAML profile with the counter list")]
    config: Option<PathBuf>,

    #[arg(
        long = "event",
        help = "Counter as EVENT:COUNT[:UNIT_MASK], one per virtual counter in order (overrides --config)",
        action = clap::ArgAction::Append
    )]
    events: Vec<String>,

    #[arg(long, help = "Count in user mode (default: user and kernel)")]
    user: bool,

    #[arg(long, help = "Count in kernel mode (default: user and kernel)")]
    kernel: bool,

    #[arg(long, default_value_t = 1000, help = "Overflow poll interval")]
    interval_ms: u64,

    #[arg(long, default_value = "0.0.0.0:8080", help = "Metrics listen address")]
    listen: SocketAddr,

    #[arg(long, help = "Run against simulated NetBurst cores instead of /dev/cpu/*/msr")]
    simulate: bool,

    #[arg(long, default_value_t = 2, help = "Threads per simulated core")]
    sim_threads: u32,

    #[arg(long, default_value_t = 3, help = "Model number of the simulated CPU")]
    sim_model: u8,

    #[arg(long, default_value_t = 1_000_000, help = "Events added to each simulated counter per poll")]
    sim_events: u64,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows all MSR read/write operations)"
    )]
    verbose: bool,
}

struct AppState {
    exporter: Arc<SampleExporter>,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&state.exporter.registry().gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

fn check_permissions() -> Result<()> {
    let msr_path = "/dev/cpu/0/msr";
    if std::fs::metadata(msr_path).is_err() {
        return Err(P4FlowError::MsrError(format!(
            "Cannot access {msr_path}; the msr kernel module may not be loaded (sudo modprobe msr)"
        )));
    }

    if let Err(e) = std::fs::File::open(msr_path) {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            return Err(P4FlowError::MsrError(format!(
                "Permission denied accessing {msr_path}; run as root or use --simulate"
            )));
        }
    }
    Ok(())
}

/// Parse a list of range strings like ["0-3", "5", "8-11"]
fn parse_range_list(inputs: &[String]) -> Result<Vec<u32>> {
    let mut result = Vec::new();
    for input in inputs {
        let cpus = parse_cpu_list(input)
            .ok_or_else(|| P4FlowError::ParseError(format!("Invalid cpu list '{input}'")))?;
        result.extend(cpus);
    }

    result.sort_unstable();
    result.dedup();
    Ok(result)
}

fn counters_from_args(args: &Args, profile: Option<&ProfileConfig>) -> Result<Vec<CounterConfig>> {
    let (user, kernel) = if args.user || args.kernel {
        (args.user, args.kernel)
    } else {
        (true, true)
    };

    let counters = if !args.events.is_empty() {
        args.events
            .iter()
            .map(|spec| parse_event_spec(spec, user, kernel))
            .collect::<Result<Vec<_>>>()?
    } else if let Some(profile) = profile {
        profile.counters.clone()
    } else {
        return Err(P4FlowError::ConfigError(
            "No counters given; use --event or --config".to_string(),
        ));
    };

    if counters.len() > NUM_COUNTERS_NON_HT {
        tracing::warn!(
            "{} counters given, only the first {} can be used",
            counters.len(),
            NUM_COUNTERS_NON_HT
        );
    }
    Ok(counters)
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    tracing::info!("Installing signal handlers...");

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Ctrl+C received!");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("SIGTERM received!");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Shutdown triggered by Ctrl+C");
        },
        _ = terminate => {
            tracing::warn!("Shutdown triggered by SIGTERM");
        },
    }

    tracing::warn!("Shutdown signal received, initiating graceful shutdown...");
    cancel_token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let profile = args.config.as_deref().map(ProfileConfig::load).transpose()?;
    let counters = counters_from_args(&args, profile.as_ref())?;

    let backend = if args.simulate {
        Backend::Simulated {
            threads_per_core: args.sim_threads,
            model: args.sim_model,
            events_per_tick: args.sim_events,
        }
    } else {
        check_permissions()?;
        tracing::info!(
            "Detected CPU architecture: {}",
            p4flow::common::CPU_ARCH.name()
        );
        Backend::Host
    };

    let cpus = if !args.cpus.is_empty() {
        parse_range_list(&args.cpus)?
    } else if let Some(cpus) = profile.as_ref().map(|p| &p.cpus).filter(|c| !c.is_empty()) {
        cpus.clone()
    } else if args.simulate {
        (0..args.sim_threads.max(1)).collect()
    } else {
        detect_online_cpus()
    };
    tracing::info!("Using cpus: {:?}", cpus);

    let exporter = Arc::new(SampleExporter::new()?);
    let sampler = Sampler::new(
        SamplerConfig {
            cpus,
            counters,
            interval: Duration::from_millis(args.interval_ms.max(1)),
            backend,
        },
        Arc::clone(&exporter),
    )?;

    let cancel_token = CancellationToken::new();
    let sampling_handle = sampler.start(cancel_token.clone())?;

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(AppState { exporter }));

    tracing::warn!("Starting HTTP server on {}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    // The server can also stop on its own; make sure sampling follows
    cancel_token.cancel();
    tracing::info!("Server shutdown complete, waiting for sampling loop to finish...");
    if let Err(e) = sampling_handle.await {
        tracing::error!("Sampling loop failed: {}", e);
    }

    tracing::info!("All tasks completed, exiting");
    Ok(())
}
