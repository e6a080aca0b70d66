use anyhow::{bail, Context};
use clap::Parser;
use conjcore::contracts::JobStatus;
use conjcore::{HttpMissionService, MissionConfig};
use service::server::ServiceHost;
use service::state::ServiceState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{load_yaml, ServiceConfig};
use workflow::watch::{watch_screening, WatchRequest};

mod generator;
mod service;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Simulated conjunction screening service and job watcher")]
struct Args {
    /// Host the simulated screening service until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Load the service config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the service bind address
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Start one screening job and follow it to completion
    #[arg(long, default_value_t = false)]
    watch: bool,
    /// Load the mission-tracking config from YAML
    #[arg(long)]
    mission: Option<PathBuf>,
    /// Service to watch; defaults to the hosted one when serving
    #[arg(long)]
    base_url: Option<String>,
    /// Asset ids to screen; empty screens every asset
    #[arg(long, value_delimiter = ',')]
    assets: Vec<u64>,
    #[arg(long, default_value_t = 7)]
    window_days: u32,
    #[arg(long, default_value_t = 5.0)]
    threshold_km: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.serve && !args.watch {
        bail!("nothing to do: pass --serve, --watch, or both");
    }

    let mut service_config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        service_config.bind = bind;
    }
    let mut mission: MissionConfig = match &args.mission {
        Some(path) => load_yaml(path, "mission config")?,
        None => MissionConfig::default(),
    };

    let host = if args.serve {
        let bind = service_config.bind;
        let host = ServiceHost::start(ServiceState::new(service_config), bind)?;
        println!("[service] screening service at {}", host.base_url());
        mission = mission.with_service_url(host.base_url());
        Some(host)
    } else {
        None
    };
    if let Some(url) = args.base_url {
        mission = mission.with_service_url(url);
    }

    if args.watch {
        let request = WatchRequest {
            asset_ids: args.assets,
            window_days: args.window_days,
            distance_threshold_km: args.threshold_km,
        };
        let runtime = TokioBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating runtime for the job watcher")?;
        let outcome = runtime.block_on(async {
            let service =
                HttpMissionService::from_config(&mission).context("building service client")?;
            watch_screening(Arc::new(service), &mission, request).await
        })?;
        if outcome.job.status != JobStatus::Completed {
            bail!("screening ended {}", outcome.job.status_text());
        }
    }

    if host.is_some() && !args.watch {
        println!("[service] running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
