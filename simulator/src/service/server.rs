use anyhow::{anyhow, Context, Result};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread;
use tokio::runtime::Builder;
use tokio::sync::oneshot;

use crate::service::routes::routes;
use crate::service::state::ServiceState;

/// Hosts the simulated service on its own thread and runtime.
///
/// Dropping the host shuts the server down.
pub struct ServiceHost {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServiceHost {
    /// Binds `addr` (port 0 picks a free port) and starts serving.
    pub fn start(state: Arc<ServiceState>, addr: SocketAddr) -> Result<Self> {
        let (bound_tx, bound_rx) = mpsc::channel::<Result<SocketAddr>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let filter = routes(state);

        let thread = thread::Builder::new()
            .name("screening-service".to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("building service runtime")
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = bound_tx.send(Err(err));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let bound = warp::serve(filter).try_bind_with_graceful_shutdown(
                        addr,
                        async move {
                            let _ = shutdown_rx.await;
                        },
                    );
                    match bound {
                        Ok((local, server)) => {
                            let _ = bound_tx.send(Ok(local));
                            server.await;
                        }
                        Err(err) => {
                            error!("service failed to bind {}: {}", addr, err);
                            let _ = bound_tx.send(Err(anyhow!("binding {}: {}", addr, err)));
                        }
                    }
                });
            })
            .context("spawning service thread")?;

        let addr = bound_rx
            .recv()
            .context("service thread exited before binding")??;
        info!("screening service listening on http://{}", addr);
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for ServiceHost {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::ServiceConfig;
    use conjcore::{HttpMissionService, MissionService};
    use std::time::Duration;

    fn local() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn http_client_reaches_hosted_service() {
        let state = ServiceState::new(ServiceConfig {
            catalog_size: 100,
            ..ServiceConfig::default()
        });
        let host = ServiceHost::start(state, local()).unwrap();
        assert_ne!(host.addr().port(), 0);

        let client = HttpMissionService::new(host.base_url(), Duration::from_secs(5)).unwrap();
        let track = client.propagate(25544, 5, 60.0).await.unwrap();
        assert_eq!(track.points.len(), 5);
        let summary = client.conjunction_summary().await.unwrap();
        assert_eq!(summary.total, 0);

        let err = client.propagate(3, 1, 60.0).await.unwrap_err();
        assert!(err.to_string().contains("404"), "{err}");
    }

    #[test]
    fn second_bind_on_same_port_fails() {
        let state = ServiceState::new(ServiceConfig {
            catalog_size: 10,
            ..ServiceConfig::default()
        });
        let first = ServiceHost::start(Arc::clone(&state), local()).unwrap();
        assert!(ServiceHost::start(state, first.addr()).is_err());
    }
}
