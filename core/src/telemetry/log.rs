use log::{debug, info, warn};

/// Component-scoped logger; every line carries the owning component's name.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.component, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.component, message);
    }

    /// Best-effort work that was skipped; never surfaced to the user.
    pub fn degraded(&self, message: &str) {
        warn!("[{}] {}", self.component, message);
    }

    /// Service unreachable or response unusable. Logged under its own target so
    /// it can be filtered apart from failures the service itself reported.
    pub fn transport_failure(&self, message: &str) {
        warn!(target: "conjcore::transport", "[{}] {}", self.component, message);
    }
}
