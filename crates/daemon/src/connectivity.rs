//! Network-connectivity precondition for scheduled syncs.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use vaultsync_core::config::SchedulerSection;

/// Decides whether the network is reachable before a sync fires.
#[derive(Debug, Clone)]
pub enum ConnectivityChecker {
    /// TCP-connect to `host:port` with a short timeout.
    Probe {
        host: String,
        port: u16,
        timeout: Duration,
    },
    /// Skip probing entirely (config option, tests).
    AssumeOnline,
}

impl ConnectivityChecker {
    pub fn from_config(config: &SchedulerSection) -> Self {
        if config.assume_online {
            Self::AssumeOnline
        } else {
            Self::Probe {
                host: config.connectivity_host.clone(),
                port: config.connectivity_port,
                timeout: Duration::from_secs(5),
            }
        }
    }

    /// `true` if a sync may proceed.
    pub async fn is_online(&self) -> bool {
        match self {
            Self::AssumeOnline => true,
            Self::Probe {
                host,
                port,
                timeout,
            } => {
                let attempt = TcpStream::connect((host.as_str(), *port));
                match tokio::time::timeout(*timeout, attempt).await {
                    Ok(Ok(_)) => true,
                    Ok(Err(e)) => {
                        debug!(host = host.as_str(), port, error = %e, "connectivity probe failed");
                        false
                    }
                    Err(_) => {
                        debug!(host = host.as_str(), port, "connectivity probe timed out");
                        false
                    }
                }
            }
        }
    }
}
