//! Freeing the TCP ports a service claims before it launches and after it stops.

mod conflict;

pub use conflict::{find_port_holders, is_port_in_use, PortHolder};

use crate::error::{Error, Result};
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use std::time::Duration;

#[async_trait]
pub trait PortReservation: Send + Sync {
    fn is_occupied(&self, port: u16) -> bool;

    /// Terminate whatever holds `port` and wait until it is free.
    async fn clear(&self, port: u16) -> Result<()>;
}

/// Clears ports on the local host by signalling their holders.
#[derive(Debug, Clone)]
pub struct SystemPorts {
    /// First pause after signalling; later attempts back off exponentially.
    wait: Duration,
    attempts: u32,
}

impl SystemPorts {
    pub fn new(wait: Duration) -> Self {
        Self { wait, attempts: 4 }
    }

    fn signal_holders(holders: &[PortHolder], sig: Signal) {
        let me = std::process::id();
        for holder in holders {
            if holder.pid == me {
                tracing::debug!("Not signalling self (PID {}) holding a port", me);
                continue;
            }
            let Some(pid) = crate::error::validate_pid_for_check(holder.pid) else {
                continue;
            };
            if holder.pid == 1 {
                continue;
            }
            if let Err(e) = signal::kill(pid, sig) {
                tracing::debug!("Failed to send {} to PID {}: {}", sig, holder.pid, e);
            }
        }
    }
}

impl Default for SystemPorts {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl PortReservation for SystemPorts {
    fn is_occupied(&self, port: u16) -> bool {
        is_port_in_use(port)
    }

    async fn clear(&self, port: u16) -> Result<()> {
        if !is_port_in_use(port) {
            return Ok(());
        }

        let mut last_holders = Vec::new();
        let mut delay = self.wait;

        for attempt in 1..=self.attempts {
            let holders = find_port_holders(port).await;
            if !holders.is_empty() {
                for holder in &holders {
                    tracing::info!(
                        "Port {} held by '{}' (PID {}), terminating",
                        port,
                        holder.name,
                        holder.pid
                    );
                }
                // escalate on the last attempt
                let sig = if attempt == self.attempts {
                    Signal::SIGKILL
                } else {
                    Signal::SIGTERM
                };
                Self::signal_holders(&holders, sig);
                last_holders = holders;
            }

            tokio::time::sleep(delay).await;
            if !is_port_in_use(port) {
                return Ok(());
            }
            delay = delay.saturating_mul(2);
        }

        let holder = last_holders.into_iter().next();
        Err(Error::PortConflict {
            port,
            pid: holder.as_ref().map(|h| h.pid),
            process_name: holder.map(|h| h.name),
        })
    }
}
