//! Deadline-bounded hostname resolution.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::claim::ClaimGuard;
use super::transport::{RawAddress, ResolverTransport, SystemResolver};
use super::{AddressRecord, ResolutionError, ResolutionOutcome};
use crate::config::CoreConfig;
use crate::logging::Masked;

type Handler = Box<dyn FnOnce(ResolutionOutcome) + Send + 'static>;

/// Resolves hostnames under a hard deadline.
///
/// Each request races the transport lookup against a timer. Both paths
/// share a [`ClaimGuard`] holding the caller's handler, so exactly one
/// outcome is delivered per request: whichever path claims the guard first
/// delivers it, the other becomes a no-op. When the timer wins, the lookup
/// task is aborted and the transport is asked to cancel.
#[derive(Debug)]
pub struct AddressResolver<T = SystemResolver> {
    transport: Arc<T>,
    masks_private_data: bool,
}

impl<T> Clone for AddressResolver<T> {
    fn clone(&self) -> Self {
        AddressResolver {
            transport: self.transport.clone(),
            masks_private_data: self.masks_private_data,
        }
    }
}

impl AddressResolver<SystemResolver> {
    /// Resolver backed by the operating system.
    pub fn system() -> Self {
        AddressResolver::new(SystemResolver)
    }
}

impl<T: ResolverTransport + 'static> AddressResolver<T> {
    /// Create a resolver over `transport`.
    pub fn new(transport: T) -> Self {
        AddressResolver {
            transport: Arc::new(transport),
            masks_private_data: true,
        }
    }

    /// Create a resolver honouring the logging settings of `config`.
    pub fn from_config(transport: T, config: &CoreConfig) -> Self {
        AddressResolver::new(transport).with_private_data_masking(config.masks_private_data)
    }

    /// Mask hostnames in log output.
    pub fn with_private_data_masking(mut self, masks: bool) -> Self {
        self.masks_private_data = masks;
        self
    }

    /// The lookup transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve `hostname`, waiting at most `timeout`.
    pub async fn resolve(&self, hostname: &str, timeout: Duration) -> ResolutionOutcome {
        let (tx, rx) = oneshot::channel();
        self.resolve_with(hostname, timeout, move |outcome| {
            let _ = tx.send(outcome);
        });
        // the sender only vanishes undelivered if the runtime shuts down
        rx.await.unwrap_or(Err(ResolutionError::LookupFailed))
    }

    /// Resolve `hostname` and hand the outcome to `handler` exactly once.
    ///
    /// Must be called from within a tokio runtime; `handler` runs on a
    /// runtime task.
    pub fn resolve_with<F>(&self, hostname: &str, timeout: Duration, handler: F)
    where
        F: FnOnce(ResolutionOutcome) + Send + 'static,
    {
        let guard: Arc<ClaimGuard<Handler>> = Arc::new(ClaimGuard::new(Box::new(handler)));
        let hostname = hostname.to_string();
        let masks = self.masks_private_data;
        debug!(hostname = %Masked::new(&hostname, masks), ?timeout, "Resolving");

        let lookup = {
            let guard = guard.clone();
            let transport = self.transport.clone();
            let hostname = hostname.clone();
            tokio::spawn(async move {
                let outcome = records_from_lookup(transport.lookup(&hostname).await);
                match guard.claim() {
                    Some(handler) => handler(outcome),
                    None => debug!(
                        hostname = %Masked::new(&hostname, masks),
                        "Discarding lookup result that arrived after the deadline"
                    ),
                }
            })
        };
        let abort = lookup.abort_handle();
        let transport = self.transport.clone();

        tokio::spawn(async move {
            tokio::select! {
                joined = lookup => {
                    // lookup panicked before it could claim
                    if joined.is_err() {
                        if let Some(handler) = guard.claim() {
                            handler(Err(ResolutionError::LookupFailed));
                        }
                    }
                }
                _ = tokio::time::sleep(timeout) => {
                    if let Some(handler) = guard.claim() {
                        abort.abort();
                        transport.cancel(&hostname);
                        warn!(hostname = %Masked::new(&hostname, masks), ?timeout, "Resolution timed out");
                        handler(Err(ResolutionError::TimedOut));
                    }
                }
            }
        });
    }
}

fn records_from_lookup(result: io::Result<Vec<RawAddress>>) -> ResolutionOutcome {
    let raw = result.map_err(|e| {
        debug!(error = %e, "Lookup failed");
        ResolutionError::LookupFailed
    })?;

    let records: Vec<AddressRecord> = raw.iter().filter_map(AddressRecord::from_raw).collect();
    if records.is_empty() {
        return Err(ResolutionError::LookupFailed);
    }
    Ok(records)
}
