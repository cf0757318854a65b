//! End-to-end bridge startup: cache, trust, channel, supervisor, client.
//!
//! Progress is observable through a plain event channel; nothing here knows
//! about any UI toolkit.

use crate::cache;
use crate::error::BridgeError;
use crate::error::supervisor::SupervisorError;
use crate::protocol::ProtocolClient;
use crate::supervisor::{WorkerLauncher, WorkerSupervisor};
use crate::trust::{self, Credential};

use common::ErrorLocation;
use models::TrustBundle;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::sync::mpsc::UnboundedSender;

/// Progress notifications emitted during [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapEvent {
    LoadingCache,
    RestoringTrust,
    GeneratingTrust,
    SavingTrust,
    StartingWorker,
    WaitingForWorker,
    WorkerReady,
}

impl fmt::Display for BootstrapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BootstrapEvent::LoadingCache => "Loading trust cache..",
            BootstrapEvent::RestoringTrust => "Restoring trust bundle..",
            BootstrapEvent::GeneratingTrust => "Generating trust bundle..",
            BootstrapEvent::SavingTrust => "Saving trust bundle..",
            BootstrapEvent::StartingWorker => "Starting worker..",
            BootstrapEvent::WaitingForWorker => "Waiting for worker to become ready..",
            BootstrapEvent::WorkerReady => "Worker ready",
        };
        write!(f, "{text}")
    }
}

/// Where bootstrap progress goes; drop the receiver to ignore it.
pub type EventSink = UnboundedSender<BootstrapEvent>;

/// A started bridge: the supervisor owning the worker and the protocol
/// client speaking to it.
pub struct WorkerBridge {
    pub supervisor: WorkerSupervisor,
    pub client: ProtocolClient,
}

/// Bring up the whole bridge.
///
/// Loads the cached trust bundle (falling back to generation when the
/// cache is missing, corrupt, or fails restore validation), saves a fresh
/// bundle for the next start, generates a fresh credential, builds the
/// secure channel, launches the worker, and - when `ready_timeout` is set -
/// waits for it to become ready.
///
/// A failed cache write is logged and ignored: it only costs the next
/// startup the generation time.
///
/// # Errors
///
/// Trust generation and channel setup failures abort startup entirely (no
/// partial worker launch); launch and readiness failures surface as
/// supervisor errors.
pub async fn init(
    cache_dir: &Path,
    launcher: Arc<dyn WorkerLauncher>,
    events: Option<EventSink>,
    ready_timeout: Option<Duration>,
) -> Result<WorkerBridge, BridgeError> {
    emit(&events, BootstrapEvent::LoadingCache);

    let bundle = match cache::load(cache_dir) {
        Some(cached) => match trust::restore(cached) {
            Ok(bundle) => {
                emit(&events, BootstrapEvent::RestoringTrust);
                bundle
            }
            Err(e) => {
                warn!("Cached trust bundle is malformed, regenerating: {e}");
                generate_and_save(cache_dir, &events)?
            }
        },
        None => generate_and_save(cache_dir, &events)?,
    };

    let credential = Credential::generate();
    let supervisor = WorkerSupervisor::new(bundle, credential, launcher)?;

    emit(&events, BootstrapEvent::StartingWorker);
    supervisor.start()?;

    let endpoint = supervisor
        .endpoint()
        .ok_or_else(|| SupervisorError::StartFailed {
            message: String::from("worker endpoint missing after start"),
            location: ErrorLocation::capture(),
        })?;
    let client = ProtocolClient::new(&endpoint, supervisor.probe())?;

    if let Some(timeout) = ready_timeout {
        emit(&events, BootstrapEvent::WaitingForWorker);
        supervisor.wait_until_ready(timeout).await?;
        emit(&events, BootstrapEvent::WorkerReady);
    }

    Ok(WorkerBridge { supervisor, client })
}

fn generate_and_save(
    cache_dir: &Path,
    events: &Option<EventSink>,
) -> Result<TrustBundle, BridgeError> {
    emit(events, BootstrapEvent::GeneratingTrust);
    let bundle = trust::generate()?;

    emit(events, BootstrapEvent::SavingTrust);
    if let Err(e) = cache::save(&bundle, cache_dir) {
        warn!("Failed to save trust bundle cache: {e}");
    }

    Ok(bundle)
}

fn emit(events: &Option<EventSink>, event: BootstrapEvent) {
    if let Some(sink) = events {
        // A dropped receiver just means nobody is watching progress.
        let _ = sink.send(event);
    }
}
