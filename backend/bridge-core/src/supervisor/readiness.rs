//! Worker readiness as an observable state machine.
//!
//! One supervisor owns one worker owns one cell; there is deliberately no
//! process-wide readiness flag. The startup monitor task writes, arbitrary
//! caller threads read, so the current state is published through an atomic
//! and waiters subscribe through a watch channel.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use log::debug;
use tokio::sync::watch;

/// Lifecycle of a supervised worker.
///
/// Legal transitions: NotStarted→Starting→{Ready, Failed} and Ready→Failed
/// (worker process exited after becoming ready). Nothing ever transitions
/// back; a fresh supervisor is the only way back to NotStarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotStarted,
    Starting,
    Ready,
    Failed,
}

impl ReadinessState {
    const fn as_u8(self) -> u8 {
        match self {
            ReadinessState::NotStarted => 0,
            ReadinessState::Starting => 1,
            ReadinessState::Ready => 2,
            ReadinessState::Failed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadinessState::NotStarted,
            1 => ReadinessState::Starting,
            2 => ReadinessState::Ready,
            _ => ReadinessState::Failed,
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadinessState::NotStarted => "NotStarted",
            ReadinessState::Starting => "Starting",
            ReadinessState::Ready => "Ready",
            ReadinessState::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

const fn is_legal(from: ReadinessState, to: ReadinessState) -> bool {
    matches!(
        (from, to),
        (ReadinessState::NotStarted, ReadinessState::Starting)
            | (ReadinessState::Starting, ReadinessState::Ready)
            | (ReadinessState::Starting, ReadinessState::Failed)
            | (ReadinessState::Ready, ReadinessState::Failed)
    )
}

/// The single shared state cell for one worker.
///
/// Reads never block; writes go through [`transition`](ReadinessCell::transition)
/// which enforces the legal transition set and notifies waiters.
pub(crate) struct ReadinessCell {
    state: AtomicU8,
    notify: watch::Sender<ReadinessState>,
}

impl ReadinessCell {
    pub(crate) fn new() -> Self {
        let (notify, _) = watch::channel(ReadinessState::NotStarted);
        Self {
            state: AtomicU8::new(ReadinessState::NotStarted.as_u8()),
            notify,
        }
    }

    pub(crate) fn current(&self) -> ReadinessState {
        ReadinessState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.current() == ReadinessState::Ready
    }

    /// Attempt a transition. Returns false (and applies nothing) if the
    /// transition is not in the legal set - e.g. a second Ready marker, or
    /// an exit observed after Failed was already recorded.
    pub(crate) fn transition(&self, to: ReadinessState) -> bool {
        loop {
            let current = self.state.load(Ordering::Acquire);
            let from = ReadinessState::from_u8(current);
            if !is_legal(from, to) {
                debug!("Ignoring illegal readiness transition {from} -> {to}");
                return false;
            }
            if self
                .state
                .compare_exchange(current, to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.notify.send_replace(to);
                return true;
            }
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.notify.subscribe()
    }
}

/// Cheap cloneable read-only view of a worker's readiness, handed to the
/// protocol client so requests can fail fast without a network attempt.
#[derive(Clone)]
pub struct ReadinessProbe {
    cell: Arc<ReadinessCell>,
}

impl ReadinessProbe {
    pub(crate) fn new(cell: Arc<ReadinessCell>) -> Self {
        Self { cell }
    }

    /// Non-blocking, thread-safe read of the current state.
    pub fn is_ready(&self) -> bool {
        self.cell.is_ready()
    }

    pub fn current(&self) -> ReadinessState {
        self.cell.current()
    }
}
