//! weft-pow: the proof-of-work handler.
//!
//! The handler tunnels PoW requests to a remote service when one is wired
//! in and usable, and computes locally otherwise. A remote failure is
//! logged once, disconnects the remote, and falls back to local on the
//! same call; reconnection attempts are gated by a cooldown. Cancellation
//! is cooperative through a [`CancelToken`] and is honored before and
//! during the local search.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use snafu::Snafu;
use tracing::warn;
use weft_types::PowConfig;

/// How many nonces the local search tries between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Result type alias for PoW operations.
pub type Result<T> = std::result::Result<T, PowError>;

/// Errors surfaced by the PoW handler.
#[derive(Debug, Snafu)]
pub enum PowError {
    /// The cancel signal fired before the work completed.
    #[snafu(display("operation aborted"))]
    OperationAborted,
}

/// Error returned by a remote PoW implementation.
///
/// Remote failures never surface from [`PowHandler::do_pow`]; they trigger
/// the local fallback instead.
#[derive(Debug, Snafu)]
#[snafu(display("remote PoW failed: {message}"))]
pub struct RemotePowError {
    /// Description of the remote failure.
    pub message: String,
}

/// A cloneable cooperative cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A remote PoW service.
///
/// Implementations perform the search elsewhere and return the nonce.
pub trait RemotePow: Send + Sync {
    /// Computes a nonce for `message` meeting `target_score`.
    ///
    /// # Errors
    ///
    /// Returns [`RemotePowError`] if the remote service fails; the handler
    /// then falls back to local PoW.
    fn pow(&self, message: &[u8], target_score: u32) -> std::result::Result<u64, RemotePowError>;
}

/// Scores a message/nonce pair: trailing zero bits of
/// `sha256(message || nonce LE)`.
pub fn pow_score(message: &[u8], nonce: u64) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();

    let mut score = 0;
    for byte in digest.iter().rev() {
        if *byte == 0 {
            score += 8;
        } else {
            score += byte.trailing_zeros();
            break;
        }
    }
    score
}

struct RemoteState {
    connected: bool,
    last_attempt: Option<Instant>,
    error_handled: bool,
}

/// Handles PoW requests, preferring the remote service when usable.
pub struct PowHandler {
    config: PowConfig,
    remote: Option<Box<dyn RemotePow>>,
    state: RwLock<RemoteState>,
}

impl PowHandler {
    /// Creates a handler; `remote` is the optional remote service.
    pub fn new(config: PowConfig, remote: Option<Box<dyn RemotePow>>) -> Self {
        Self {
            config,
            remote,
            state: RwLock::new(RemoteState {
                connected: false,
                last_attempt: None,
                error_handled: false,
            }),
        }
    }

    /// The PoW implementation the next request would use.
    pub fn pow_type(&self) -> &'static str {
        if self.state.read().connected { "remote" } else { "local" }
    }

    /// Computes a nonce for `message` meeting the configured target score.
    ///
    /// An already-fired cancel signal aborts before any work. The remote
    /// service is used when connected (or reconnectable after the
    /// cooldown); a remote failure logs once, disconnects, and falls back
    /// to the local search on this same call.
    ///
    /// # Errors
    ///
    /// Returns [`PowError::OperationAborted`] when the cancel signal fires.
    pub fn do_pow(&self, message: &[u8], cancel: &CancelToken) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(PowError::OperationAborted);
        }

        if let Some(remote) = &self.remote
            && self.connect_remote()
        {
            match remote.pow(message, self.config.target_score) {
                Ok(nonce) => return Ok(nonce),
                Err(err) => self.handle_remote_error(&err),
            }
        }

        self.local_pow(message, cancel)
    }

    /// Marks the remote usable, respecting the reconnect cooldown.
    ///
    /// Checks under the read lock first; only when state must change is the
    /// write lock taken, and the predicate is re-validated after the
    /// upgrade.
    fn connect_remote(&self) -> bool {
        {
            let state = self.state.read();
            if state.connected {
                return true;
            }
            if let Some(last_attempt) = state.last_attempt
                && last_attempt.elapsed() < self.config.remote_cooldown
            {
                return false;
            }
        }

        let mut state = self.state.write();
        // Re-validate: another thread may have connected or started a
        // cooldown between the read and write locks.
        if state.connected {
            return true;
        }
        if let Some(last_attempt) = state.last_attempt
            && last_attempt.elapsed() < self.config.remote_cooldown
        {
            return false;
        }

        state.last_attempt = Some(Instant::now());
        state.connected = true;
        state.error_handled = false;
        true
    }

    fn handle_remote_error(&self, err: &RemotePowError) {
        let mut state = self.state.write();
        if state.error_handled {
            return;
        }
        state.error_handled = true;
        state.connected = false;
        state.last_attempt = Some(Instant::now());
        warn!(error = %err, "remote PoW failed, falling back to local");
    }

    fn local_pow(&self, message: &[u8], cancel: &CancelToken) -> Result<u64> {
        let target = self.config.target_score;
        let mut nonce: u64 = 0;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(PowError::OperationAborted);
            }
            if pow_score(message, nonce) >= target {
                return Ok(nonce);
            }
            nonce = nonce.wrapping_add(1);
        }
    }
}

impl std::fmt::Debug for PowHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowHandler")
            .field("target_score", &self.config.target_score)
            .field("pow_type", &self.pow_type())
            .finish()
    }
}
