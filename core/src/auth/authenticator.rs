// Band authentication
//
// The band answers every handshake write with a notification on the auth
// characteristic. The platform delivers those from its own context, so the
// value-changed callback only forwards frames into a channel. A spawned
// `HandshakeDriver` drains the channel, runs the state machine, writes the next
// level and reports one `Transition` per processed frame back to the caller.

use super::flag::AuthorizationFlag;
use super::session::{AuthSession, Transition};
use crate::transport::uuids;
use crate::transport::{CharacteristicHandle, GattResolver, TransportError, ValueChangedCallback};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Authentication timed out after {0:?}")]
    Timeout(Duration),
}

/// When `authenticate` hands control back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompletionMode {
    /// After the first response frame has been processed. The rest of the
    /// handshake continues in the background.
    #[default]
    FirstFrame,
    /// After the band accepted or rejected the handshake
    Handshake,
}

/// Per-call authentication options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    pub completion: CompletionMode,
    /// Upper bound for one attempt. `None` waits for as long as it takes.
    pub timeout: Option<Duration>,
    /// Extra attempts after a rejected or timed-out one
    pub retries: u32,
}

impl AuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(mut self, completion: CompletionMode) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Wait for the band's verdict rather than the first response
    pub fn full_handshake(self) -> Self {
        self.with_completion(CompletionMode::Handshake)
    }
}

/// Runs the challenge-response handshake against the connected band
#[derive(Clone)]
pub struct Authenticator {
    resolver: GattResolver,
    flag: AuthorizationFlag,
}

impl Authenticator {
    pub fn new(resolver: GattResolver, flag: AuthorizationFlag) -> Self {
        Self { resolver, flag }
    }

    pub fn flag(&self) -> &AuthorizationFlag {
        &self.flag
    }

    /// Authenticate with the band.
    ///
    /// Returns the persisted authorization flag at the moment the call
    /// unblocks. Without a timeout, a band that never answers keeps the call
    /// pending forever.
    pub async fn authenticate(&self, options: &AuthOptions) -> Result<bool, AuthError> {
        let attempts = options.retries.saturating_add(1);

        for attempt in 1..=attempts {
            info!("Authenticating band (attempt {}/{})", attempt, attempts);

            let mut driver = None;
            let result = match options.timeout {
                Some(limit) => {
                    tokio::time::timeout(limit, self.attempt(options.completion, &mut driver))
                        .await
                        .unwrap_or(Err(AuthError::Timeout(limit)))
                }
                None => self.attempt(options.completion, &mut driver).await,
            };

            let retry = match &result {
                Ok(Transition::Rejected { .. }) | Err(AuthError::Timeout(_)) => attempt < attempts,
                _ => false,
            };
            if retry {
                warn!("Authentication attempt {} did not succeed, retrying", attempt);
                if let Some(driver) = driver {
                    // No frame may reach the previous driver once the next
                    // entry frame is written.
                    driver.abort();
                    let _ = driver.await;
                }
                continue;
            }

            result?;
            return Ok(self.flag.is_set());
        }

        Ok(self.flag.is_set())
    }

    async fn attempt(
        &self,
        completion: CompletionMode,
        driver: &mut Option<JoinHandle<()>>,
    ) -> Result<Transition, AuthError> {
        let mut signals = self.begin(driver).await?;

        loop {
            match signals.recv().await {
                Some(transition) => {
                    if completion == CompletionMode::FirstFrame || transition.is_final() {
                        return Ok(transition);
                    }
                }
                // Nothing will ever signal this attempt again.
                None => return std::future::pending().await,
            }
        }
    }

    /// Subscribe, start the driver and write the entry frame. Returns the
    /// signal receiver of this attempt; the driver's handle lands in `driver`.
    async fn begin(
        &self,
        driver: &mut Option<JoinHandle<()>>,
    ) -> Result<mpsc::UnboundedReceiver<Transition>, AuthError> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let Some(handle) = self.resolver.resolve(uuids::AUTH).await? else {
            warn!("Auth characteristic unavailable, handshake cannot start");
            return Ok(signal_rx);
        };

        if !self.resolver.enable_notifications(&handle).await {
            warn!("Notifications on {} not enabled", handle);
        }

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let auth_uuid = handle.uuid;
        let callback: ValueChangedCallback = Arc::new(move |source: Uuid, value: Vec<u8>| {
            if source != auth_uuid {
                trace!("Ignoring notification from {}", source);
                return;
            }
            let _ = frame_tx.send(value);
        });
        if !self.resolver.subscribe(&handle, callback) {
            warn!("No value-changed handler on {}", handle);
        }

        let mut session = AuthSession::new();
        let entry = session.start(self.flag.is_set());

        let handshake = HandshakeDriver {
            resolver: self.resolver.clone(),
            flag: self.flag.clone(),
            handle: handle.clone(),
            session,
            frames: frame_rx,
            signals: signal_tx,
        };
        *driver = Some(tokio::spawn(handshake.run()));

        if !self.resolver.write(&handle, &entry).await {
            warn!("Handshake entry frame was not sent");
        }

        Ok(signal_rx)
    }
}

/// Processes auth notifications one at a time for a single attempt
struct HandshakeDriver {
    resolver: GattResolver,
    flag: AuthorizationFlag,
    handle: CharacteristicHandle,
    session: AuthSession,
    frames: mpsc::UnboundedReceiver<Vec<u8>>,
    signals: mpsc::UnboundedSender<Transition>,
}

impl HandshakeDriver {
    async fn run(mut self) {
        // Ends when the subscription is replaced or the link drops the handler.
        while let Some(frame) = self.frames.recv().await {
            let transition = self.session.on_frame(&frame);

            if let Some(next) = transition.frame() {
                if !self.resolver.write(&self.handle, &next).await {
                    warn!("Handshake frame not sent in state {:?}", self.session.state());
                }
            }

            let done = transition == Transition::Authenticated;
            if done {
                match self.flag.set() {
                    Ok(()) => info!("Band authenticated"),
                    Err(e) => error!("Band authenticated but flag not stored: {}", e),
                }
            }

            if self.signals.send(transition).is_err() {
                debug!("Authentication caller gone, continuing in background");
            }

            if done {
                break;
            }
        }
        debug!("Handshake driver stopped in state {:?}", self.session.state());
    }
}
