// Handshake state machine
//
// Pure: consumes response frames and says what to write next. I/O, the
// persisted flag and signalling live in the authenticator.

use super::frame::{
    auth_number_frame, encrypted_key_frame, send_key_frame, AuthCommand, AuthResponse,
    AuthStatus,
};
use crate::crypto::{encrypt_block, BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    Unauthenticated,
    /// Level-1 key written, waiting for the band to acknowledge it
    SendKey,
    /// Random number requested, waiting for the challenge
    AwaitingLevel2,
    /// Encrypted challenge written, waiting for the final ack
    AwaitingLevel3,
    Authenticated,
    Failed,
}

/// Outcome of one processed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Key acknowledged; request the random number
    SendAuthNumber,
    /// Challenge received; answer with its encryption
    SendEncryptedKey([u8; BLOCK_SIZE]),
    /// Final ack; the band now trusts this client
    Authenticated,
    /// The band answered with a failure status
    Rejected { command: u8 },
    /// Challenge payload was not a single cipher block
    InvalidChallenge { len: usize },
    /// Not a handshake frame this machine reacts to
    Ignored,
}

impl Transition {
    /// Frame to write in response, if any
    pub fn frame(&self) -> Option<Vec<u8>> {
        match self {
            Transition::SendAuthNumber => Some(auth_number_frame().to_vec()),
            Transition::SendEncryptedKey(ciphertext) => {
                Some(encrypted_key_frame(ciphertext).to_vec())
            }
            _ => None,
        }
    }

    /// True once the attempt can make no further progress
    pub fn is_final(&self) -> bool {
        matches!(self, Transition::Authenticated | Transition::Rejected { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    state: AuthState,
}

impl AuthSession {
    pub fn new() -> Self {
        Self {
            state: AuthState::Unauthenticated,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Entry frame for a new attempt. An authorized client skips level 1.
    pub fn start(&mut self, authorized: bool) -> Vec<u8> {
        if authorized {
            self.state = AuthState::AwaitingLevel2;
            auth_number_frame().to_vec()
        } else {
            self.state = AuthState::SendKey;
            send_key_frame().to_vec()
        }
    }

    /// Dispatch one response frame on (opcode, sub-command, status)
    pub fn on_frame(&mut self, frame: &[u8]) -> Transition {
        let Some(response) = AuthResponse::parse(frame) else {
            warn!("Ignoring short auth frame: {}", hex::encode(frame));
            return Transition::Ignored;
        };

        if response.status == AuthStatus::Fail {
            warn!(
                "Band rejected auth step 0x{:02x} in state {:?}",
                response.command, self.state
            );
            self.state = AuthState::Failed;
            return Transition::Rejected {
                command: response.command,
            };
        }

        let acknowledged = AuthCommand::from_byte(response.command)
            .filter(|command| response.acknowledges(*command));

        match acknowledged {
            Some(AuthCommand::SendKey) => {
                debug!("Level 1 acknowledged");
                self.state = AuthState::AwaitingLevel2;
                Transition::SendAuthNumber
            }
            Some(AuthCommand::RequestRandomNumber) => match encrypt_block(response.payload) {
                Ok(ciphertext) => {
                    debug!("Level 2 challenge received");
                    self.state = AuthState::AwaitingLevel3;
                    Transition::SendEncryptedKey(ciphertext)
                }
                Err(e) => {
                    warn!("Unusable auth challenge: {}", e);
                    Transition::InvalidChallenge {
                        len: response.payload.len(),
                    }
                }
            },
            Some(AuthCommand::SendEncryptedKey) => {
                debug!("Level 3 acknowledged");
                self.state = AuthState::Authenticated;
                Transition::Authenticated
            }
            None => {
                debug!("Ignoring auth frame {}", hex::encode(frame));
                Transition::Ignored
            }
        }
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}
