//! Authentication frame layouts
//!
//! Requests are `[level, 0x08, ...]`. Responses from the band are
//! `[0x10, sub-command, status, payload...]`, where the payload is only present
//! on the random-number answer.

use crate::crypto::{BLOCK_SIZE, SECRET_KEY};

/// Opcode of every handshake response
pub const RESPONSE_OPCODE: u8 = 0x10;

/// Second byte of every handshake request
pub const AUTH_FLAGS: u8 = 0x08;

pub const STATUS_SUCCESS: u8 = 0x01;
pub const STATUS_FAIL: u8 = 0x04;

/// Handshake step, used both as request level and response sub-command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthCommand {
    SendKey = 0x01,
    RequestRandomNumber = 0x02,
    SendEncryptedKey = 0x03,
}

impl AuthCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::SendKey),
            0x02 => Some(Self::RequestRandomNumber),
            0x03 => Some(Self::SendEncryptedKey),
            _ => None,
        }
    }
}

/// Status byte of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Success,
    Fail,
    Other(u8),
}

impl From<u8> for AuthStatus {
    fn from(byte: u8) -> Self {
        match byte {
            STATUS_SUCCESS => Self::Success,
            STATUS_FAIL => Self::Fail,
            other => Self::Other(other),
        }
    }
}

/// Level 1: hand the secret key to the band (18 bytes)
pub fn send_key_frame() -> [u8; 2 + BLOCK_SIZE] {
    let mut frame = [0u8; 2 + BLOCK_SIZE];
    frame[0] = AuthCommand::SendKey as u8;
    frame[1] = AUTH_FLAGS;
    frame[2..].copy_from_slice(&SECRET_KEY);
    frame
}

/// Level 2: ask the band for a random number
pub fn auth_number_frame() -> [u8; 2] {
    [AuthCommand::RequestRandomNumber as u8, AUTH_FLAGS]
}

/// Level 3: return the encrypted random number (18 bytes)
pub fn encrypted_key_frame(ciphertext: &[u8; BLOCK_SIZE]) -> [u8; 2 + BLOCK_SIZE] {
    let mut frame = [0u8; 2 + BLOCK_SIZE];
    frame[0] = AuthCommand::SendEncryptedKey as u8;
    frame[1] = AUTH_FLAGS;
    frame[2..].copy_from_slice(ciphertext);
    frame
}

/// A response frame received on the auth characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse<'a> {
    pub opcode: u8,
    pub command: u8,
    pub status: AuthStatus,
    pub payload: &'a [u8],
}

impl<'a> AuthResponse<'a> {
    /// Split a frame into its header fields; `None` if shorter than the header
    pub fn parse(frame: &'a [u8]) -> Option<Self> {
        match frame {
            [opcode, command, status, payload @ ..] => Some(Self {
                opcode: *opcode,
                command: *command,
                status: AuthStatus::from(*status),
                payload,
            }),
            _ => None,
        }
    }

    /// True for a successful response to `command`
    pub fn acknowledges(&self, command: AuthCommand) -> bool {
        self.opcode == RESPONSE_OPCODE
            && self.command == command as u8
            && self.status == AuthStatus::Success
    }
}
