// Band challenge cipher: AES-128, ECB, no padding, fixed pre-shared key
//
// The band sends a 16-byte random number during the handshake and expects it
// back encrypted under the same key that was handed over at level 1. ECB has
// no IV, so the mapping is a pure function of the input block.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use thiserror::Error;

/// Cipher block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Pre-shared secret, identical on the band and in the level-1 frame
pub const SECRET_KEY: [u8; 16] = [
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x40, 0x41, 0x42, 0x43, 0x44,
    0x45,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid input size: {0} bytes is not a whole number of {BLOCK_SIZE}-byte blocks")]
    InputSize(usize),
}

fn cipher() -> Aes128 {
    Aes128::new(GenericArray::from_slice(&SECRET_KEY))
}

/// Encrypt exactly one 16-byte block
pub fn encrypt_block(plaintext: &[u8]) -> Result<[u8; BLOCK_SIZE], CipherError> {
    if plaintext.len() != BLOCK_SIZE {
        return Err(CipherError::InputSize(plaintext.len()));
    }

    let mut block = GenericArray::clone_from_slice(plaintext);
    cipher().encrypt_block(&mut block);

    let mut output = [0u8; BLOCK_SIZE];
    output.copy_from_slice(&block);
    Ok(output)
}

/// Encrypt a whole number of blocks, each independently
pub fn encrypt_ecb(data: &[u8]) -> Result<Vec<u8>, CipherError> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::InputSize(data.len()));
    }

    let cipher = cipher();
    let mut output = data.to_vec();
    for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(output)
}
