// Cryptography module: handshake cipher

pub mod cipher;

pub use cipher::{encrypt_block, encrypt_ecb, CipherError, BLOCK_SIZE, SECRET_KEY};
