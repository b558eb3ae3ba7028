// Signed session token handling
// Mints and verifies the cookie credential that proves possession of a session

#![allow(dead_code)]

pub mod signer;

pub use signer::{TokenError, TokenSigner};
