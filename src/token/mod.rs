//! Opaque token issuance and verification
//!
//! Tokens are the JSON-serialized [`TokenPayload`] sealed with AES-256-GCM and
//! encoded as base64url. The only supported way to read a token's contents is
//! [`TokenCodec::verify`]; nothing about a token is inspectable on the wire.
//!
//! Verification is pure: it proves cryptographic validity and freshness but
//! deliberately knows nothing about revocation. Callers that need the full
//! authorization answer go through the session manager.

pub mod codec;
pub mod payload;

pub use codec::{TokenCodec, TokenPair, NONCE_SIZE, SYMMETRIC_KEY_SIZE};
pub use payload::TokenPayload;
