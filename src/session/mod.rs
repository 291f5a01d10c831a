//! Session lifecycle orchestration
//!
//! [`SessionManager`] is the single entry point the HTTP layer talks to. It
//! combines the pure token codec with the shared session cache to provide the
//! stateful guarantees stateless tokens cannot: revocation on logout,
//! single-use refresh, and login throttling.

pub mod manager;

pub use manager::SessionManager;
