//! Credential handling.
//!
//! `CredentialHasher` derives storable salted password digests of the form
//! `"<hex_hmac>,<salt>"` and verifies presented passwords against them.
//! The digest keys HMAC-SHA256 with `salt + secret` over `username +
//! password`, so a stored digest is bound to its username and does not
//! survive a rename.
//!
//! ## Design Decisions
//! - The server secret is injected at construction time — there is no
//!   module-level secret to mutate.
//! - No password policy lives here: even the empty string hashes. Policy
//!   enforcement is a deliberately pluggable step upstream of the hasher.

pub mod hasher;

pub use hasher::CredentialHasher;
