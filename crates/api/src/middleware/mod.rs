//! Request extractors.
//!
//! - [`session::CallerSession`] -- Resolves the caller's session from the `x-session-id` header.

pub mod session;
