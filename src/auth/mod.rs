//! Authentication against the Rackspace Cloud identity endpoint
//!
//! # Overview
//!
//! Cloud Databases uses the legacy Rackspace token exchange: a single GET
//! to the auth endpoint with the username and API key in headers. The
//! flow works as follows:
//!
//! 1. GET the auth URL with `X-Auth-User` / `X-Auth-Key` headers
//! 2. A 204 response returns the bearer token in `X-Auth-Token` and the
//!    account id at the end of `X-Server-Management-Url`
//! 3. The account-scoped management URL is constructed for the configured
//!    region and parsed into a [`ServiceLocation`]
//! 4. Token and location together form the connection's [`Session`]
//!
//! A [`Session`] is either fully populated or absent; re-authentication
//! replaces it wholesale. [`crate::Connection`] drives this module - both
//! at construction and transparently when a token expires.

mod authenticator;
mod session;

pub use authenticator::authenticate;
pub use session::{Credentials, Region, ServiceLocation, Session};
