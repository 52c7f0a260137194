//! # resfeed
//!
//! Client for the Resident Feedback API: sign-in and registration, the resident
//! roster, and surgical assessments.
//!
//! ## Sessions
//!
//! A `CredentialStore` holds the access/refresh token pair and the signed-in
//! identity, persisting the pair through a `SecretStore` backend. It is passed
//! explicitly to the `AuthenticatedClient`; there is no global session.
//!
//! ## Token refresh
//!
//! An authorized request answered with `401` triggers one refresh followed by
//! one retry of the original request. Concurrent 401s share a single refresh.
//! A refresh that fails, or that completes after the session was cleared,
//! leaves the stored tokens untouched and surfaces as `Unauthenticated`.

pub mod api;
pub mod cli;
pub mod client;
pub mod session;

pub use client::{
    ApiError, ApiRequest, ApiResponse, AuthenticatedClient, ClientConfig, Environment,
    RequestBody, SessionState,
};
pub use session::{CredentialStore, Identity, TokenPair};
