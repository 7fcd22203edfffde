//! Client for the SERPRO Integra Contador gateway.
//!
//! Authentication uses a PKCS#12 client certificate plus consumer key/secret
//! and yields a bearer token and a companion JWT, both cached in memory until
//! shortly before the server-declared expiry.

pub mod client;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod http;
pub mod token;

pub use client::{ApiMethod, EMIT_ENDPOINT, SerproClient};
pub use envelope::{DocumentRequest, RequestBuilder, TaxpayerType};
pub use error::SerproError;
