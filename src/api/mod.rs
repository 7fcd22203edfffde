pub mod auth;
pub mod documents;
pub mod error;
pub mod requisitions;
pub mod user;

pub use error::ApiError;
