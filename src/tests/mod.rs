pub mod helpers;

mod auth;
