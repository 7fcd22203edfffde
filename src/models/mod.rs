pub mod jwt;
pub mod requisition;
pub mod user;
