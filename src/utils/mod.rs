pub mod period;
pub mod taxpayer;
