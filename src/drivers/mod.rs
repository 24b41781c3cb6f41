pub mod max30102;
pub mod max30205;

pub use max30102::{create_default_ppg, Max30102};
pub use max30205::Max30205;
