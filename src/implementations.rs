pub mod amount;
pub mod billing;
