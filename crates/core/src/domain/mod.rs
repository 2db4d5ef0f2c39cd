pub mod account;
pub mod lenient;
pub mod records;
