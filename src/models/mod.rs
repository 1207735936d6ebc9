pub mod auth;
pub mod donation;
pub mod log;
pub mod principal;
pub mod profile;
pub mod submission;
