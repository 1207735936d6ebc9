pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod forms;
pub mod health;
pub mod pages;
