pub mod auth;
pub mod cab;
pub mod order;
pub mod payment;
pub mod user;
