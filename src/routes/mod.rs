pub mod admin;
pub mod drivers;
pub mod orders;
