pub(crate) mod admin;
pub(crate) mod drivers;
pub(crate) mod health;
pub(crate) mod orders;
