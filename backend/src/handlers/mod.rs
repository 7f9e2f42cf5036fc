pub mod admin;
pub mod classes;
pub mod health;
pub mod me;
pub mod sessions;
