pub mod health;
pub mod services;
