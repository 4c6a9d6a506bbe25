pub mod chat;
pub mod config;
pub mod greeter;
pub mod monitor;
pub mod roster;
pub mod scheduler;
