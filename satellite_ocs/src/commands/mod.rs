pub mod handler;

pub use handler::{CommandHandler, spawn_receiver};
