pub mod health;
pub mod scenes;
pub mod settings;
