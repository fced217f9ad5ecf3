pub mod command;
pub mod health;
pub mod reply;
pub mod validation;
