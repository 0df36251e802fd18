//! External collaborators: commands, the service manager and certbot

pub mod certs;
pub mod command;
pub mod controller;
