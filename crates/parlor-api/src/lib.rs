pub mod devices;
pub mod error;
pub mod mail;
pub mod messages;
pub mod presence;
pub mod replies;
pub mod rooms;
pub mod state;
pub mod tokens;
