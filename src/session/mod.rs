//! User and player sessions

pub mod player;
pub mod user;

pub use player::PlayerSession;
pub use user::UserSession;
