pub mod chats;
pub mod config;
pub mod documents;
pub mod health;
