pub mod chat_service;
pub mod errors;
pub mod matchmaking_service;
