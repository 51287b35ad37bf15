pub mod chat_service_errors;
pub mod matchmaking_service_errors;
