pub mod chat_session;
pub mod identity;
pub mod message;
pub mod waiting_pool;
