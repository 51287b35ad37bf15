pub mod errors;
pub mod session_repository;
pub mod waiting_pool_repository;
