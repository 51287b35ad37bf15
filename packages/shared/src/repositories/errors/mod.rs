pub mod session_repository_errors;
pub mod waiting_pool_repository_errors;
