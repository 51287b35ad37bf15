pub mod reply_generator;
pub mod text_filter;
