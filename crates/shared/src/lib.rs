pub mod api;
pub mod telegram;
