pub mod log;
pub mod telegram;
