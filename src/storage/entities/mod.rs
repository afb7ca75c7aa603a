pub mod conversations;
pub mod diaries;
pub mod messages;
