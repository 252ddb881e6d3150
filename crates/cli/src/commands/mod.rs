pub mod chat;
pub mod grade;
