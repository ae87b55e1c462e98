pub mod chat;
pub mod lesson;
