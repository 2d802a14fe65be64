pub mod conversation;
pub mod outcome;
pub mod question;
