pub mod answer;
pub mod ask;
pub mod question;
pub mod team;
