// src/models/mod.rs

pub mod course;
pub mod question;
pub mod section;
pub mod user;
pub mod user_answer;
