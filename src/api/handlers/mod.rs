pub mod auth;
pub mod catalog;
pub mod password;
pub mod profile;
pub mod students;
pub mod term_results;
