pub mod auth;
pub mod fraud;
pub mod results;
pub mod vote;
