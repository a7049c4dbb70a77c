pub mod link;
pub mod project;
pub mod user;
