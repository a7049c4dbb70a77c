pub mod auth;
pub mod link;
pub mod project;

pub use auth::AuthService;
pub use link::LinkService;
pub use project::ProjectService;
