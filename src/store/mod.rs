pub mod link;
pub mod project;
pub mod user;

pub use link::{LinkStore, LinkStoreError, RedisPool};
pub use project::ProjectRepository;
pub use user::UserRepository;
