pub mod auth;
pub mod links;
pub mod qr;
pub mod redirect;
