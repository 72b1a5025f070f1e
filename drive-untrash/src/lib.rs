pub mod auth;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod oauth_flow;
pub mod restore;
pub mod session;
pub mod storage;
