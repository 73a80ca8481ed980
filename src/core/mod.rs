pub mod attachment;
pub mod config;
pub mod dispatch;
pub mod keyring;
pub mod message;
pub mod providers;
pub mod session;
pub mod storage;
