pub mod data;
pub mod io;

pub use data::{path_display, Config, SecretStorage};
pub use io::ConfigError;
