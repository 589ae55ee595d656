//! Configuration for mapdiff merge sessions.
//!
//! Configuration is read from `configuration/base.*`, an optional environment specific file and
//! `APP_`-prefixed environment variables. See [`load::load_config`].

pub mod environment;
pub mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
