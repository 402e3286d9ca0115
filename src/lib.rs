pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod layout;
pub mod processing;

pub use error::{Error, Result};

pub mod tasks {
    pub mod loader;
    pub mod viewer;
}
