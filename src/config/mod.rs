pub mod settings;
mod structs;
pub mod validators;

pub use settings::{
    FileSettingsStore, MemorySettingsStore, ScrapingSettings, SecureTokenManager, SettingsStore,
};
pub use structs::*;
