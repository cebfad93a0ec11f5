//! Configuration module for the metrics resolver.
//!
//! Handles search bounds, suggestion settings and manifest discovery.

mod settings;

pub use settings::{
    expand_env_vars, JoinSettings, ManifestSettings, PathfinderSettings, Settings,
    SettingsError, SuggestionSettings,
};
