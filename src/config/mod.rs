pub mod loader;
pub mod schema;

pub use loader::{
    default_config_path, default_openclaw_json_path, expand_tilde, load_from_path, load_from_str,
    openclaw_home, save_model_aliases, ConfigError,
};
pub use schema::{AliasConfig, Fallback, PackConfig, DEFAULT_RESPONSE_PREFIX_TEMPLATE};
