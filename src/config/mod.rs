/// Configuration loaded from TOML with endpoint overrides from the environment

pub mod settings;

pub use settings::*;
