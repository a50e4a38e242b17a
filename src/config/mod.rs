pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, load_or_default, ConfigError, RuleSource};
pub use schema::{
    DiscoveryConfig, Exemptions, MethodRule, RuleConfig, ValidationError, ValidationIssue,
    DEFAULT_EMPTY_CHECK_HELPER, DEFAULT_HELPER_MODULE,
};
