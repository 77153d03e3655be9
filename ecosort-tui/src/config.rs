use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use ecosort_core::policy::ServicePolicy;

/// Storage engine selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StorageConfig {
    /// Backend id: `"sqlite"` or `"memory"`.
    pub backend: String,
    /// Database file path, used by the sqlite backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_owned(),
            path: PathBuf::from("ecosort.db"),
        }
    }
}

/// Everything the binary reads from `ecosort.toml` / `ECOSORT_*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub storage: StorageConfig,
    /// Accrual rates and the assigned-cancellation rule.
    pub policy: ServicePolicy,
    /// Register the demo accounts on startup (development convenience).
    pub seed_demo_accounts: bool,
    /// Where tracing output goes; the terminal itself belongs to the UI.
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            policy: ServicePolicy::default(),
            seed_demo_accounts: false,
            log_file: PathBuf::from("ecosort.log"),
        }
    }
}

/// Defaults, overridden by `ecosort.toml`, overridden by `ECOSORT_*`
/// environment variables (`ECOSORT_STORAGE__BACKEND=memory` etc.).
pub(crate) fn load() -> Result<AppConfig, figment::Error> {
    Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file("ecosort.toml"))
        .merge(Env::prefixed("ECOSORT_").split("__"))
        .extract()
}

#[cfg(test)]
mod tests {
    use ecosort_core::policy::AssignedCancelPolicy;
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_apply_without_any_config_file() {
        Jail::expect_with(|_jail| {
            let config = load().expect("defaults must load");
            assert_eq!(config.storage.backend, "sqlite");
            assert_eq!(config.policy.cancel_assigned, AssignedCancelPolicy::Either);
            assert!(!config.seed_demo_accounts);
            Ok(())
        });
    }

    #[test]
    fn toml_overrides_policy_knobs() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ecosort.toml",
                r#"
                seed_demo_accounts = true

                [storage]
                backend = "memory"

                [policy]
                cancel_assigned = "collector"

                [policy.points]
                default_rate = 5.0

                [policy.points.rates]
                e_waste = 25.0
                "#,
            )?;
            let config = load().expect("toml must load");
            assert_eq!(config.storage.backend, "memory");
            assert!(config.seed_demo_accounts);
            assert_eq!(
                config.policy.cancel_assigned,
                AssignedCancelPolicy::Collector
            );
            assert_eq!(config.policy.points.default_rate, 5.0);
            assert_eq!(config.policy.points.rates.get("e_waste"), Some(&25.0));
            Ok(())
        });
    }
}
