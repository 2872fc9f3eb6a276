//! Environment naming convention for tenant data sources.
//!
//! For tenant `douzone` the variables are `DOUZONE_DATASOURCE_URL`,
//! `DOUZONE_DB_USERNAME` and `DOUZONE_DB_PASSWORD`. Characters that are not
//! valid in a shell variable name map to `_`, so `service-1` reads
//! `SERVICE_1_DATASOURCE_URL`.

pub const DATASOURCE_URL: &str = "DATASOURCE_URL";
pub const DB_USERNAME: &str = "DB_USERNAME";
pub const DB_PASSWORD: &str = "DB_PASSWORD";

/// Upper-cased variable prefix for a tenant id.
pub fn env_prefix(tenant_id: &str) -> String {
    tenant_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Full variable name for `tenant_id` and `suffix`.
pub fn env_key(tenant_id: &str, suffix: &str) -> String {
    format!("{}_{}", env_prefix(tenant_id), suffix)
}

/// Connection parameters discovered for one tenant.
#[derive(Clone)]
pub struct DataSourceVars {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl DataSourceVars {
    /// Read all three parameters through `lookup`.
    ///
    /// Returns `None` unless every value is present and non-empty.
    pub fn read<F>(tenant_id: &str, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |suffix: &str| lookup(&env_key(tenant_id, suffix)).filter(|v| !v.trim().is_empty());

        Some(Self {
            url: fetch(DATASOURCE_URL)?,
            username: fetch(DB_USERNAME)?,
            password: fetch(DB_PASSWORD)?,
        })
    }

    /// Read from the process environment.
    pub fn from_env(tenant_id: &str) -> Option<Self> {
        Self::read(tenant_id, process_env)
    }
}

impl std::fmt::Debug for DataSourceVars {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceVars")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Lookup function backed by `std::env`.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn keys_are_upper_cased_and_sanitized() {
        assert_eq!(env_key("douzone", DATASOURCE_URL), "DOUZONE_DATASOURCE_URL");
        assert_eq!(env_key("service-1", DB_USERNAME), "SERVICE_1_DB_USERNAME");
        assert_eq!(env_key("integrated_cms", DB_PASSWORD), "INTEGRATED_CMS_DB_PASSWORD");
    }

    #[test]
    fn all_three_values_are_required() {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("ACME_DATASOURCE_URL".into(), "mysql://db:3306/acme".into());
        vars.insert("ACME_DB_USERNAME".into(), "acme".into());

        assert!(DataSourceVars::read("acme", |k| vars.get(k).cloned()).is_none());

        vars.insert("ACME_DB_PASSWORD".into(), "   ".into());
        assert!(DataSourceVars::read("acme", |k| vars.get(k).cloned()).is_none());

        vars.insert("ACME_DB_PASSWORD".into(), "secret".into());
        let found = DataSourceVars::read("acme", |k| vars.get(k).cloned()).unwrap();
        assert_eq!(found.url, "mysql://db:3306/acme");
        assert_eq!(found.username, "acme");
        assert!(!format!("{found:?}").contains("secret"));
    }
}
