#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use sqlx::any::AnyPoolOptions;
use tempfile::TempDir;

use cms_tenant_router::config::AppConfig;
use cms_tenant_router::database::{bootstrap_with, DbPool, Routing, SqlxConnector};

/// A set of sqlite databases, one file per tenant, each holding a `marker`
/// row that names the database it lives in.
pub struct Fixture {
    dir: TempDir,
    vars: HashMap<String, String>,
}

impl Fixture {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp dir")?;
        let mut fixture = Self { dir, vars: HashMap::new() };

        fixture.seed("integrated_cms").await?;
        fixture.seed("douzone").await?;

        let default_url = fixture.url("integrated_cms");
        fixture.set_var("INTEGRATED_CMS_DATASOURCE_URL", &default_url);
        fixture.set_var("ROUTING_STATIC_TENANTS", "douzone");
        fixture.set_env_config("douzone");
        Ok(fixture)
    }

    pub fn path(&self, db: &str) -> PathBuf {
        self.dir.path().join(format!("{db}.db"))
    }

    pub fn url(&self, db: &str) -> String {
        format!("sqlite://{}?mode=rwc", self.path(db).display())
    }

    pub fn set_var(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    /// `<DB>_DATASOURCE_URL`, `<DB>_DB_USERNAME` and `<DB>_DB_PASSWORD` for a seeded database
    pub fn set_env_config(&mut self, db: &str) {
        let prefix = db.to_uppercase();
        let url = self.url(db);
        self.set_var(&format!("{prefix}_DATASOURCE_URL"), &url);
        self.set_var(&format!("{prefix}_DB_USERNAME"), "cms");
        self.set_var(&format!("{prefix}_DB_PASSWORD"), "unused");
    }

    pub fn lookup(&self) -> impl Fn(&str) -> Option<String> + '_ {
        move |key: &str| self.vars.get(key).cloned()
    }

    pub fn config(&self) -> AppConfig {
        AppConfig::from_lookup(self.lookup())
    }

    pub async fn routing(&self) -> Result<Routing<SqlxConnector>> {
        Ok(bootstrap_with(SqlxConnector::new(), &self.config(), self.lookup()).await?)
    }

    /// Create `<db>.db` with a single marker row naming it
    pub async fn seed(&self, db: &str) -> Result<()> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&self.url(db))
            .await
            .with_context(|| format!("failed to open {db}"))?;

        sqlx::query("CREATE TABLE IF NOT EXISTS marker (name TEXT NOT NULL)")
            .execute(&pool)
            .await?;
        sqlx::query("DELETE FROM marker").execute(&pool).await?;
        sqlx::query("INSERT INTO marker (name) VALUES (?)")
            .bind(db.to_string())
            .execute(&pool)
            .await?;

        pool.close().await;
        Ok(())
    }
}

/// Name of the database a pool is connected to
pub async fn read_marker(pool: &DbPool) -> Result<String> {
    let mut conn = pool.acquire().await?;
    let name: String = sqlx::query_scalar("SELECT name FROM marker")
        .fetch_one(&mut *conn)
        .await?;
    Ok(name)
}
