//! Worker configuration.
//!
//! Everything a [`CacheManager`](crate::CacheManager) needs is passed in
//! explicitly: the serving origin, the resource table of this version, the
//! app-shell key list, and the names of the three cache namespaces.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CacheError, Result};
use crate::resources::{ResourceTable, DEFAULT_APP_SHELL};

/// Lookup key of the persisted manifest inside the manifest namespace.
pub const MANIFEST_KEY: &str = "manifest";

/// Names of the three cache namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespaces {
    /// Durable store serving runtime fetches.
    pub content: String,
    /// App-shell files fetched during install, dropped after activation.
    pub temp: String,
    /// Holds the single persisted manifest.
    pub manifest: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            content: "flutter-app-cache".to_string(),
            temp: "flutter-temp-cache".to_string(),
            manifest: "flutter-app-manifest".to_string(),
        }
    }
}

impl Namespaces {
    pub fn all(&self) -> [&str; 3] {
        [&self.content, &self.temp, &self.manifest]
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    origin: String,
    scope: Url,
    resources: ResourceTable,
    app_shell: Vec<String>,
    namespaces: Namespaces,
}

impl WorkerConfig {
    /// Build a configuration for `origin` (`scheme://host[:port]`) using the
    /// default app shell and namespace names.
    pub fn new(origin: &str, resources: ResourceTable) -> Result<Self> {
        let parsed = Url::parse(origin)?;
        let origin = parsed.origin();
        if !origin.is_tuple() {
            return Err(CacheError::InvalidConfig(format!(
                "'{}' does not have a network origin",
                parsed
            )));
        }
        let origin = origin.ascii_serialization();
        let scope = Url::parse(&format!("{}/", origin))?;

        Ok(Self {
            origin,
            scope,
            resources,
            app_shell: DEFAULT_APP_SHELL.iter().map(|s| s.to_string()).collect(),
            namespaces: Namespaces::default(),
        })
    }

    pub fn with_app_shell<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app_shell = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Check that the app shell is drawn from the resource table and that the
    /// namespaces are distinct.
    pub fn validate(&self) -> Result<()> {
        if let Some(missing) = self
            .app_shell
            .iter()
            .find(|key| !self.resources.contains(key))
        {
            return Err(CacheError::InvalidConfig(format!(
                "app shell file '{}' is not in the resource table",
                missing
            )));
        }

        let names = self.namespaces.all();
        if names.iter().any(|name| name.is_empty()) {
            return Err(CacheError::InvalidConfig(
                "cache namespace names must not be empty".to_string(),
            ));
        }
        let unique: HashSet<&str> = names.iter().copied().collect();
        if unique.len() != names.len() {
            return Err(CacheError::InvalidConfig(
                "cache namespace names must be distinct".to_string(),
            ));
        }
        Ok(())
    }

    /// ASCII origin without trailing slash, e.g. `https://app.example.com`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Base URL resource keys are resolved against.
    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn app_shell(&self) -> &[String] {
        &self.app_shell
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }
}
