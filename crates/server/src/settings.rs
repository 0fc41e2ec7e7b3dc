//! Persisted import and site settings under `{DATA_DIR}/settings/`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use intake_core::persist::JsonFile;
use intake_core::Result;
use intake_ingest::ImportLimit;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSettings {
    pub limit: Option<u32>,
}

/// Where the effective import limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LimitSource {
    Settings,
    Env,
    Unset,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SiteSettings {
    #[serde(default)]
    pub text_field_1: String,
    /// Read-only; always taken from the environment when served.
    #[serde(default, skip_deserializing)]
    pub text_field_2: Option<String>,
    #[serde(default)]
    pub public_file: Option<Uuid>,
    #[serde(default)]
    pub public_file_url: Option<String>,
    #[serde(default)]
    pub private_file: Option<Uuid>,
    #[serde(default)]
    pub private_file_url: Option<String>,
}

/// Settings under `{DATA_DIR}/settings/`, read from disk on every call so
/// the server and the CLI see each other's changes.
pub struct SettingsStore {
    import: JsonFile,
    site: JsonFile,
    env_limit: Option<u32>,
    env_text_field_2: Option<String>,
}

impl SettingsStore {
    pub fn open(
        data_dir: &Path,
        env_limit: Option<u32>,
        env_text_field_2: Option<String>,
    ) -> Result<Self> {
        let dir = data_dir.join("settings");
        let store = Self {
            import: JsonFile::new(dir.join("import.json")),
            site: JsonFile::new(dir.join("site.json")),
            env_limit,
            env_text_field_2,
        };
        // Fail at startup rather than on first request if either file is corrupt.
        store.import.read::<ImportSettings>()?;
        store.site.read::<SiteSettings>()?;
        Ok(store)
    }

    // ── Import ────────────────────────────────────────────────────

    /// Persisted setting first, then the environment. No built-in default.
    pub fn import_limit(&self) -> Result<(Option<ImportLimit>, LimitSource)> {
        let saved: ImportSettings = self.import.read()?;
        if let Some(limit) = saved.limit.and_then(ImportLimit::new) {
            return Ok((Some(limit), LimitSource::Settings));
        }
        Ok(match self.env_limit.and_then(ImportLimit::new) {
            Some(limit) => (Some(limit), LimitSource::Env),
            None => (None, LimitSource::Unset),
        })
    }

    pub fn set_import_limit(&self, limit: ImportLimit) -> Result<()> {
        self.import.update(|settings: &mut ImportSettings| -> Result<()> {
            settings.limit = Some(limit.get());
            Ok(())
        })
    }

    // ── Site ──────────────────────────────────────────────────────

    pub fn site(&self) -> Result<SiteSettings> {
        let mut site: SiteSettings = self.site.read()?;
        site.text_field_2 = self.env_text_field_2.clone();
        Ok(site)
    }

    /// Apply `change` to the site settings and persist the result.
    pub fn update_site<F>(&self, change: F) -> Result<SiteSettings>
    where
        F: FnOnce(&mut SiteSettings),
    {
        self.site.update(|site: &mut SiteSettings| -> Result<()> {
            change(site);
            site.text_field_2 = None;
            Ok(())
        })?;
        self.site()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_precedence() {
        let tmp = tempfile::tempdir().unwrap();
        let unset = SettingsStore::open(tmp.path(), None, None).unwrap();
        assert_eq!(unset.import_limit().unwrap(), (None, LimitSource::Unset));

        let store = SettingsStore::open(tmp.path(), Some(50), None).unwrap();
        assert_eq!(store.import_limit().unwrap(), (ImportLimit::new(50), LimitSource::Env));

        store.set_import_limit(ImportLimit::new(2).unwrap()).unwrap();
        assert_eq!(store.import_limit().unwrap(), (ImportLimit::new(2), LimitSource::Settings));

        // A store opened earlier picks up the change without reopening.
        assert_eq!(unset.import_limit().unwrap().1, LimitSource::Settings);

        let reopened = SettingsStore::open(tmp.path(), Some(50), None).unwrap();
        assert_eq!(reopened.import_limit().unwrap().1, LimitSource::Settings);
    }

    #[test]
    fn test_text_field_2_comes_from_env_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(tmp.path(), None, Some("from env".to_string())).unwrap();

        let site = store
            .update_site(|s| {
                s.text_field_1 = "hello".to_string();
                s.text_field_2 = Some("ignored".to_string());
            })
            .unwrap();
        assert_eq!(site.text_field_1, "hello");
        assert_eq!(site.text_field_2.as_deref(), Some("from env"));

        let raw = std::fs::read_to_string(tmp.path().join("settings/site.json")).unwrap();
        assert!(!raw.contains("ignored"));
    }
}
