use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

use translator_core::ports::SettingsStore;

/// Settings kept as a flat JSON object on disk. Every write replaces the
/// whole file through a temp file in the same directory.
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileSettings {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings {}", path.display()))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("Settings file {} is not a JSON object of strings", path.display()))?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = values.len(), "settings loaded");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        let mut next = values.clone();
        apply(&mut next);
        let data = serde_json::to_vec_pretty(&next).context("Failed to serialize settings")?;
        write_via_temp(&self.path, &data)?;
        *values = next;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

fn write_via_temp(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
    let mut temp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(data).context("Failed to write settings")?;
    temp.flush().context("Failed to flush settings")?;
    temp.persist(target)
        .with_context(|| format!("Failed to replace settings {}", target.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = JsonFileSettings::open(&path).unwrap();
        assert_eq!(settings.get("apiKey"), None);
        settings.set("apiKey", "k1").unwrap();
        settings.set("defaultLanguage", "Turkish").unwrap();

        let reopened = JsonFileSettings::open(&path).unwrap();
        assert_eq!(reopened.get("apiKey").as_deref(), Some("k1"));
        assert_eq!(reopened.get("defaultLanguage").as_deref(), Some("Turkish"));
    }

    #[test]
    fn remove_deletes_the_key_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let settings = JsonFileSettings::open(&path).unwrap();
        settings.set("apiKey", "k1").unwrap();

        settings.remove("apiKey").unwrap();

        let on_disk: BTreeMap<String, String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(on_disk.is_empty());
        assert_eq!(settings.get("apiKey"), None);
    }

    #[test]
    fn garbage_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2").unwrap();

        assert!(JsonFileSettings::open(&path).is_err());
    }
}
