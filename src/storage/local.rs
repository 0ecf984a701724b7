//! Almacenamiento local de respaldo
//!
//! Mapa clave→valor persistido en `storage.json` dentro del directorio de
//! datos. Sustituye por completo al backend remoto cuando este no está
//! configurado o el probe inicial falla; los payloads inline se quedan
//! inline (no hay object storage en modo local).

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::{BackendKind, ListResult, StorageAdapter, StoredItem};
use crate::utils::AppError;

pub struct LocalStorage {
    store_path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl LocalStorage {
    /// Abre (o crea) el store en el directorio de datos
    pub fn open(data_dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(data_dir)?;
        let store_path = data_dir.join("storage.json");

        let entries = if store_path.exists() {
            let file = File::open(&store_path)?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).unwrap_or_default()
        } else {
            HashMap::new()
        };

        info!("📁 Almacenamiento local en {}", store_path.display());
        Ok(Self { store_path, entries: Mutex::new(entries) })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), AppError> {
        let file = File::create(&self.store_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, entries)?;
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn list(&self, prefix: &str, full: bool) -> Result<ListResult, AppError> {
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();

        let items = if full {
            Some(
                keys.iter()
                    .filter_map(|k| {
                        entries.get(k).map(|v| StoredItem { key: k.clone(), value: v.clone() })
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(ListResult { keys, items })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool, AppError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VEHICLE_KEY_PREFIX;

    #[tokio::test]
    async fn set_get_y_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::open(dir.path()).unwrap();

        assert!(store.get("vehicle:1").await.unwrap().is_none());
        store.set("vehicle:1", "{\"id\":\"1\"}").await.unwrap();
        assert_eq!(store.get("vehicle:1").await.unwrap().unwrap(), "{\"id\":\"1\"}");

        store.delete("vehicle:1").await.unwrap();
        assert!(store.get("vehicle:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filtra_por_prefijo() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::open(dir.path()).unwrap();
        store.set("vehicle:1", "a").await.unwrap();
        store.set("vehicle:2", "b").await.unwrap();
        store.set("otra:3", "c").await.unwrap();

        let result = store.list(VEHICLE_KEY_PREFIX, false).await.unwrap();
        assert_eq!(result.keys, vec!["vehicle:1", "vehicle:2"]);
        assert!(result.items.is_none());

        let result = store.list(VEHICLE_KEY_PREFIX, true).await.unwrap();
        let items = result.items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value, "a");
    }

    #[tokio::test]
    async fn los_datos_sobreviven_una_reapertura() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStorage::open(dir.path()).unwrap();
            store.set("vehicle:1", "persistido").await.unwrap();
        }
        let store = LocalStorage::open(dir.path()).unwrap();
        assert_eq!(store.get("vehicle:1").await.unwrap().unwrap(), "persistido");
    }
}
