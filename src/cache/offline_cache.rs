//! Cache offline de la colección
//!
//! Guarda en disco la última colección cargada con éxito, junto con
//! metadata de sincronización. Ningún método devuelve error al caller:
//! todo fallo se loguea y se traga, devolviendo None / no-op.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::Vehicle;

/// Metadata de la última sincronización exitosa
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncInfo {
    #[serde(rename = "lastSync")]
    pub last_sync: String,
    #[serde(rename = "vehicleCount")]
    pub vehicle_count: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    vehicles: Vec<Vehicle>,
    metadata: Option<SyncInfo>,
}

pub struct OfflineCache {
    cache_path: PathBuf,
}

impl OfflineCache {
    pub fn new(data_dir: &Path) -> Self {
        Self { cache_path: data_dir.join("offline_cache.json") }
    }

    fn read_file(&self) -> Option<CacheFile> {
        if !self.cache_path.exists() {
            return None;
        }
        let file = match File::open(&self.cache_path) {
            Ok(f) => f,
            Err(e) => {
                error!("❌ Error leyendo cache offline: {}", e);
                return None;
            }
        };
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                error!("❌ Cache offline corrupto, se ignora: {}", e);
                None
            }
        }
    }

    /// Sobrescribe la colección cacheada y registra la metadata de sync
    pub async fn cache_vehicles(&self, vehicles: &[Vehicle]) {
        let contents = CacheFile {
            vehicles: vehicles.to_vec(),
            metadata: Some(SyncInfo {
                last_sync: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                vehicle_count: vehicles.len(),
            }),
        };

        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.cache_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(&self.cache_path)?;
            serde_json::to_writer_pretty(BufWriter::new(file), &contents)
                .map_err(std::io::Error::other)?;
            Ok(())
        };

        match write() {
            Ok(()) => info!("✅ {} vehículos cacheados offline", vehicles.len()),
            Err(e) => error!("❌ Error cacheando vehículos: {}", e),
        }
    }

    /// Última colección conocida, o None si no hay cache usable
    pub async fn get_cached_vehicles(&self) -> Option<Vec<Vehicle>> {
        let cached = self.read_file()?;
        info!("📦 {} vehículos cargados del cache offline", cached.vehicles.len());
        Some(cached.vehicles)
    }

    /// Metadata de la última sincronización
    pub async fn last_sync_info(&self) -> Option<SyncInfo> {
        self.read_file()?.metadata
    }

    /// Elimina el cache
    pub async fn clear(&self) {
        if !self.cache_path.exists() {
            return;
        }
        match fs::remove_file(&self.cache_path) {
            Ok(()) => info!("🗑️ Cache offline limpiado"),
            Err(e) => error!("❌ Error limpiando cache offline: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalize_vehicle;
    use serde_json::json;

    fn vehicle(id: &str) -> Vehicle {
        normalize_vehicle(&json!({ "id": id, "placa": "ABC123", "cliente": "Juan" })).unwrap()
    }

    #[tokio::test]
    async fn guarda_y_recupera_la_coleccion() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());

        assert!(cache.get_cached_vehicles().await.is_none());

        let vehicles = vec![vehicle("1"), vehicle("2")];
        cache.cache_vehicles(&vehicles).await;

        let cached = cache.get_cached_vehicles().await.unwrap();
        assert_eq!(cached, vehicles);

        let info = cache.last_sync_info().await.unwrap();
        assert_eq!(info.vehicle_count, 2);
        assert!(!info.last_sync.is_empty());
    }

    #[tokio::test]
    async fn sobrescribe_la_coleccion_anterior() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());

        cache.cache_vehicles(&[vehicle("1"), vehicle("2")]).await;
        cache.cache_vehicles(&[vehicle("3")]).await;

        let cached = cache.get_cached_vehicles().await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "3");
    }

    #[tokio::test]
    async fn clear_deja_el_cache_vacio() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OfflineCache::new(dir.path());

        cache.cache_vehicles(&[vehicle("1")]).await;
        cache.clear().await;

        assert!(cache.get_cached_vehicles().await.is_none());
        assert!(cache.last_sync_info().await.is_none());
    }

    #[tokio::test]
    async fn cache_corrupto_se_trata_como_ausente() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("offline_cache.json"), "{no es json").unwrap();

        let cache = OfflineCache::new(dir.path());
        assert!(cache.get_cached_vehicles().await.is_none());
    }
}
