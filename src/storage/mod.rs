//! Capa de almacenamiento
//!
//! Un único contrato asíncrono (list / get / set / delete) sobre dos
//! backends posibles: Supabase (PostgREST + object storage) o un store
//! local en disco. La decisión se toma una sola vez al inicializar y el
//! adaptador elegido se inyecta en el repositorio; no hay singletons.

pub mod local;
pub mod supabase;
pub mod uploader;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::EnvironmentConfig;
use crate::utils::AppError;

pub use local::LocalStorage;
pub use supabase::SupabaseStorage;
pub use uploader::{ObjectUploader, SupabaseUploader};

/// Prefijo de las claves de vehículos
pub const VEHICLE_KEY_PREFIX: &str = "vehicle:";

/// Backend activo de la sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Supabase,
    Local,
}

/// Un registro serializado con su clave
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub key: String,
    pub value: String,
}

/// Resultado de `list`; `items` solo viene cuando se pidió `full`
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    pub keys: Vec<String>,
    pub items: Option<Vec<StoredItem>>,
}

/// Contrato uniforme de almacenamiento.
///
/// Las lecturas devuelven errores tipados en lugar de tragárselos: el
/// repositorio es quien decide si degrada al cache offline o muestra
/// colección vacía. Las escrituras propagan el error al caller.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Lista las claves bajo `prefix`; con `full` incluye los valores
    /// serializados para evitar un round-trip por registro.
    async fn list(&self, prefix: &str, full: bool) -> Result<ListResult, AppError>;

    /// Obtiene un registro por clave; None si no existe
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Inserta o reemplaza el registro completo (upsert por id)
    async fn set(&self, key: &str, value: &str) -> Result<bool, AppError>;

    /// Elimina el registro del backend
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    fn backend(&self) -> BackendKind;
}

/// Inicializa el adaptador de almacenamiento para la sesión.
///
/// Si Supabase está configurado se hace un probe (list con límite 1 en el
/// bucket) con timeout explícito y reintentos acotados; si el probe no
/// pasa, la sesión cae permanentemente al store local. La decisión no se
/// re-evalúa hasta el próximo arranque.
pub async fn init_storage(config: &EnvironmentConfig) -> Result<Arc<dyn StorageAdapter>, AppError> {
    if config.is_supabase_configured() {
        let remote = SupabaseStorage::from_config(config)?;
        let timeout = Duration::from_secs(config.probe_timeout_secs);
        let attempts = config.probe_retries.max(1);

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, remote.probe()).await {
                Ok(Ok(())) => {
                    info!(
                        "✅ Supabase storage: bucket \"{}\" accesible",
                        config.storage_bucket
                    );
                    return Ok(Arc::new(remote));
                }
                Ok(Err(e)) => {
                    warn!("⚠️ Probe de Supabase falló (intento {}/{}): {}", attempt, attempts, e);
                }
                Err(_) => {
                    let e = AppError::Timeout(format!(
                        "probe del bucket {} superó los {}s",
                        config.storage_bucket, config.probe_timeout_secs
                    ));
                    warn!("⚠️ {} (intento {}/{})", e, attempt, attempts);
                }
            }
        }

        warn!(
            "⚠️ Supabase storage inaccesible: {}; usando almacenamiento local",
            config.storage_bucket
        );
    } else {
        info!("ℹ️ Supabase no configurado; usando almacenamiento local");
    }

    let local = LocalStorage::open(&config.data_dir)?;
    Ok(Arc::new(local))
}
