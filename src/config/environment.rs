//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.

use std::env;
use std::path::PathBuf;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// URL del proyecto Supabase (None = modo local puro)
    pub supabase_url: Option<String>,
    /// Clave anónima del proyecto
    pub supabase_anon_key: Option<String>,
    /// Bucket de object storage para las imágenes
    pub storage_bucket: String,
    /// Directorio de datos locales (fallback + cache offline)
    pub data_dir: PathBuf,
    /// Timeout del probe de conectividad inicial (segundos)
    pub probe_timeout_secs: u64,
    /// Reintentos del probe antes de caer a almacenamiento local
    pub probe_retries: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            supabase_url: env::var("SUPABASE_URL").ok().filter(|s| !s.is_empty()),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY").ok().filter(|s| !s.is_empty()),
            storage_bucket: env::var("SUPABASE_STORAGE_BUCKET")
                .unwrap_or_else(|_| "public".to_string()),
            data_dir: env::var("TALLER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            probe_timeout_secs: env::var("PROBE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            probe_retries: env::var("PROBE_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        }
    }
}

impl EnvironmentConfig {
    /// Verificar si Supabase está configurado (URL + clave presentes)
    pub fn is_supabase_configured(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_anon_key.is_some()
    }
}
