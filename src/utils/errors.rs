//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores de la capa de
//! sincronización y su clasificación (transitorio / permisos /
//! configuración / no encontrado).

use thiserror::Error;

/// Errores principales de la capa de almacenamiento
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bucket error: {0}")]
    BucketMissing(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl AppError {
    /// Un error transitorio no invalida el backend; el caller puede
    /// degradar a datos cacheados y reintentar más tarde.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Http(_) | AppError::Timeout(_) | AppError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_los_fallos_de_red_son_transitorios() {
        assert!(AppError::Storage("backend caído".to_string()).is_transient());
        assert!(AppError::Timeout("probe superó los 8s".to_string()).is_transient());

        assert!(!AppError::Configuration("SUPABASE_URL no configurada".to_string()).is_transient());
        assert!(!AppError::BucketMissing("taller-images".to_string()).is_transient());
        assert!(!AppError::PermissionDenied("RLS".to_string()).is_transient());
    }
}
