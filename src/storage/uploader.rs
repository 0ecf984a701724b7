//! Subida de imágenes a object storage
//!
//! Convierte payloads inline (data URLs) en URLs durables. La
//! clasificación de fallos viene del comportamiento observado del
//! backend: bucket inexistente es fatal, bloqueo por row-level security
//! degrada al payload inline (fallback solo para desarrollo).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::warn;

use crate::utils::AppError;

lazy_static! {
    static ref RE_BUCKET_MISSING: Regex = Regex::new(r"(?i)bucket|not found").unwrap();
    static ref RE_RLS: Regex = Regex::new(r"(?i)row-level security|violates.*policy").unwrap();
}

/// Contrato de subida de un payload inline a una ruta determinista.
///
/// Devuelve la URL resultante, o el payload original sin cambios como
/// fallback degradado cuando la política de permisos bloquea la subida.
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    async fn upload(&self, data_url: &str, path: &str) -> Result<String, AppError>;
}

// Clasifica el rechazo del backend de storage según su mensaje
fn classify_upload_error(bucket: &str, status: StatusCode, msg: &str) -> AppError {
    if RE_BUCKET_MISSING.is_match(msg) {
        AppError::BucketMissing(format!("{} — {}", bucket, msg))
    } else if RE_RLS.is_match(msg) {
        AppError::PermissionDenied(msg.to_string())
    } else {
        AppError::Storage(format!("subida falló ({}): {}", status, msg))
    }
}

/// Decodifica un data URL (`data:<mime>;base64,<payload>`)
pub(crate) fn parse_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.split(';').next().unwrap_or_default();
    let mime = if mime.is_empty() { "image/jpeg" } else { mime };
    let bytes = if meta.contains(";base64") {
        BASE64.decode(payload).ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime.to_string(), bytes))
}

/// Uploader contra el object storage de Supabase
#[derive(Clone)]
pub struct SupabaseUploader {
    http: Client,
    base_url: String,
    anon_key: String,
    bucket: String,
}

impl SupabaseUploader {
    pub fn new(http: Client, base_url: String, anon_key: String, bucket: String) -> Self {
        Self { http, base_url, anon_key, bucket }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}

#[async_trait]
impl ObjectUploader for SupabaseUploader {
    async fn upload(&self, data_url: &str, path: &str) -> Result<String, AppError> {
        let (mime, bytes) = parse_data_url(data_url)
            .ok_or_else(|| AppError::Storage("payload inline inválido".to_string()))?;

        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .header("x-upsert", "true")
            .header("cache-control", "3600")
            .header("Content-Type", mime)
            .body(bytes)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(self.public_url(path));
        }

        let status = response.status();
        let msg = response.text().await.unwrap_or_default();

        match classify_upload_error(&self.bucket, status, &msg) {
            // Fallback degradado: la imagen queda como blob inline, más
            // pesada pero sin pérdida de datos. No apto para producción.
            AppError::PermissionDenied(reason) => {
                warn!("⚠️ RLS bloquea subida a {}: {}; usando dataURL inline", path, reason);
                Ok(data_url.to_string())
            }
            err => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodifica_data_url_base64() {
        let (mime, bytes) = parse_data_url("data:image/png;base64,aG9sYQ==").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hola");
    }

    #[test]
    fn mime_por_defecto_es_jpeg() {
        let (mime, _) = parse_data_url("data:;base64,aG9sYQ==").unwrap();
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn rechaza_payloads_que_no_son_data_url() {
        assert!(parse_data_url("https://example.com/a.jpg").is_none());
        assert!(parse_data_url("data:sin-coma").is_none());
        assert!(parse_data_url("data:image/png;base64,@@@").is_none());
    }

    #[test]
    fn clasificacion_de_errores_de_subida() {
        let status = StatusCode::BAD_REQUEST;
        assert!(matches!(
            classify_upload_error("taller-images", status, "Bucket not found"),
            AppError::BucketMissing(_)
        ));
        assert!(matches!(
            classify_upload_error("taller-images", status, "new row violates row-level security policy"),
            AppError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_upload_error("taller-images", status, "internal server error"),
            AppError::Storage(_)
        ));
    }
}
