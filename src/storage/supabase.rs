//! Adaptador de almacenamiento sobre Supabase
//!
//! Registros en la tabla `vehicles` vía PostgREST (una fila `{id, data}`
//! por vehículo) e imágenes en object storage. En `set`, todo payload
//! inline se sube a una ruta determinista y se sustituye por su URL antes
//! de persistir; en `get`, las URLs del bucket se re-firman con vigencia
//! de 30 días.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{join_all, try_join_all};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use super::{BackendKind, ListResult, ObjectUploader, StorageAdapter, StoredItem, SupabaseUploader, VEHICLE_KEY_PREFIX};
use crate::config::EnvironmentConfig;
use crate::utils::AppError;

/// Vigencia de las URLs firmadas: 30 días
const SIGNED_URL_TTL_SECS: u64 = 60 * 60 * 24 * 30;

#[derive(Debug, Deserialize)]
struct VehicleRow {
    id: Value,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct GetRow {
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: Option<String>,
}

fn id_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Sube cada imagen inline del registro (nivel vehículo y por
/// actualización) y la reemplaza por la URL resultante. Las subidas de un
/// mismo array corren en paralelo preservando el orden; un fallo duro
/// aborta el `set` completo.
pub(crate) async fn replace_inline_images(
    record: &mut Value,
    vehicle_id: &str,
    uploader: &dyn ObjectUploader,
) -> Result<(), AppError> {
    let now = Utc::now().timestamp_millis();

    if let Some(images) = record.get("imagenes").and_then(Value::as_array).cloned() {
        let resolved = try_join_all(images.into_iter().enumerate().map(|(i, img)| {
            let path = format!("vehicles/{}/initial/{}_{}.jpg", vehicle_id, now, i);
            async move {
                match img {
                    Value::String(s) if s.starts_with("data:") => {
                        uploader.upload(&s, &path).await.map(Value::String)
                    }
                    other => Ok(other),
                }
            }
        }))
        .await?;
        if let Some(obj) = record.as_object_mut() {
            obj.insert("imagenes".to_string(), Value::Array(resolved));
        }
    }

    if let Some(updates) = record.get_mut("actualizaciones").and_then(Value::as_array_mut) {
        for upd in updates.iter_mut() {
            let upd_id = match upd.get("id") {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            let Some(images) = upd.get("imagenes").and_then(Value::as_array).cloned() else {
                continue;
            };
            let resolved = try_join_all(images.into_iter().enumerate().map(|(j, img)| {
                let sub = upd_id.clone().unwrap_or_else(|| format!("update_{}", j));
                let path = format!("vehicles/{}/updates/{}/{}_{}.jpg", vehicle_id, sub, now, j);
                async move {
                    match img {
                        Value::String(s) if s.starts_with("data:") => {
                            uploader.upload(&s, &path).await.map(Value::String)
                        }
                        other => Ok(other),
                    }
                }
            }))
            .await?;
            if let Some(obj) = upd.as_object_mut() {
                obj.insert("imagenes".to_string(), Value::Array(resolved));
            }
        }
    }

    Ok(())
}

/// Adaptador remoto: tabla `vehicles` + bucket de imágenes
pub struct SupabaseStorage {
    http: Client,
    base_url: String,
    anon_key: String,
    bucket: String,
    uploader: Arc<dyn ObjectUploader>,
}

impl SupabaseStorage {
    pub fn from_config(config: &EnvironmentConfig) -> Result<Self, AppError> {
        let base_url = config
            .supabase_url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("SUPABASE_URL no configurada".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let anon_key = config
            .supabase_anon_key
            .clone()
            .ok_or_else(|| AppError::Configuration("SUPABASE_ANON_KEY no configurada".to_string()))?;

        let http = Client::new();
        let uploader = SupabaseUploader::new(
            http.clone(),
            base_url.clone(),
            anon_key.clone(),
            config.storage_bucket.clone(),
        );

        Ok(Self {
            http,
            base_url,
            anon_key,
            bucket: config.storage_bucket.clone(),
            uploader: Arc::new(uploader),
        })
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    /// Probe de conectividad: list con límite 1 dentro del bucket
    pub async fn probe(&self) -> Result<(), AppError> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
        let response = self
            .request(Method::POST, url)
            .json(&serde_json::json!({ "prefix": "", "limit": 1 }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "probe del bucket {} devolvió HTTP {}",
                self.bucket,
                response.status()
            )));
        }
        Ok(())
    }

    fn strip_key<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(VEHICLE_KEY_PREFIX).unwrap_or(key)
    }

    // Ruta dentro del bucket, o None para data URLs y URLs ajenas
    fn object_path_of(&self, url: &str) -> Option<String> {
        if url.is_empty() || url.starts_with("data:") {
            return None;
        }
        let marker = format!("{}/", self.bucket);
        url.find(&marker).map(|idx| url[idx + marker.len()..].to_string())
    }

    /// Re-firma una URL del bucket; cualquier fallo deja la URL original
    async fn to_signed(&self, url: &str) -> String {
        let Some(path) = self.object_path_of(url) else {
            return url.to_string();
        };
        let sign_url = format!("{}/storage/v1/object/sign/{}/{}", self.base_url, self.bucket, path);
        let response = self
            .request(Method::POST, sign_url)
            .json(&serde_json::json!({ "expiresIn": SIGNED_URL_TTL_SECS }))
            .send()
            .await;
        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<SignResponse>().await {
                Ok(SignResponse { signed_url: Some(signed) }) => {
                    format!("{}/storage/v1{}", self.base_url, signed)
                }
                _ => url.to_string(),
            },
            _ => url.to_string(),
        }
    }

    async fn sign_array(&self, images: &[Value]) -> Vec<Value> {
        join_all(images.iter().map(|img| async move {
            match img.as_str() {
                Some(s) => Value::String(self.to_signed(s).await),
                None => img.clone(),
            }
        }))
        .await
    }

    /// Convierte toda referencia al bucket en URL firmada (30 días);
    /// payloads inline y URLs públicas ajenas pasan sin cambios.
    async fn ensure_accessible_urls(&self, record: &mut Value) {
        if let Some(images) = record.get("imagenes").and_then(Value::as_array).cloned() {
            let signed = self.sign_array(&images).await;
            if let Some(obj) = record.as_object_mut() {
                obj.insert("imagenes".to_string(), Value::Array(signed));
            }
        }
        if let Some(updates) = record.get_mut("actualizaciones").and_then(Value::as_array_mut) {
            for upd in updates.iter_mut() {
                let Some(images) = upd.get("imagenes").and_then(Value::as_array).cloned() else {
                    continue;
                };
                let signed = self.sign_array(&images).await;
                if let Some(obj) = upd.as_object_mut() {
                    obj.insert("imagenes".to_string(), Value::Array(signed));
                }
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for SupabaseStorage {
    async fn list(&self, prefix: &str, full: bool) -> Result<ListResult, AppError> {
        let select = if full { "id,data" } else { "id" };
        let url = format!("{}/rest/v1/vehicles?select={}", self.base_url, select);
        let response = self.request(Method::GET, url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "HTTP {} listando vehículos",
                response.status()
            )));
        }
        let rows: Vec<VehicleRow> = response.json().await?;

        let keys: Vec<String> = rows
            .iter()
            .map(|row| format!("{}{}", prefix, id_of(&row.id)))
            .collect();

        let items = if full {
            let mut items = Vec::with_capacity(rows.len());
            for row in &rows {
                items.push(StoredItem {
                    key: format!("{}{}", prefix, id_of(&row.id)),
                    value: serde_json::to_string(&row.data)?,
                });
            }
            Some(items)
        } else {
            None
        };

        Ok(ListResult { keys, items })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let id = self.strip_key(key);
        let url = format!("{}/rest/v1/vehicles?id=eq.{}&select=data", self.base_url, id);
        let response = self
            .request(Method::GET, url)
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await?;

        // PostgREST responde 406 (PGRST116) cuando no hay fila única
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE) {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "HTTP {} obteniendo vehículo {}",
                response.status(),
                id
            )));
        }

        let row: GetRow = response.json().await?;
        let mut record = row.data;
        self.ensure_accessible_urls(&mut record).await;
        Ok(Some(serde_json::to_string(&record)?))
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool, AppError> {
        let id = self.strip_key(key).to_string();
        let mut record: Value = serde_json::from_str(value)?;

        replace_inline_images(&mut record, &id, self.uploader.as_ref()).await?;

        let url = format!("{}/rest/v1/vehicles", self.base_url);
        let response = self
            .request(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&serde_json::json!([{ "id": id, "data": record }]))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("❌ Error guardando vehículo {}: HTTP {} {}", id, status, body);
            return Err(AppError::Storage(format!("Supabase save falló: {} {}", status, body)));
        }
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let id = self.strip_key(key);
        let url = format!("{}/rest/v1/vehicles?id=eq.{}", self.base_url, id);
        let response = self.request(Method::DELETE, url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "HTTP {} eliminando vehículo {}",
                response.status(),
                id
            )));
        }
        Ok(())
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Supabase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Uploader de prueba: registra rutas y devuelve URLs de CDN
    struct RecordingUploader {
        paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectUploader for RecordingUploader {
        async fn upload(&self, _data_url: &str, path: &str) -> Result<String, AppError> {
            self.paths.lock().unwrap().push(path.to_string());
            Ok(format!("https://cdn.example/{}", path))
        }
    }

    /// Uploader que simula bloqueo por RLS: devuelve el payload original
    struct DegradedUploader;

    #[async_trait]
    impl ObjectUploader for DegradedUploader {
        async fn upload(&self, data_url: &str, _path: &str) -> Result<String, AppError> {
            Ok(data_url.to_string())
        }
    }

    /// Uploader que simula bucket inexistente
    struct FailingUploader;

    #[async_trait]
    impl ObjectUploader for FailingUploader {
        async fn upload(&self, _data_url: &str, _path: &str) -> Result<String, AppError> {
            Err(AppError::BucketMissing("taller-images".to_string()))
        }
    }

    #[tokio::test]
    async fn sustituye_payloads_inline_por_urls() {
        let uploader = RecordingUploader { paths: Mutex::new(Vec::new()) };
        let mut record = json!({
            "id": "123",
            "imagenes": ["data:image/jpeg;base64,QUJD", "https://ya-subida.example/a.jpg"],
            "actualizaciones": [
                { "id": "u1", "imagenes": ["data:image/png;base64,REVG"] }
            ]
        });

        replace_inline_images(&mut record, "123", &uploader).await.unwrap();

        let imagenes = record["imagenes"].as_array().unwrap();
        assert!(imagenes[0].as_str().unwrap().starts_with("https://cdn.example/vehicles/123/initial/"));
        // Las URLs ya resueltas pasan sin cambios
        assert_eq!(imagenes[1], "https://ya-subida.example/a.jpg");

        let upd_imagenes = record["actualizaciones"][0]["imagenes"].as_array().unwrap();
        assert!(upd_imagenes[0]
            .as_str()
            .unwrap()
            .starts_with("https://cdn.example/vehicles/123/updates/u1/"));

        let paths = uploader.paths.lock().unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("_0.jpg"));
    }

    #[tokio::test]
    async fn degradacion_por_rls_conserva_el_payload() {
        let mut record = json!({ "id": "9", "imagenes": ["data:image/jpeg;base64,QUJD"] });
        replace_inline_images(&mut record, "9", &DegradedUploader).await.unwrap();
        assert_eq!(record["imagenes"][0], "data:image/jpeg;base64,QUJD");
    }

    #[tokio::test]
    async fn fallo_duro_de_subida_aborta_el_set() {
        let mut record = json!({ "id": "9", "imagenes": ["data:image/jpeg;base64,QUJD"] });
        let result = replace_inline_images(&mut record, "9", &FailingUploader).await;
        assert!(matches!(result, Err(AppError::BucketMissing(_))));
    }

    #[tokio::test]
    async fn registros_sin_imagenes_no_cambian() {
        let mut record = json!({ "id": "9", "cliente": "Ana" });
        let before = record.clone();
        let uploader = RecordingUploader { paths: Mutex::new(Vec::new()) };
        replace_inline_images(&mut record, "9", &uploader).await.unwrap();
        assert_eq!(record, before);
        assert!(uploader.paths.lock().unwrap().is_empty());
    }
}
