//! Repositorio de vehículos
//!
//! Dueño único de la colección en memoria y de todos los flujos de
//! mutación. Media entre el adaptador de almacenamiento y el cache
//! offline: las cargas exitosas se escriben al cache, y cuando el backend
//! no responde la colección se adopta desde el cache marcada como stale.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cache::OfflineCache;
use crate::models::vehicle::now_iso;
use crate::models::{
    generate_access_code, normalize_vehicle, sort_vehicles, Vehicle, VehicleUpdate, ESTADO_DEFAULT,
};
use crate::storage::{StorageAdapter, VEHICLE_KEY_PREFIX};

/// De dónde salió la colección actual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionSource {
    /// Carga fresca desde el backend
    Live,
    /// Backend caído; datos del cache offline (potencialmente stale)
    Cache,
    /// Backend caído y sin cache: colección vacía
    Empty,
}

/// Indicador transitorio de guardado para la capa de presentación.
///
/// Transiciones: `Saving` inmediato al iniciar la mutación, luego
/// `Saved` / `Error` que se auto-limpian a `Idle` (2 s / 3 s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error(String),
}

// El contador de generación evita que el timer de limpieza de una
// operación vieja pise el estado de una más nueva.
struct StatusSlot {
    status: SaveStatus,
    generation: u64,
}

/// Datos del formulario de intake; el resto se sintetiza al crear
#[derive(Debug, Clone, Default)]
pub struct NewVehicle {
    pub placa: String,
    pub marca: String,
    pub modelo: String,
    pub anio: String,
    pub cliente: String,
    pub telefono: String,
    pub problema: String,
    pub imagenes: Vec<String>,
    pub thumbnails: Vec<String>,
}

/// Datos de una actualización de progreso
#[derive(Debug, Clone, Default)]
pub struct NewUpdate {
    pub descripcion: String,
    pub imagenes: Vec<String>,
    pub thumbnails: Vec<String>,
    pub created_by: Option<String>,
}

pub struct VehicleRepository {
    storage: Arc<dyn StorageAdapter>,
    cache: OfflineCache,
    vehicles: RwLock<Vec<Vehicle>>,
    source: RwLock<CollectionSource>,
    status: Arc<RwLock<StatusSlot>>,
}

impl VehicleRepository {
    pub fn new(storage: Arc<dyn StorageAdapter>, cache: OfflineCache) -> Self {
        Self {
            storage,
            cache,
            vehicles: RwLock::new(Vec::new()),
            source: RwLock::new(CollectionSource::Empty),
            status: Arc::new(RwLock::new(StatusSlot { status: SaveStatus::Idle, generation: 0 })),
        }
    }

    /// Vista de solo lectura de la colección actual
    pub async fn vehicles(&self) -> Vec<Vehicle> {
        self.vehicles.read().await.clone()
    }

    pub async fn source(&self) -> CollectionSource {
        *self.source.read().await
    }

    /// La colección viene del cache offline (backend caído al cargar)
    pub async fn is_stale(&self) -> bool {
        *self.source.read().await == CollectionSource::Cache
    }

    pub async fn save_status(&self) -> SaveStatus {
        self.status.read().await.status.clone()
    }

    /// Recarga la colección completa desde el backend.
    ///
    /// Éxito: parsear (los registros malformados se descartan),
    /// normalizar, ordenar descendente y escribir al cache offline.
    /// Fallo: adoptar el cache si existe, o colección vacía.
    pub async fn reload(&self) -> CollectionSource {
        match self.storage.list(VEHICLE_KEY_PREFIX, true).await {
            Ok(result) => {
                let items = result.items.unwrap_or_default();
                let parsed: Vec<Vehicle> = items
                    .iter()
                    .filter_map(|item| match serde_json::from_str(&item.value) {
                        Ok(raw) => normalize_vehicle(&raw),
                        Err(e) => {
                            warn!("⚠️ Registro malformado descartado ({}): {}", item.key, e);
                            None
                        }
                    })
                    .collect();
                let collection = sort_vehicles(parsed);

                info!("✅ {} vehículos cargados del backend", collection.len());
                self.cache.cache_vehicles(&collection).await;

                *self.vehicles.write().await = collection;
                *self.source.write().await = CollectionSource::Live;
                CollectionSource::Live
            }
            Err(e) => {
                if e.is_transient() {
                    warn!("⚠️ Error recargando vehículos: {}", e);
                } else {
                    error!("❌ Error recargando vehículos: {}", e);
                }
                match self.cache.get_cached_vehicles().await {
                    Some(cached) => {
                        *self.vehicles.write().await = cached;
                        *self.source.write().await = CollectionSource::Cache;
                        CollectionSource::Cache
                    }
                    None => {
                        *self.vehicles.write().await = Vec::new();
                        *self.source.write().await = CollectionSource::Empty;
                        CollectionSource::Empty
                    }
                }
            }
        }
    }

    /// Se volvió a tener conexión: si la colección era del cache,
    /// re-entrar al ciclo de carga (Cached → Live)
    pub async fn handle_connectivity_restored(&self) {
        if self.is_stale().await {
            info!("🌐 Conexión restaurada; resincronizando vehículos");
            self.reload().await;
        }
    }

    async fn transition_status(&self, status: SaveStatus) -> u64 {
        let mut slot = self.status.write().await;
        slot.generation += 1;
        slot.status = status;
        slot.generation
    }

    fn schedule_status_clear(&self, generation: u64, delay: Duration) {
        let status = Arc::clone(&self.status);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut slot = status.write().await;
            if slot.generation == generation {
                slot.status = SaveStatus::Idle;
            }
        });
    }

    /// Persiste un registro completo (cambios de estado incluidos) y
    /// recarga la colección para reflejar efectos del backend, como la
    /// sustitución de payloads inline por URLs.
    pub async fn save_vehicle(&self, vehicle: &Vehicle) -> bool {
        self.transition_status(SaveStatus::Saving).await;

        let payload = match serde_json::to_string(vehicle) {
            Ok(p) => p,
            Err(e) => {
                error!("❌ Error serializando vehículo {}: {}", vehicle.id, e);
                let generation = self.transition_status(SaveStatus::Error(e.to_string())).await;
                self.schedule_status_clear(generation, Duration::from_secs(3));
                return false;
            }
        };

        let key = format!("{}{}", VEHICLE_KEY_PREFIX, vehicle.id);
        match self.storage.set(&key, &payload).await {
            Ok(_) => {
                self.reload().await;
                let generation = self.transition_status(SaveStatus::Saved).await;
                self.schedule_status_clear(generation, Duration::from_secs(2));
                true
            }
            Err(e) => {
                error!("❌ Error al guardar vehículo {}: {}", vehicle.id, e);
                let generation = self.transition_status(SaveStatus::Error(e.to_string())).await;
                self.schedule_status_clear(generation, Duration::from_secs(3));
                false
            }
        }
    }

    // Regenera hasta no chocar con un código ya asignado en la colección
    async fn unique_access_code(&self) -> String {
        let vehicles = self.vehicles.read().await;
        let mut code = generate_access_code();
        let mut attempts = 0;
        while attempts < 100
            && vehicles.iter().any(|v| v.access_code.as_deref() == Some(code.as_str()))
        {
            code = generate_access_code();
            attempts += 1;
        }
        code
    }

    /// Alta de un vehículo desde el formulario de intake
    pub async fn add_vehicle(&self, partial: NewVehicle) -> bool {
        let now = Utc::now();
        let vehicle = Vehicle {
            id: now.timestamp_millis().to_string(),
            placa: partial.placa,
            marca: partial.marca,
            modelo: partial.modelo,
            anio: partial.anio,
            cliente: partial.cliente,
            telefono: partial.telefono,
            problema: partial.problema,
            imagenes: partial.imagenes,
            thumbnails: partial.thumbnails,
            fecha_ingreso: now_iso(),
            estado: ESTADO_DEFAULT.to_string(),
            actualizaciones: Vec::new(),
            access_code: Some(self.unique_access_code().await),
        };
        self.save_vehicle(&vehicle).await
    }

    /// Agrega una actualización de progreso al vehículo indicado.
    ///
    /// Solo busca en la colección en memoria; si el id no está, devuelve
    /// `false` sin tocar el backend ni la colección.
    pub async fn add_update(&self, vehicle_id: &str, partial: NewUpdate) -> bool {
        let target = {
            let vehicles = self.vehicles.read().await;
            vehicles.iter().find(|v| v.id == vehicle_id).cloned()
        };
        let Some(mut target) = target else {
            warn!("⚠️ Vehículo {} no encontrado; actualización descartada", vehicle_id);
            return false;
        };

        target.actualizaciones.push(VehicleUpdate {
            id: Utc::now().timestamp_millis().to_string(),
            fecha: now_iso(),
            descripcion: partial.descripcion,
            imagenes: partial.imagenes,
            thumbnails: partial.thumbnails,
            created_by: partial.created_by,
        });
        self.save_vehicle(&target).await
    }

    /// Borra el registro del backend y recarga.
    ///
    /// El cache offline no se toca aquí; queda actualizado en la recarga
    /// posterior.
    pub async fn delete_vehicle(&self, vehicle_id: &str) -> bool {
        self.transition_status(SaveStatus::Saving).await;

        let key = format!("{}{}", VEHICLE_KEY_PREFIX, vehicle_id);
        match self.storage.delete(&key).await {
            Ok(()) => {
                self.reload().await;
                let generation = self.transition_status(SaveStatus::Saved).await;
                self.schedule_status_clear(generation, Duration::from_secs(2));
                true
            }
            Err(e) => {
                error!("❌ Error eliminando vehículo {}: {}", vehicle_id, e);
                let generation = self.transition_status(SaveStatus::Error(e.to_string())).await;
                self.schedule_status_clear(generation, Duration::from_secs(3));
                false
            }
        }
    }
}

// Nota de concurrencia: las mutaciones no se serializan entre sí. Si dos
// operaciones corren a la vez, el último `set` gana y el anterior puede
// quedar pisado tras la siguiente recarga (last-write-wins asumido).
