//! Capa de sincronización de datos del taller mecánico
//!
//! Unifica el backend remoto (Supabase) y un store local detrás de un
//! único contrato de almacenamiento, mantiene la colección de vehículos
//! en memoria con resiliencia offline, y ofrece búsqueda/filtrado puro
//! sobre esa colección. La capa de presentación consume el repositorio y
//! el motor de búsqueda; nada más.

pub mod cache;
pub mod config;
pub mod models;
pub mod repositories;
pub mod search;
pub mod storage;
pub mod utils;

pub use cache::{OfflineCache, SyncInfo};
pub use config::EnvironmentConfig;
pub use models::{Vehicle, VehicleUpdate};
pub use repositories::{CollectionSource, NewUpdate, NewVehicle, SaveStatus, VehicleRepository};
pub use search::{filter_vehicles, SearchFilters, SearchType};
pub use storage::{init_storage, BackendKind, StorageAdapter};
pub use utils::AppError;
