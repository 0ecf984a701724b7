//! Cache
//!
//! Este módulo contiene el cache offline de la colección de vehículos.
//! Es un respaldo contra cortes de red transitorios, separado a propósito
//! del store local que sustituye al backend (invalidaciones distintas).

pub mod offline_cache;

pub use offline_cache::{OfflineCache, SyncInfo};
