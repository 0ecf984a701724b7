//! Modelos
//!
//! Este módulo contiene los modelos de datos del dominio.

pub mod vehicle;

pub use vehicle::{
    find_for_customer, generate_access_code, normalize_vehicle, sort_vehicles, Vehicle,
    VehicleUpdate, ESTADOS_DISPONIBLES, ESTADO_DEFAULT,
};
