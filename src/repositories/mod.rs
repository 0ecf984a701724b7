//! Repositorios
//!
//! Este módulo contiene el repositorio que orquesta carga, mutación y
//! resincronización de la colección de vehículos.

pub mod vehicle_repository;

pub use vehicle_repository::{
    CollectionSource, NewUpdate, NewVehicle, SaveStatus, VehicleRepository,
};
