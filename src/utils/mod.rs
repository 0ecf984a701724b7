//! Utilidades
//!
//! Este módulo contiene las utilidades compartidas del sistema.

pub mod errors;

pub use errors::AppError;
