//! Configuración
//!
//! Este módulo contiene la configuración de la aplicación.

pub mod environment;

pub use environment::EnvironmentConfig;
