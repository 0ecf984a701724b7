//! Motor de búsqueda y filtrado
//!
//! Filtrado puro y síncrono sobre la colección en memoria. No toca
//! almacenamiento ni estado compartido; preserva el orden relativo.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::vehicle::parse_fecha;
use crate::models::Vehicle;

/// Campo contra el que se compara `search_value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Placa,
    Cliente,
    Marca,
    Modelo,
}

/// Filtros activos; todos los predicados se combinan con AND
#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub search_type: SearchType,
    pub search_value: String,
    /// Estado exacto, o vacío / "todos" para no filtrar
    pub estado: String,
    /// Fecha mínima de ingreso (inclusive), `YYYY-MM-DD` o ISO-8601
    pub fecha_desde: String,
    /// Fecha máxima de ingreso; se extiende a fin de día (23:59:59.999)
    pub fecha_hasta: String,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            search_type: SearchType::Placa,
            search_value: String::new(),
            estado: String::new(),
            fecha_desde: String::new(),
            fecha_hasta: String::new(),
        }
    }
}

fn parse_filter_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
}

// Fin de día del límite superior, para incluir el día completo
fn end_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    let eod = dt
        .date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| dt.naive_utc());
    DateTime::from_naive_utc_and_offset(eod, Utc)
}

fn matches(vehicle: &Vehicle, filters: &SearchFilters) -> bool {
    // Búsqueda por texto contra un único campo, sin distinguir mayúsculas
    if !filters.search_value.is_empty() {
        let needle = filters.search_value.to_lowercase();
        let haystack = match filters.search_type {
            SearchType::Placa => &vehicle.placa,
            SearchType::Cliente => &vehicle.cliente,
            SearchType::Marca => &vehicle.marca,
            SearchType::Modelo => &vehicle.modelo,
        };
        if !haystack.to_lowercase().contains(&needle) {
            return false;
        }
    }

    // Estado: match exacto, "todos" muestra todo
    if !filters.estado.is_empty() && filters.estado != "todos" && vehicle.estado != filters.estado {
        return false;
    }

    // Rango de fechas inclusivo; vehículos con fecha ilegible no se excluyen
    let fecha = parse_fecha(&vehicle.fecha_ingreso);
    if !filters.fecha_desde.is_empty() {
        if let (Some(fecha), Some(desde)) = (fecha, parse_filter_date(&filters.fecha_desde)) {
            if fecha < desde {
                return false;
            }
        }
    }
    if !filters.fecha_hasta.is_empty() {
        if let (Some(fecha), Some(hasta)) = (fecha, parse_filter_date(&filters.fecha_hasta)) {
            if fecha > end_of_day(hasta) {
                return false;
            }
        }
    }

    true
}

/// Filtra la colección según los filtros activos.
///
/// Función pura: sin filtros devuelve la colección tal cual, y el orden
/// relativo de entrada se preserva siempre.
pub fn filter_vehicles(vehicles: &[Vehicle], filters: &SearchFilters) -> Vec<Vehicle> {
    vehicles
        .iter()
        .filter(|v| matches(v, filters))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalize_vehicle;
    use serde_json::json;

    fn vehicle(placa: &str, cliente: &str, estado: &str, fecha: &str) -> Vehicle {
        normalize_vehicle(&json!({
            "id": placa,
            "placa": placa,
            "cliente": cliente,
            "estado": estado,
            "fechaIngreso": fecha,
        }))
        .unwrap()
    }

    fn fixture() -> Vec<Vehicle> {
        vec![
            vehicle("ABC123", "Juan", "En proceso", "2025-03-10T09:00:00.000Z"),
            vehicle("XYZ789", "abcel", "Entregado", "2025-03-10T23:59:59.999Z"),
            vehicle("KLM456", "Maria", "En proceso", "2025-03-11T00:00:00.000Z"),
        ]
    }

    #[test]
    fn sin_filtros_es_identidad() {
        let vehicles = fixture();
        let result = filter_vehicles(&vehicles, &SearchFilters::default());
        assert_eq!(result, vehicles);
    }

    #[test]
    fn busca_solo_en_el_campo_seleccionado() {
        let vehicles = fixture();
        // "abc" aparece en la placa del primero y en el cliente del segundo;
        // buscando por placa solo debe salir el primero
        let result = filter_vehicles(
            &vehicles,
            &SearchFilters {
                search_type: SearchType::Placa,
                search_value: "abc".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].placa, "ABC123");

        let result = filter_vehicles(
            &vehicles,
            &SearchFilters {
                search_type: SearchType::Cliente,
                search_value: "ABC".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].placa, "XYZ789");
    }

    #[test]
    fn estado_exacto_y_todos() {
        let vehicles = fixture();
        let result = filter_vehicles(
            &vehicles,
            &SearchFilters {
                estado: "En proceso".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(result.len(), 2);

        let result = filter_vehicles(
            &vehicles,
            &SearchFilters {
                estado: "todos".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn fecha_hasta_incluye_el_dia_completo() {
        let vehicles = fixture();
        let result = filter_vehicles(
            &vehicles,
            &SearchFilters {
                fecha_hasta: "2025-03-10".to_string(),
                ..Default::default()
            },
        );
        let placas: Vec<&str> = result.iter().map(|v| v.placa.as_str()).collect();
        // 23:59:59.999 del día 10 entra; 00:00:00.000 del día 11 no
        assert_eq!(placas, vec!["ABC123", "XYZ789"]);
    }

    #[test]
    fn fecha_desde_es_inclusiva() {
        let vehicles = fixture();
        let result = filter_vehicles(
            &vehicles,
            &SearchFilters {
                fecha_desde: "2025-03-11".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].placa, "KLM456");
    }

    #[test]
    fn predicados_se_combinan_con_and() {
        let vehicles = fixture();
        let result = filter_vehicles(
            &vehicles,
            &SearchFilters {
                search_type: SearchType::Cliente,
                search_value: "maria".to_string(),
                estado: "Entregado".to_string(),
                ..Default::default()
            },
        );
        assert!(result.is_empty());
    }
}
