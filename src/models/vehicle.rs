//! Modelo de vehículos del taller
//!
//! Define la forma del registro en el almacenamiento (JSON) y las
//! operaciones puras sobre él: normalización, orden y códigos de acceso.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Estados válidos de un vehículo en el taller
pub const ESTADOS_DISPONIBLES: [&str; 4] = [
    "En proceso",
    "Esperando piezas",
    "Listo para entrega",
    "Entregado",
];

/// Estado asignado en el intake
pub const ESTADO_DEFAULT: &str = "En proceso";

// Alfabeto de 34 símbolos, sin I ni O para evitar confusión
const ACCESS_CODE_CHARS: &[u8] = b"0123456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Una actualización de progreso (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub id: String,
    pub fecha: String,
    pub descripcion: String,
    #[serde(default)]
    pub imagenes: Vec<String>,
    #[serde(default)]
    pub thumbnails: Vec<String>,
    #[serde(rename = "createdBy", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Un registro de vehículo, una entrada por intake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub placa: String,
    #[serde(default)]
    pub marca: String,
    #[serde(default)]
    pub modelo: String,
    #[serde(rename = "año", default)]
    pub anio: String,
    pub cliente: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub problema: String,
    #[serde(default)]
    pub imagenes: Vec<String>,
    #[serde(default)]
    pub thumbnails: Vec<String>,
    #[serde(rename = "fechaIngreso")]
    pub fecha_ingreso: String,
    pub estado: String,
    #[serde(default)]
    pub actualizaciones: Vec<VehicleUpdate>,
    #[serde(rename = "accessCode", default, skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

/// Timestamp ISO-8601 en UTC con milisegundos
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parsea un `fechaIngreso`; None si no es una fecha usable
pub fn parse_fecha(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Algunos registros viejos guardan solo la fecha
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
}

fn string_of(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(obj: &Value, field: &str) -> String {
    match obj.get(field) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

// Arrays de imágenes: solo strings no vacíos sobreviven. Los índices de
// `imagenes` y `thumbnails` se filtran de forma independiente, igual que
// en el origen de los datos; el visor cae a la imagen completa cuando
// falta un thumbnail.
fn image_array(obj: &Value, field: &str) -> Vec<String> {
    match obj.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_update(raw: &Value) -> Option<VehicleUpdate> {
    if !raw.is_object() {
        return None;
    }
    let id = string_of(raw.get("id"))?;
    Some(VehicleUpdate {
        id,
        fecha: match raw.get("fecha") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => now_iso(),
        },
        descripcion: text_field(raw, "descripcion"),
        imagenes: image_array(raw, "imagenes"),
        thumbnails: image_array(raw, "thumbnails"),
        created_by: string_of(raw.get("createdBy")).filter(|s| !s.is_empty()),
    })
}

/// Normaliza un registro crudo para asegurar arrays, estado y fecha.
///
/// Devuelve `None` para valores que no son objetos o no traen un `id`
/// usable; esos registros se descartan de la colección cargada.
/// Idempotente: normalizar un vehículo ya normalizado no lo cambia.
pub fn normalize_vehicle(raw: &Value) -> Option<Vehicle> {
    if !raw.is_object() {
        return None;
    }
    let id = string_of(raw.get("id"))?;
    Some(Vehicle {
        id,
        placa: text_field(raw, "placa"),
        marca: text_field(raw, "marca"),
        modelo: text_field(raw, "modelo"),
        anio: text_field(raw, "año"),
        cliente: text_field(raw, "cliente"),
        telefono: text_field(raw, "telefono"),
        problema: text_field(raw, "problema"),
        imagenes: image_array(raw, "imagenes"),
        thumbnails: image_array(raw, "thumbnails"),
        fecha_ingreso: match raw.get("fechaIngreso") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => now_iso(),
        },
        estado: match raw.get("estado") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => ESTADO_DEFAULT.to_string(),
        },
        actualizaciones: match raw.get("actualizaciones") {
            Some(Value::Array(items)) => items.iter().filter_map(normalize_update).collect(),
            _ => Vec::new(),
        },
        access_code: string_of(raw.get("accessCode")).filter(|s| !s.is_empty()),
    })
}

/// Ordena la colección por `fechaIngreso` descendente (orden estable)
pub fn sort_vehicles(mut vehicles: Vec<Vehicle>) -> Vec<Vehicle> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    vehicles.sort_by_key(|v| std::cmp::Reverse(parse_fecha(&v.fecha_ingreso).unwrap_or(epoch)));
    vehicles
}

/// Genera un código de acceso para el portal del cliente.
///
/// Formato: `CAL-YYYY-XXXX` (ej: CAL-2025-7F3G). La unicidad es
/// probabilística; el repositorio re-genera si choca con un código ya
/// asignado.
pub fn generate_access_code() -> String {
    let year = Utc::now().year();
    let mut rng = rand::thread_rng();
    let code: String = (0..4)
        .map(|_| ACCESS_CODE_CHARS[rng.gen_range(0..ACCESS_CODE_CHARS.len())] as char)
        .collect();
    format!("CAL-{}-{}", year, code)
}

/// Búsqueda del portal de clientes: placa + código de acceso.
///
/// Ambos valores se comparan en mayúsculas; devuelve una vista de solo
/// lectura del vehículo encontrado.
pub fn find_for_customer<'a>(
    vehicles: &'a [Vehicle],
    placa: &str,
    codigo: &str,
) -> Option<&'a Vehicle> {
    let placa = placa.to_uppercase();
    let codigo = codigo.to_uppercase();
    vehicles
        .iter()
        .find(|v| v.placa.to_uppercase() == placa && v.access_code.as_deref() == Some(codigo.as_str()))
}
