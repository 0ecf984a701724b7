use anyhow::Result;
use dotenvy::dotenv;
use tracing::{error, info, warn};

use taller_sync::cache::OfflineCache;
use taller_sync::config::EnvironmentConfig;
use taller_sync::repositories::{CollectionSource, VehicleRepository};
use taller_sync::storage::init_storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("🔧 Taller Mecánico - Sincronización de vehículos");
    info!("================================================");

    let config = EnvironmentConfig::default();

    let storage = match init_storage(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("❌ Error inicializando almacenamiento: {}", e);
            return Err(anyhow::anyhow!("Error de almacenamiento: {}", e));
        }
    };

    let cache = OfflineCache::new(&config.data_dir);
    let repository = VehicleRepository::new(storage, cache);

    let source = repository.reload().await;
    let vehicles = repository.vehicles().await;

    match source {
        CollectionSource::Live => info!("✅ {} vehículos sincronizados", vehicles.len()),
        CollectionSource::Cache => {
            warn!("⚠️ Backend no disponible; mostrando {} vehículos del cache offline", vehicles.len())
        }
        CollectionSource::Empty => warn!("⚠️ Backend no disponible y sin cache offline"),
    }

    for vehicle in &vehicles {
        info!(
            "🚗 {} — {} [{}] ingreso {}",
            vehicle.placa, vehicle.cliente, vehicle.estado, vehicle.fecha_ingreso
        );
    }

    Ok(())
}
