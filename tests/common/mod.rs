#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Arc;

use fleet_mileage::config::ReconciliationConfig;
use fleet_mileage::models::{
    Company, CreateCompanyRequest, CreateReadingRequest, CreateVehicleRequest, MaintenanceEvent,
    MileageReading, ReadingSource, Vehicle,
};
use fleet_mileage::repositories::{FleetStore, FleetTx, InMemoryFleetRepository};
use fleet_mileage::services::{FleetService, ReadingService};

/// Flota mínima: una compañía con un vehículo, sobre el almacén en memoria
pub struct Fleet {
    pub repo: InMemoryFleetRepository,
    pub store: Arc<dyn FleetStore>,
    pub config: ReconciliationConfig,
    pub company: Company,
    pub vehicle: Vehicle,
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

pub async fn fleet() -> Fleet {
    let repo = InMemoryFleetRepository::new();
    let store: Arc<dyn FleetStore> = Arc::new(repo.clone());
    let fleet_service = FleetService::new(store.clone());

    let company = fleet_service
        .create_company(CreateCompanyRequest {
            name: "Transportes Norte".to_string(),
            tax_id: None,
            max_daily_km: None,
        })
        .await
        .unwrap();
    let vehicle = fleet_service
        .create_vehicle(company.id, plate("1234-ABC"))
        .await
        .unwrap();

    Fleet {
        repo,
        store,
        config: ReconciliationConfig::default(),
        company,
        vehicle,
    }
}

pub fn plate(license_plate: &str) -> CreateVehicleRequest {
    CreateVehicleRequest {
        license_plate: license_plate.to_string(),
        vin: None,
    }
}

impl Fleet {
    pub fn readings(&self) -> ReadingService {
        ReadingService::new(self.store.clone(), &self.config)
    }

    pub fn fleet_service(&self) -> FleetService {
        FleetService::new(self.store.clone())
    }

    /// Crea una lectura manual y devuelve su id
    pub async fn add_reading(&self, vehicle_id: i64, input_date: NaiveDate, km: i64) -> i64 {
        self.readings()
            .create_reading(
                vehicle_id,
                CreateReadingRequest {
                    input_date,
                    km_reported: km,
                    source: ReadingSource::Manual,
                },
            )
            .await
            .unwrap()
            .reading
            .id
    }

    pub async fn reading(&self, id: i64) -> MileageReading {
        let mut tx = self.store.begin_read_only().await.unwrap();
        let reading = tx.find_reading(id).await.unwrap().unwrap();
        tx.rollback().await.unwrap();
        reading
    }

    pub async fn vehicle(&self, id: i64) -> Vehicle {
        let mut tx = self.store.begin_read_only().await.unwrap();
        let vehicle = tx.find_vehicle(id).await.unwrap().unwrap();
        tx.rollback().await.unwrap();
        vehicle
    }

    pub async fn company(&self, id: i64) -> Company {
        let mut tx = self.store.begin_read_only().await.unwrap();
        let company = tx.find_company(id).await.unwrap().unwrap();
        tx.rollback().await.unwrap();
        company
    }

    pub async fn maintenance(&self, id: i64) -> MaintenanceEvent {
        let mut tx = self.store.begin_read_only().await.unwrap();
        let maintenance = tx.find_maintenance(id).await.unwrap().unwrap();
        tx.rollback().await.unwrap();
        maintenance
    }
}
