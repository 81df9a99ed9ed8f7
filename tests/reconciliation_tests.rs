mod common;

use common::{date, fleet, Fleet};
use fleet_mileage::models::{
    CreateMaintenanceRequest, CreateReadingRequest, MaintenanceAlertType, MaintenanceKmStatus, ReadingSource,
    ReadingStatus, SourceRecord, UpdateMaintenanceRequest, UpdateReadingRequest,
};
use fleet_mileage::repositories::{FailurePoint, FleetTx};
use fleet_mileage::services::correlation_check_service::CorrelationKind;
use fleet_mileage::services::{MaintenanceChange, MaintenanceService, RevalidationService, SyncAction};
use fleet_mileage::utils::errors::AppError;

#[tokio::test]
async fn test_single_point_history_is_never_conflictive() {
    let fleet = fleet().await;
    let id = fleet.add_reading(fleet.vehicle.id, date(3, 1), 12_000).await;

    let report = fleet.readings().detect_conflicts(id).await.unwrap();
    assert!(!report.has_conflict);
    assert!(!report.current_is_conflictive);
    assert_eq!(report.valid_records, vec![id]);

    let reading = fleet.reading(id).await;
    assert_eq!(reading.status, ReadingStatus::Original);
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 12_000);
}

#[tokio::test]
async fn test_window_marks_reading_outside_longest_sequence() {
    let fleet = fleet().await;
    let d1 = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    let d2 = fleet.add_reading(fleet.vehicle.id, date(3, 2), 90).await;
    let d3 = fleet.add_reading(fleet.vehicle.id, date(3, 3), 95).await;
    let d4 = fleet.add_reading(fleet.vehicle.id, date(3, 4), 110).await;

    let report = fleet.readings().detect_conflicts(d4).await.unwrap();
    assert!(report.has_conflict);
    assert!(!report.current_is_conflictive);
    assert_eq!(report.valid_records, vec![d2, d3, d4]);
    assert_eq!(report.conflictive_ids().into_iter().collect::<Vec<_>>(), vec![d1]);
    assert!(report.conflictive_records[0]
        .reasons
        .iter()
        .any(|r| r.starts_with("KM superior al registro posterior")));
}

#[tokio::test]
async fn test_revalidation_is_idempotent_on_stable_window() {
    let fleet = fleet().await;
    for (day, km) in [(1, 100), (2, 90), (3, 95), (4, 110)] {
        fleet.add_reading(fleet.vehicle.id, date(3, day), km).await;
    }
    let last = fleet.add_reading(fleet.vehicle.id, date(3, 5), 130).await;

    let revalidation = RevalidationService::new(&fleet.config);
    let mut tx = fleet.store.begin().await.unwrap();
    let pivot = tx.find_reading(last).await.unwrap().unwrap();

    revalidation.revalidate(tx.as_mut(), &pivot, None).await.unwrap();
    let second = revalidation.revalidate(tx.as_mut(), &pivot, None).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(second.changed_count(), 0);
}

#[tokio::test]
async fn test_deleting_middle_reading_resets_neighbor() {
    let fleet = fleet().await;
    let first = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    fleet.add_reading(fleet.vehicle.id, date(3, 3), 300).await;
    let middle = fleet.add_reading(fleet.vehicle.id, date(3, 2), 50).await;

    // El pivote nuevo gana el empate y deja fuera la primera lectura
    assert_ne!(fleet.reading(first).await.status, ReadingStatus::Original);

    fleet.readings().delete_reading(middle, None, false).await.unwrap();

    let reading = fleet.reading(first).await;
    assert_eq!(reading.status, ReadingStatus::Original);
    assert_eq!(reading.km_normalized, None);
    assert!(reading.conflict_reasons.is_empty());
}

#[tokio::test]
async fn test_manual_edit_marks_reading_as_edited() {
    let fleet = fleet().await;
    fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    let second = fleet.add_reading(fleet.vehicle.id, date(3, 2), 200).await;

    let mutation = fleet
        .readings()
        .update_reading(
            second,
            UpdateReadingRequest {
                km_normalized: Some(250),
                ..UpdateReadingRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(mutation.reading.status, ReadingStatus::Edited);
    assert_eq!(mutation.reading.effective_km(), 250);
    assert_eq!(
        mutation.reading.correction_notes.as_deref(),
        Some("Editado manualmente. KM anterior: 200")
    );
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 250);
}

#[tokio::test]
async fn test_empty_edit_is_rejected() {
    let fleet = fleet().await;
    let id = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;

    let err = fleet
        .readings()
        .update_reading(id, UpdateReadingRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_correlation_is_advisory_only() {
    let fleet = fleet().await;
    fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    let jump = fleet.add_reading(fleet.vehicle.id, date(3, 2), 5_100).await;

    let correlation = fleet.readings().correlation_check(jump).await.unwrap();
    assert!(correlation.has_conflict);
    assert_eq!(correlation.conflicts[0].kind, CorrelationKind::UnrealisticIncrease);

    // El detector de ventana no ve retroceso: el registro sigue intacto
    assert_eq!(fleet.reading(jump).await.status, ReadingStatus::Original);
}

#[tokio::test]
async fn test_negative_km_is_rejected() {
    let fleet = fleet().await;
    let err = fleet
        .readings()
        .create_reading(
            fleet.vehicle.id,
            CreateReadingRequest {
                input_date: date(3, 1),
                km_reported: -5,
                source: ReadingSource::Manual,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_reading_on_unknown_vehicle_is_not_found() {
    let fleet = fleet().await;
    let err = fleet
        .readings()
        .create_reading(
            999,
            CreateReadingRequest {
                input_date: date(3, 1),
                km_reported: 10,
                source: ReadingSource::Manual,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_maintenance_links_reading_both_ways() {
    let fleet = fleet().await;
    let service = MaintenanceService::new(fleet.store.clone(), &fleet.config);

    let creation = service
        .create_maintenance(
            fleet.vehicle.id,
            CreateMaintenanceRequest {
                maintenance_date: date(4, 1),
                register_km: 42_000,
                amount: None,
                description: Some("Cambio de aceite".to_string()),
                create_km_record: true,
            },
        )
        .await
        .unwrap();

    let km_record = creation.km_record.expect("registro de km creado");
    assert_eq!(creation.maintenance.reading_id, Some(km_record.reading.id));
    assert_eq!(km_record.reading.source, ReadingSource::Maintenance);
    assert_eq!(
        km_record.reading.source_record,
        SourceRecord::MaintenanceEvent(creation.maintenance.id)
    );
    assert!(creation.warnings.is_empty());

    let stored = fleet.maintenance(creation.maintenance.id).await;
    assert_eq!(stored.reading_id, Some(km_record.reading.id));
}

#[tokio::test]
async fn test_conflictive_maintenance_reading_is_reported() {
    let fleet = fleet().await;
    fleet.add_reading(fleet.vehicle.id, date(3, 10), 100).await;
    fleet.add_reading(fleet.vehicle.id, date(3, 11), 200).await;

    let service = MaintenanceService::new(fleet.store.clone(), &fleet.config);
    let creation = service
        .create_maintenance(
            fleet.vehicle.id,
            CreateMaintenanceRequest {
                maintenance_date: date(3, 1),
                register_km: 500,
                amount: None,
                description: None,
                create_km_record: true,
            },
        )
        .await
        .unwrap();

    let km_record = creation.km_record.unwrap();
    assert_eq!(km_record.reading.status, ReadingStatus::Conflictive);
    assert_eq!(km_record.reading.km_normalized, Some(500));
    assert_eq!(
        creation.warnings,
        vec!["El registro de KM fue marcado como conflictivo y requiere revisión"]
    );
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 200);
}

#[tokio::test]
async fn test_moving_reading_date_leaves_old_neighbors_consistent() {
    let fleet = fleet().await;
    let first = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    let moved = fleet.add_reading(fleet.vehicle.id, date(3, 2), 200).await;
    let neighbor = fleet.add_reading(fleet.vehicle.id, date(3, 3), 150).await;
    fleet.add_reading(fleet.vehicle.id, date(3, 4), 300).await;
    for (day, km) in [(10, 400), (11, 500), (12, 600), (13, 700), (14, 800), (15, 900)] {
        fleet.add_reading(fleet.vehicle.id, date(3, day), km).await;
    }

    fleet
        .readings()
        .update_reading(
            moved,
            UpdateReadingRequest {
                km_reported: Some(1_000),
                input_date: Some(date(3, 20)),
                ..UpdateReadingRequest::default()
            },
        )
        .await
        .unwrap();

    // Sin el registro movido la secuencia de marzo es creciente
    for id in [first, neighbor] {
        let reading = fleet.reading(id).await;
        assert_eq!(reading.status, ReadingStatus::Original);
        assert_eq!(reading.km_normalized, None);
        assert!(reading.conflict_reasons.is_empty());
    }
    assert!(!fleet.readings().detect_conflicts(neighbor).await.unwrap().has_conflict);

    let moved_reading = fleet.reading(moved).await;
    assert_eq!(moved_reading.status, ReadingStatus::Edited);
    assert_eq!(moved_reading.input_date, date(3, 20));
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 1_000);
}

#[tokio::test]
async fn test_mileage_refresh_failure_keeps_the_reading() {
    let fleet = fleet().await;
    fleet.repo.inject_failure(FailurePoint::UpdateVehicleMileage);

    let mutation = fleet
        .readings()
        .create_reading(
            fleet.vehicle.id,
            CreateReadingRequest {
                input_date: date(3, 1),
                km_reported: 500,
                source: ReadingSource::Manual,
            },
        )
        .await
        .unwrap();
    fleet.repo.clear_failures();

    assert_eq!(fleet.reading(mutation.reading.id).await.km_reported, 500);
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 0);

    fleet.add_reading(fleet.vehicle.id, date(3, 2), 600).await;
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 600);
}

fn maintenance_service(fleet: &Fleet) -> MaintenanceService {
    MaintenanceService::new(fleet.store.clone(), &fleet.config)
}

async fn add_maintenance(fleet: &Fleet, register_km: i64, create_km_record: bool) -> MaintenanceChange {
    maintenance_service(fleet)
        .create_maintenance(
            fleet.vehicle.id,
            CreateMaintenanceRequest {
                maintenance_date: date(5, 1),
                register_km,
                amount: None,
                description: Some("Revisión".to_string()),
                create_km_record,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_maintenance_update_carries_km_to_its_reading() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, true).await;
    let reading_id = created.maintenance.reading_id.unwrap();

    let change = maintenance_service(&fleet)
        .update_maintenance(
            created.maintenance.id,
            UpdateMaintenanceRequest {
                register_km: Some(42_500),
                update_km_record: true,
                ..UpdateMaintenanceRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(change.maintenance.register_km, 42_500);
    let km_record = change.km_record.unwrap();
    assert_eq!(km_record.reading.id, reading_id);
    assert_eq!(km_record.reading.status, ReadingStatus::Edited);
    assert_eq!(km_record.reading.effective_km(), 42_500);
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 42_500);
}

#[tokio::test]
async fn test_maintenance_update_without_flag_leaves_reading_alone() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, true).await;
    let reading_id = created.maintenance.reading_id.unwrap();

    let change = maintenance_service(&fleet)
        .update_maintenance(
            created.maintenance.id,
            UpdateMaintenanceRequest {
                register_km: Some(43_000),
                ..UpdateMaintenanceRequest::default()
            },
        )
        .await
        .unwrap();

    assert!(change.km_record.is_none());
    assert_eq!(fleet.reading(reading_id).await.km_reported, 42_000);

    let alerts = maintenance_service(&fleet)
        .alerts(Some(fleet.vehicle.id), Some(MaintenanceAlertType::Desynchronized))
        .await
        .unwrap();
    assert_eq!(alerts.total, 1);
    assert_eq!(alerts.with_issues, 1);
    assert_eq!(alerts.maintenances[0].maintenance_id, created.maintenance.id);
}

#[tokio::test]
async fn test_maintenance_update_creates_missing_reading() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, false).await;

    let change = maintenance_service(&fleet)
        .update_maintenance(
            created.maintenance.id,
            UpdateMaintenanceRequest {
                create_km_record: true,
                ..UpdateMaintenanceRequest::default()
            },
        )
        .await
        .unwrap();

    let km_record = change.km_record.unwrap();
    assert_eq!(change.maintenance.reading_id, Some(km_record.reading.id));
    assert_eq!(
        km_record.reading.source_record,
        SourceRecord::MaintenanceEvent(created.maintenance.id)
    );
    assert_eq!(change.warnings, vec!["Registro de KM creado y vinculado"]);
}

#[tokio::test]
async fn test_empty_maintenance_update_is_rejected() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, false).await;

    let err = maintenance_service(&fleet)
        .update_maintenance(created.maintenance.id, UpdateMaintenanceRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_sync_km_on_linked_reading_is_a_no_op() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, true).await;

    let sync = maintenance_service(&fleet).sync_km(created.maintenance.id).await.unwrap();
    assert_eq!(sync.action, SyncAction::AlreadySynced);
    assert_eq!(sync.message, "El KM ya está sincronizado");
    assert!(sync.km_record.is_none());
}

#[tokio::test]
async fn test_sync_km_updates_desynchronized_reading() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, true).await;
    let service = maintenance_service(&fleet);
    service
        .update_maintenance(
            created.maintenance.id,
            UpdateMaintenanceRequest {
                register_km: Some(43_000),
                maintenance_date: Some(date(5, 2)),
                ..UpdateMaintenanceRequest::default()
            },
        )
        .await
        .unwrap();

    let sync = service.sync_km(created.maintenance.id).await.unwrap();
    assert_eq!(sync.action, SyncAction::Updated);

    let reading = fleet.reading(created.maintenance.reading_id.unwrap()).await;
    assert_eq!(reading.effective_km(), 43_000);
    assert_eq!(reading.input_date, date(5, 2));

    let alerts = service.alerts(None, None).await.unwrap();
    assert_eq!(alerts.with_issues, 0);
    assert_eq!(alerts.maintenances[0].km_status, MaintenanceKmStatus::Active);
}

#[tokio::test]
async fn test_sync_km_restores_deleted_reading() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, true).await;
    let reading_id = created.maintenance.reading_id.unwrap();
    fleet.readings().delete_reading(reading_id, None, true).await.unwrap();
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 0);

    let service = maintenance_service(&fleet);
    let alerts = service
        .alerts(None, Some(MaintenanceAlertType::Deleted))
        .await
        .unwrap();
    assert_eq!(alerts.maintenances.len(), 1);
    assert_eq!(alerts.maintenances[0].km_status, MaintenanceKmStatus::Deleted);

    let sync = service.sync_km(created.maintenance.id).await.unwrap();
    assert_eq!(sync.action, SyncAction::Restored);
    assert_eq!(sync.maintenance.reading_id, Some(reading_id));

    let reading = fleet.reading(reading_id).await;
    assert!(reading.is_kept());
    assert_eq!(reading.status, ReadingStatus::Original);
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 42_000);
}

#[tokio::test]
async fn test_sync_km_creates_reading_when_none_exists() {
    let fleet = fleet().await;
    let created = add_maintenance(&fleet, 42_000, false).await;
    let service = maintenance_service(&fleet);

    let alerts = service
        .alerts(Some(fleet.vehicle.id), Some(MaintenanceAlertType::NoRecord))
        .await
        .unwrap();
    assert_eq!(alerts.maintenances.len(), 1);

    let sync = service.sync_km(created.maintenance.id).await.unwrap();
    assert_eq!(sync.action, SyncAction::Created);
    let km_record = sync.km_record.unwrap();
    assert_eq!(sync.maintenance.reading_id, Some(km_record.reading.id));
    assert_eq!(km_record.reading.km_reported, 42_000);
}
