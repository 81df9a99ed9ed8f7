mod common;

use common::{date, fleet, plate, Fleet};
use fleet_mileage::models::{
    AuditAction, AuditLogFilter, CreateCompanyRequest, CreateMaintenanceRequest, EntityKind, ReadingStatus,
    RecordRef, SourceRecord,
};
use fleet_mileage::repositories::FailurePoint;
use fleet_mileage::services::soft_delete::restoration_analyzer::ConflictCategory;
use fleet_mileage::services::soft_delete::{
    CascadeDecision, DeletionCoordinator, DeletionOptions, LifecycleError, ReassignTo, RestorationCoordinator,
    RestorationOptions,
};
use fleet_mileage::services::{AuditLogService, MaintenanceChange, MaintenanceService};
use fleet_mileage::utils::errors::AppError;

fn deletion(fleet: &Fleet) -> DeletionCoordinator {
    DeletionCoordinator::new(fleet.store.clone(), &fleet.config)
}

fn restoration(fleet: &Fleet) -> RestorationCoordinator {
    RestorationCoordinator::new(fleet.store.clone(), &fleet.config)
}

fn audit(fleet: &Fleet) -> AuditLogService {
    AuditLogService::new(fleet.store.clone())
}

fn decide(relation: &str, decision: CascadeDecision) -> DeletionOptions {
    let mut options = DeletionOptions::default();
    options.cascade_options.insert(relation.to_string(), decision);
    options
}

async fn maintenance_with_reading(fleet: &Fleet) -> MaintenanceChange {
    MaintenanceService::new(fleet.store.clone(), &fleet.config)
        .create_maintenance(
            fleet.vehicle.id,
            CreateMaintenanceRequest {
                maintenance_date: date(5, 1),
                register_km: 42_000,
                amount: None,
                description: Some("Revisión anual".to_string()),
                create_km_record: true,
            },
        )
        .await
        .unwrap()
}

fn vehicle_ref(fleet: &Fleet) -> RecordRef {
    RecordRef::new(EntityKind::Vehicle, fleet.vehicle.id)
}

#[tokio::test]
async fn test_maintenance_delete_requires_decision_on_linked_reading() {
    let fleet = fleet().await;
    let creation = maintenance_with_reading(&fleet).await;
    let record = RecordRef::new(EntityKind::MaintenanceEvent, creation.maintenance.id);

    let preview = deletion(&fleet).preview(record).await.unwrap();
    assert!(preview.can_proceed);
    assert_eq!(preview.optional_cascades.len(), 1);
    assert_eq!(preview.optional_cascades[0].relation, "vehicle_km");

    let err = deletion(&fleet).execute(record, DeletionOptions::default()).await.unwrap_err();
    match err {
        AppError::Lifecycle(LifecycleError::RequiresDecision { pending, .. }) => {
            assert_eq!(pending, vec!["vehicle_km"])
        }
        other => panic!("se esperaba RequiresDecision, llegó {:?}", other),
    }

    // Nada cambió
    assert!(fleet.maintenance(creation.maintenance.id).await.is_kept());
}

#[tokio::test]
async fn test_maintenance_delete_keeping_reading_unlinks_both_sides() {
    let fleet = fleet().await;
    let creation = maintenance_with_reading(&fleet).await;
    let reading_id = creation.km_record.as_ref().unwrap().reading.id;

    let result = deletion(&fleet)
        .execute(
            RecordRef::new(EntityKind::MaintenanceEvent, creation.maintenance.id),
            decide("vehicle_km", CascadeDecision::Keep),
        )
        .await
        .unwrap();

    assert_eq!(result.cascade_count, 0);
    assert_eq!(result.nullify_count, 1);

    let reading = fleet.reading(reading_id).await;
    assert!(reading.is_kept());
    assert_eq!(reading.source_record, SourceRecord::None);

    let maintenance = fleet.maintenance(creation.maintenance.id).await;
    assert!(!maintenance.is_kept());
    assert_eq!(maintenance.reading_id, None);
}

#[tokio::test]
async fn test_maintenance_delete_cascading_to_reading() {
    let fleet = fleet().await;
    let creation = maintenance_with_reading(&fleet).await;
    let reading_id = creation.km_record.as_ref().unwrap().reading.id;

    let result = deletion(&fleet)
        .execute(
            RecordRef::new(EntityKind::MaintenanceEvent, creation.maintenance.id),
            decide("vehicle_km", CascadeDecision::Delete),
        )
        .await
        .unwrap();

    assert_eq!(result.cascade_count, 1);
    assert!(!fleet.reading(reading_id).await.is_kept());
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 0);
}

#[tokio::test]
async fn test_reading_from_maintenance_requires_force() {
    let fleet = fleet().await;
    let creation = maintenance_with_reading(&fleet).await;
    let reading_id = creation.km_record.as_ref().unwrap().reading.id;
    let readings = fleet.readings();

    let err = readings.delete_reading(reading_id, None, false).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Lifecycle(LifecycleError::RequiresConfirmation { .. })
    ));
    assert!(fleet.reading(reading_id).await.is_kept());

    let result = readings.delete_reading(reading_id, None, true).await.unwrap();
    assert_eq!(result.nullify_count, 1);
    assert!(!result.warnings.is_empty());
    assert_eq!(fleet.maintenance(creation.maintenance.id).await.reading_id, None);
}

#[tokio::test]
async fn test_vehicle_delete_and_cascade_restore_are_inverse() {
    let fleet = fleet().await;
    for (day, km) in [(1, 100), (2, 200), (3, 300)] {
        fleet.add_reading(fleet.vehicle.id, date(3, day), km).await;
    }
    MaintenanceService::new(fleet.store.clone(), &fleet.config)
        .create_maintenance(
            fleet.vehicle.id,
            CreateMaintenanceRequest {
                maintenance_date: date(3, 2),
                register_km: 200,
                amount: None,
                description: None,
                create_km_record: false,
            },
        )
        .await
        .unwrap();

    let deleted = deletion(&fleet)
        .execute(vehicle_ref(&fleet), DeletionOptions::default())
        .await
        .unwrap();
    assert_eq!(deleted.cascade_count, 4);
    assert_eq!(deleted.audit_log.cascade_count, 4);
    assert!(!fleet.vehicle(fleet.vehicle.id).await.is_kept());

    let preview = restoration(&fleet).preview(vehicle_ref(&fleet)).await.unwrap();
    assert!(preview.can_proceed);
    assert_eq!(preview.restoration_info.cascaded_total(), 4);

    let restored = restoration(&fleet)
        .execute(
            vehicle_ref(&fleet),
            RestorationOptions {
                cascade_restore: true,
                ..RestorationOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(restored.restored_count - 1, deleted.cascade_count);
    assert!(restored.warnings.is_empty());
    assert!(fleet.vehicle(fleet.vehicle.id).await.is_kept());
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 300);

    let entries = audit(&fleet)
        .query(&AuditLogFilter::for_record(vehicle_ref(&fleet)))
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.action == AuditAction::Delete));
    assert!(entries
        .iter()
        .any(|e| e.action == AuditAction::Restore && e.restored_count == 5));
}

#[tokio::test]
async fn test_company_delete_and_cascade_restore_are_inverse() {
    let fleet = fleet().await;
    let first = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    let second = fleet.add_reading(fleet.vehicle.id, date(3, 2), 200).await;
    let maintenance = MaintenanceService::new(fleet.store.clone(), &fleet.config)
        .create_maintenance(
            fleet.vehicle.id,
            CreateMaintenanceRequest {
                maintenance_date: date(3, 2),
                register_km: 200,
                amount: None,
                description: None,
                create_km_record: false,
            },
        )
        .await
        .unwrap();
    let company = RecordRef::new(EntityKind::Company, fleet.company.id);

    let deleted = deletion(&fleet).execute(company, DeletionOptions::default()).await.unwrap();
    assert_eq!(deleted.cascade_count, 4);
    assert!(!fleet.company(fleet.company.id).await.is_kept());
    assert!(!fleet.vehicle(fleet.vehicle.id).await.is_kept());
    assert!(!fleet.reading(second).await.is_kept());

    let restored = restoration(&fleet)
        .execute(
            company,
            RestorationOptions {
                cascade_restore: true,
                ..RestorationOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(restored.restored_count, 5);
    assert_eq!(restored.restored_count - 1, deleted.cascade_count);
    assert!(restored.warnings.is_empty());
    assert!(fleet.company(fleet.company.id).await.is_kept());
    assert!(fleet.vehicle(fleet.vehicle.id).await.is_kept());
    assert!(fleet.reading(first).await.is_kept());
    assert!(fleet.reading(second).await.is_kept());
    assert!(fleet.maintenance(maintenance.maintenance.id).await.is_kept());

    let entries = audit(&fleet).query(&AuditLogFilter::for_record(company)).await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_restoring_reading_revalidates_its_window() {
    let fleet = fleet().await;
    let first = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    fleet.add_reading(fleet.vehicle.id, date(3, 3), 300).await;
    let middle = fleet.add_reading(fleet.vehicle.id, date(3, 2), 50).await;
    let record = RecordRef::new(EntityKind::MileageReading, middle);

    deletion(&fleet).execute(record, DeletionOptions::default()).await.unwrap();
    assert_eq!(fleet.reading(first).await.status, ReadingStatus::Original);

    let preview = restoration(&fleet).preview(record).await.unwrap();
    assert!(preview.can_proceed);

    let restored = restoration(&fleet)
        .execute(record, RestorationOptions::default())
        .await
        .unwrap();
    assert_eq!(restored.restored_count, 1);

    // De vuelta en la línea temporal, el registro vuelve a ganar el empate
    let middle_reading = fleet.reading(middle).await;
    assert!(middle_reading.is_kept());
    assert_eq!(middle_reading.status, ReadingStatus::Original);

    let first_reading = fleet.reading(first).await;
    assert_ne!(first_reading.status, ReadingStatus::Original);
    assert!(!first_reading.conflict_reasons.is_empty());
    assert_eq!(fleet.vehicle(fleet.vehicle.id).await.current_mileage, 300);
}

#[tokio::test]
async fn test_simple_restore_reports_orphaned_cascades() {
    let fleet = fleet().await;
    fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    deletion(&fleet)
        .execute(vehicle_ref(&fleet), DeletionOptions::default())
        .await
        .unwrap();

    let restored = restoration(&fleet)
        .execute(vehicle_ref(&fleet), RestorationOptions::default())
        .await
        .unwrap();

    assert_eq!(restored.restored_count, 1);
    assert_eq!(restored.warnings, vec!["1 registros relacionados NO fueron restaurados"]);
}

#[tokio::test]
async fn test_vehicle_restore_blocked_by_deleted_company() {
    let fleet = fleet().await;
    deletion(&fleet)
        .execute(
            RecordRef::new(EntityKind::Company, fleet.company.id),
            DeletionOptions::default(),
        )
        .await
        .unwrap();
    assert!(!fleet.vehicle(fleet.vehicle.id).await.is_kept());

    let preview = restoration(&fleet).preview(vehicle_ref(&fleet)).await.unwrap();
    assert!(!preview.can_proceed);
    assert_eq!(
        preview.restoration_info.conflicts[0].category,
        ConflictCategory::ParentDeleted
    );

    let err = restoration(&fleet)
        .execute(vehicle_ref(&fleet), RestorationOptions::default())
        .await
        .unwrap_err();
    match err {
        AppError::Lifecycle(LifecycleError::Blocked { errors, .. }) => {
            assert!(errors[0].contains("compañía"));
            assert!(errors[0].contains("Transportes Norte"));
        }
        other => panic!("se esperaba Blocked, llegó {:?}", other),
    }

    // Reasignar solo el vehículo no cubre la compañía
    let err = restoration(&fleet)
        .execute(
            vehicle_ref(&fleet),
            RestorationOptions {
                reassign_to: Some(ReassignTo {
                    company_id: None,
                    vehicle_id: Some(fleet.vehicle.id),
                }),
                ..RestorationOptions::default()
            },
        )
        .await
        .unwrap_err();
    match err {
        AppError::Lifecycle(LifecycleError::RequiresDecision { pending, .. }) => {
            assert_eq!(pending, vec!["reassign_to.company_id"])
        }
        other => panic!("se esperaba RequiresDecision, llegó {:?}", other),
    }
}

#[tokio::test]
async fn test_vehicle_restore_with_company_reassignment() {
    let fleet = fleet().await;
    deletion(&fleet)
        .execute(
            RecordRef::new(EntityKind::Company, fleet.company.id),
            DeletionOptions::default(),
        )
        .await
        .unwrap();

    let other = fleet
        .fleet_service()
        .create_company(CreateCompanyRequest {
            name: "Transportes Sur".to_string(),
            tax_id: None,
            max_daily_km: None,
        })
        .await
        .unwrap();

    let restored = restoration(&fleet)
        .execute(
            vehicle_ref(&fleet),
            RestorationOptions {
                reassign_to: Some(ReassignTo {
                    company_id: Some(other.id),
                    vehicle_id: None,
                }),
                ..RestorationOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(restored.message.contains("reasignación"));
    let vehicle = fleet.vehicle(fleet.vehicle.id).await;
    assert!(vehicle.is_kept());
    assert_eq!(vehicle.company_id, other.id);
    assert!(!fleet.company(fleet.company.id).await.is_kept());
}

#[tokio::test]
async fn test_restore_blocked_by_plate_in_use() {
    let fleet = fleet().await;
    deletion(&fleet)
        .execute(vehicle_ref(&fleet), DeletionOptions::default())
        .await
        .unwrap();

    let replacement = fleet
        .fleet_service()
        .create_vehicle(fleet.company.id, plate("1234-ABC"))
        .await
        .unwrap();
    assert_ne!(replacement.id, fleet.vehicle.id);

    let preview = restoration(&fleet).preview(vehicle_ref(&fleet)).await.unwrap();
    assert!(!preview.can_proceed);
    assert_eq!(
        preview.restoration_info.conflicts[0].category,
        ConflictCategory::Uniqueness
    );

    let err = restoration(&fleet)
        .execute(vehicle_ref(&fleet), RestorationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Lifecycle(LifecycleError::Blocked { .. })));
    assert!(!fleet.vehicle(fleet.vehicle.id).await.is_kept());
}

#[tokio::test]
async fn test_failed_audit_write_rolls_back_everything() {
    let fleet = fleet().await;
    let reading_id = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;

    fleet.repo.inject_failure(FailurePoint::AuditInsert);
    let err = deletion(&fleet)
        .execute(vehicle_ref(&fleet), DeletionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Lifecycle(LifecycleError::InternalFailure { .. })
    ));

    assert!(fleet.vehicle(fleet.vehicle.id).await.is_kept());
    assert!(fleet.reading(reading_id).await.is_kept());
    assert!(audit(&fleet).query(&AuditLogFilter::default()).await.unwrap().is_empty());

    fleet.repo.clear_failures();
    let result = deletion(&fleet)
        .execute(vehicle_ref(&fleet), DeletionOptions::default())
        .await
        .unwrap();
    assert_eq!(result.cascade_count, 1);
}

#[tokio::test]
async fn test_deleting_twice_is_not_found() {
    let fleet = fleet().await;
    let reading_id = fleet.add_reading(fleet.vehicle.id, date(3, 1), 100).await;
    let readings = fleet.readings();

    readings.delete_reading(reading_id, None, false).await.unwrap();
    let err = readings.delete_reading(reading_id, None, false).await.unwrap_err();
    assert!(matches!(err, AppError::Lifecycle(LifecycleError::NotFound(_))));
}

#[tokio::test]
async fn test_audit_query_rejects_inverted_range() {
    let fleet = fleet().await;
    let now = chrono::Utc::now();
    let filter = AuditLogFilter {
        from: Some(now),
        to: Some(now - chrono::Duration::days(1)),
        ..AuditLogFilter::default()
    };

    let err = audit(&fleet).query(&filter).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}
