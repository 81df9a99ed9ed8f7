//! Pruebas del router completo sobre el almacén en memoria, sin socket:
//! cada petición pasa por `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use fleet_mileage::config::{EnvironmentConfig, ReconciliationConfig};
use fleet_mileage::repositories::{FleetStore, InMemoryFleetRepository};
use fleet_mileage::{create_app, AppState};

fn app() -> Router {
    let store: Arc<dyn FleetStore> = Arc::new(InMemoryFleetRepository::new());
    create_app(AppState::new(
        store,
        EnvironmentConfig::default(),
        ReconciliationConfig::default(),
    ))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Compañía + vehículo; devuelve el id del vehículo
async fn seed_vehicle(app: &Router) -> i64 {
    let (status, company) = call(app, "POST", "/api/companies", Some(json!({ "name": "Transportes Norte" }))).await;
    assert_eq!(status, StatusCode::OK);
    let company_id = company["data"]["id"].as_i64().unwrap();

    let (status, vehicle) = call(
        app,
        "POST",
        &format!("/api/companies/{}/vehicles", company_id),
        Some(json!({ "license_plate": "1234-ABC" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    vehicle["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_reading_lifecycle_over_http() {
    let app = app();
    let vehicle_id = seed_vehicle(&app).await;

    let (status, created) = call(
        &app,
        "POST",
        &format!("/api/vehicles/{}/readings", vehicle_id),
        Some(json!({ "input_date": "2024-03-01", "km_reported": 1500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["reading"]["status"], "original");
    let reading_id = created["data"]["reading"]["id"].as_i64().unwrap();

    let (status, conflicts) = call(&app, "GET", &format!("/api/readings/{}/conflicts", reading_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conflicts["data"]["has_conflict"], false);

    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/api/readings/{}", reading_id),
        Some(json!({ "km_normalized": 1600 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["reading"]["status"], "edited");
    assert_eq!(updated["data"]["reading"]["effective_km"], 1600);

    let (status, deleted) = call(
        &app,
        "POST",
        &format!("/api/soft-delete/vehicle_kms/{}/delete", reading_id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["data"]["cascade_count"], 0);

    let (status, logs) = call(&app, "GET", "/api/soft-delete/audit-logs?action=delete", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_negative_km_is_bad_request() {
    let app = app();
    let vehicle_id = seed_vehicle(&app).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/vehicles/{}/readings", vehicle_id),
        Some(json!({ "input_date": "2024-03-01", "km_reported": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_duplicate_company_is_conflict() {
    let app = app();
    seed_vehicle(&app).await;

    let (status, body) = call(&app, "POST", "/api/companies", Some(json!({ "name": "Transportes Norte" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_maintenance_reading_delete_requires_force() {
    let app = app();
    let vehicle_id = seed_vehicle(&app).await;

    let (status, created) = call(
        &app,
        "POST",
        &format!("/api/vehicles/{}/maintenance", vehicle_id),
        Some(json!({
            "maintenance_date": "2024-05-01",
            "register_km": 42000,
            "create_km_record": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let maintenance_id = created["data"]["id"].as_i64().unwrap();
    let reading_id = created["data"]["reading_id"].as_i64().unwrap();

    let uri = format!("/api/soft-delete/vehicle_kms/{}/delete", reading_id);
    let (status, body) = call(&app, "POST", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
    assert_eq!(body["code"], "REQUIRES_CONFIRMATION");
    assert_eq!(body["details"]["requires_force"], true);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/soft-delete/maintenances/{}/delete", maintenance_id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["pending_decisions"], json!(["vehicle_km"]));

    let (status, body) = call(&app, "POST", &uri, Some(json!({ "force": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nullify_count"], 1);
}

#[tokio::test]
async fn test_restore_of_kept_record_is_not_found() {
    let app = app();
    let vehicle_id = seed_vehicle(&app).await;

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/soft-delete/vehicles/{}/restoration-preview", vehicle_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_entity_is_bad_request() {
    let app = app();
    let (status, body) = call(&app, "GET", "/api/soft-delete/invoices/1/deletion-preview", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_maintenance_sync_and_alerts_over_http() {
    let app = app();
    let vehicle_id = seed_vehicle(&app).await;

    let (status, created) = call(
        &app,
        "POST",
        &format!("/api/vehicles/{}/maintenance", vehicle_id),
        Some(json!({ "maintenance_date": "2024-05-01", "register_km": 42000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let maintenance_id = created["data"]["id"].as_i64().unwrap();

    let (status, alerts) = call(&app, "GET", "/api/maintenance/alerts?alert_type=no_record", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts["data"]["maintenances"][0]["km_status"], "no_record");

    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/api/maintenance/{}", maintenance_id),
        Some(json!({ "register_km": 42100 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["register_km"], 42100);

    let (status, synced) = call(
        &app,
        "POST",
        &format!("/api/maintenance/{}/sync-km", maintenance_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(synced["data"]["action"], "created");
    assert_eq!(synced["data"]["maintenance"]["km_record"]["reading"]["km_reported"], 42100);

    let (status, alerts) = call(&app, "GET", "/api/maintenance/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts["data"]["with_issues"], 0);
}
