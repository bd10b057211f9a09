//! Integration tests for the Vehicle repository using in-memory SurrealDB.

use chrono::{TimeZone, Utc};
use fleetwatch_core::models::client::CreateClient;
use fleetwatch_core::models::distributor::CreateDistributor;
use fleetwatch_core::models::group::CreateGroup;
use fleetwatch_core::models::vehicle::UpsertVehicle;
use fleetwatch_core::repository::{
    ClientRepository, DistributorRepository, GeofenceRepository, GroupRepository,
    VehicleRepository,
};
use fleetwatch_db::repository::{
    SurrealClientRepository, SurrealDistributorRepository, SurrealGeofenceRepository,
    SurrealGroupRepository, SurrealVehicleRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// In-memory DB with one client, group and distributor.
async fn setup() -> (Surreal<Db>, Uuid, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    fleetwatch_db::run_migrations(&db).await.unwrap();

    let client = SurrealClientRepository::new(db.clone())
        .get_or_create(CreateClient::from_snapshot(1, Some("ACME")))
        .await
        .unwrap()
        .item;
    let group = SurrealGroupRepository::new(db.clone())
        .get_or_create(CreateGroup {
            external_id: 10,
            description: "ACME NORTE".into(),
            client_id: client.id,
        })
        .await
        .unwrap()
        .item;
    let distributor = SurrealDistributorRepository::new(db.clone())
        .get_or_create(CreateDistributor::unknown())
        .await
        .unwrap()
        .item;

    (db, group.id, distributor.id)
}

fn vehicle(group_id: Uuid, distributor_id: Uuid) -> UpsertVehicle {
    UpsertVehicle {
        external_id: 1001,
        vin: "1HGCM82633SZ12345".into(),
        group_id,
        distributor_id,
        geofence_id: None,
        contract_id: None,
        last_latitude: Some(19.43),
        last_longitude: Some(-99.13),
        last_connection: Some(Utc.with_ymd_and_hms(2025, 1, 20, 10, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn upsert_creates_then_updates() {
    let (db, group_id, distributor_id) = setup().await;
    let repo = SurrealVehicleRepository::new(db.clone());

    let first = repo.upsert(vehicle(group_id, distributor_id)).await.unwrap();
    assert!(first.created);
    assert_eq!(first.item.last_latitude, Some(19.43));

    let geofence = SurrealGeofenceRepository::new(db)
        .get_or_create("Base Centro")
        .await
        .unwrap()
        .item;

    let mut next = vehicle(group_id, distributor_id);
    next.geofence_id = Some(geofence.id);
    next.last_latitude = Some(20.0);
    let second = repo.upsert(next).await.unwrap();

    assert!(!second.created);
    assert_eq!(second.item.id, first.item.id);
    assert_eq!(second.item.geofence_id, Some(geofence.id));
    assert_eq!(second.item.last_latitude, Some(20.0));
}

#[tokio::test]
async fn missing_position_keeps_last_known() {
    let (db, group_id, distributor_id) = setup().await;
    let repo = SurrealVehicleRepository::new(db);

    repo.upsert(vehicle(group_id, distributor_id)).await.unwrap();

    let mut blank = vehicle(group_id, distributor_id);
    blank.last_latitude = None;
    blank.last_longitude = None;
    blank.last_connection = None;
    let updated = repo.upsert(blank).await.unwrap().item;

    assert_eq!(updated.last_latitude, Some(19.43));
    assert_eq!(updated.last_longitude, Some(-99.13));
    assert!(updated.last_connection.is_some());
}

#[tokio::test]
async fn geofence_link_is_cleared_when_outside() {
    let (db, group_id, distributor_id) = setup().await;
    let repo = SurrealVehicleRepository::new(db.clone());
    let geofence = SurrealGeofenceRepository::new(db)
        .get_or_create("Patio")
        .await
        .unwrap()
        .item;

    let mut inside = vehicle(group_id, distributor_id);
    inside.geofence_id = Some(geofence.id);
    repo.upsert(inside).await.unwrap();

    let outside = repo.upsert(vehicle(group_id, distributor_id)).await.unwrap();
    assert_eq!(outside.item.geofence_id, None);
}

#[tokio::test]
async fn list_by_group_and_lookup() {
    let (db, group_id, distributor_id) = setup().await;
    let repo = SurrealVehicleRepository::new(db);

    let created = repo.upsert(vehicle(group_id, distributor_id)).await.unwrap().item;
    let mut other = vehicle(group_id, distributor_id);
    other.external_id = 1002;
    other.vin = "1HGCM82633SZ54321".into();
    repo.upsert(other).await.unwrap();

    let listed = repo.list_by_group(group_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].external_id, 1001);

    assert_eq!(repo.get_by_id(created.id).await.unwrap().vin, created.vin);
    assert_eq!(repo.get_by_external_id(1002).await.unwrap().external_id, 1002);
    assert!(repo.list_by_group(Uuid::new_v4()).await.unwrap().is_empty());
}
