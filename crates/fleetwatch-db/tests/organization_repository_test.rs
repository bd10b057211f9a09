//! Integration tests for the organization hierarchy repositories
//! (client, group, distributor, geofence, contract).

use fleetwatch_core::FleetError;
use fleetwatch_core::models::client::CreateClient;
use fleetwatch_core::models::contract::CreateContract;
use fleetwatch_core::models::distributor::CreateDistributor;
use fleetwatch_core::models::group::CreateGroup;
use fleetwatch_core::repository::{
    ClientRepository, ContractRepository, DistributorRepository, GeofenceRepository,
    GroupRepository,
};
use fleetwatch_db::repository::{
    SurrealClientRepository, SurrealContractRepository, SurrealDistributorRepository,
    SurrealGeofenceRepository, SurrealGroupRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    fleetwatch_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn client_get_or_create_reports_creation_once() {
    let db = setup().await;
    let repo = SurrealClientRepository::new(db);

    let first = repo
        .get_or_create(CreateClient::from_snapshot(7, Some("ACME")))
        .await
        .unwrap();
    assert!(first.created);
    assert_eq!(first.item.description, "ACME");

    let second = repo
        .get_or_create(CreateClient::from_snapshot(7, Some("Renamed")))
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.item.id, first.item.id);
    assert_eq!(second.item.description, "ACME");

    let fetched = repo.get_by_external_id(7).await.unwrap();
    assert_eq!(fetched.id, first.item.id);
}

#[tokio::test]
async fn concurrent_get_or_create_yields_one_row() {
    let db = setup().await;
    let repo = SurrealClientRepository::new(db);

    let attempts = (0..8).map(|_| repo.get_or_create(CreateClient::from_snapshot(99, None)));
    let results = futures::future::join_all(attempts).await;

    let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    let created = results.iter().filter(|r| r.created).count();
    assert_eq!(created, 1);
    let id = results[0].item.id;
    assert!(results.iter().all(|r| r.item.id == id));
}

#[tokio::test]
async fn missing_client_is_not_found() {
    let db = setup().await;
    let repo = SurrealClientRepository::new(db);

    let err = repo.get_by_external_id(12345).await.unwrap_err();
    assert!(matches!(err, FleetError::NotFound { .. }));
}

#[tokio::test]
async fn group_keeps_its_first_client() {
    let db = setup().await;
    let clients = SurrealClientRepository::new(db.clone());
    let groups = SurrealGroupRepository::new(db);

    let a = clients
        .get_or_create(CreateClient::from_snapshot(1, Some("A")))
        .await
        .unwrap()
        .item;
    let b = clients
        .get_or_create(CreateClient::from_snapshot(2, Some("B")))
        .await
        .unwrap()
        .item;

    let created = groups
        .get_or_create(CreateGroup {
            external_id: 10,
            description: "North".into(),
            client_id: a.id,
        })
        .await
        .unwrap();
    assert!(created.created);

    let again = groups
        .get_or_create(CreateGroup {
            external_id: 10,
            description: "North".into(),
            client_id: b.id,
        })
        .await
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.item.client_id, a.id);
}

#[tokio::test]
async fn group_description_can_be_updated() {
    let db = setup().await;
    let clients = SurrealClientRepository::new(db.clone());
    let groups = SurrealGroupRepository::new(db);

    let client = clients
        .get_or_create(CreateClient::from_snapshot(1, None))
        .await
        .unwrap()
        .item;
    let group = groups
        .get_or_create(CreateGroup {
            external_id: 20,
            description: "Old".into(),
            client_id: client.id,
        })
        .await
        .unwrap()
        .item;

    let updated = groups
        .update_description(group.id, "New".into())
        .await
        .unwrap();
    assert_eq!(updated.description, "New");
    assert_eq!(updated.client_id, client.id);

    let listed = groups.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "New");
}

#[tokio::test]
async fn unknown_distributor_is_shared() {
    let db = setup().await;
    let repo = SurrealDistributorRepository::new(db);

    let first = repo.get_or_create(CreateDistributor::unknown()).await.unwrap();
    let second = repo.get_or_create(CreateDistributor::unknown()).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert!(second.item.is_unknown());
    assert_eq!(first.item.id, second.item.id);
}

#[tokio::test]
async fn geofence_names_are_trimmed() {
    let db = setup().await;
    let repo = SurrealGeofenceRepository::new(db);

    let first = repo.get_or_create("  Base Centro ").await.unwrap();
    let second = repo.get_or_create("Base Centro").await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.item.name, "Base Centro");
    assert_eq!(repo.get_by_name("Base Centro").await.unwrap().id, first.item.id);
}

#[tokio::test]
async fn contract_lookup_by_vin() {
    let db = setup().await;
    let repo = SurrealContractRepository::new(db);

    assert!(repo.find_by_vin("1HGCM82633SZ12345").await.unwrap().is_none());

    let contract = repo
        .create(CreateContract {
            contract_id: 500,
            vin: "1hgcm82633sz12345".into(),
            label: "Lease 500".into(),
        })
        .await
        .unwrap();
    assert_eq!(contract.vin, "1HGCM82633SZ12345");

    let found = repo.find_by_vin("1HGCM82633SZ12345").await.unwrap().unwrap();
    assert_eq!(found.id, contract.id);

    let duplicate = repo
        .create(CreateContract {
            contract_id: 500,
            vin: "1HGCM82633SZ99999".into(),
            label: "dup".into(),
        })
        .await;
    assert!(matches!(duplicate, Err(FleetError::AlreadyExists { .. })));
}
