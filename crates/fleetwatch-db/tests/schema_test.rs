//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    fleetwatch_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "client",
        "vehicle_group",
        "distributor",
        "geofence",
        "contract",
        "vehicle",
        "register",
        "bitacora",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    assert_eq!(fleetwatch_db::run_migrations(&db).await.unwrap(), vec![1]);
    assert!(fleetwatch_db::run_migrations(&db).await.unwrap().is_empty());

    let mut result = db.query("SELECT version FROM _migration").await.unwrap();
    let applied: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(applied.len(), 1, "second run must not re-apply v1");
}

#[tokio::test]
async fn vehicle_vin_must_be_seventeen_chars() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    fleetwatch_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE vehicle SET external_id = 1, vin = 'SHORT', \
             group_id = 'g', distributor_id = 'd'",
        )
        .await
        .unwrap();
    assert!(result.check().is_err());
}

#[tokio::test]
async fn concurrent_migration_runs_apply_each_version_once() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    let (a, b) = tokio::join!(
        fleetwatch_db::run_migrations(&db),
        fleetwatch_db::run_migrations(&db),
    );
    let mut applied = a.unwrap();
    applied.extend(b.unwrap());
    assert_eq!(applied, vec![1]);

    let mut result = db.query("SELECT VALUE version FROM _migration").await.unwrap();
    let versions: Vec<u32> = result.take(0).unwrap();
    assert_eq!(versions, vec![1]);
}
