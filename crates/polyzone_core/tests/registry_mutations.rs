use polyzone_core::db::{open_db_in_memory, StoreSettings};
use polyzone_core::{
    ClassificationService, Coordinate, ErrorKind, GeometryStore, PolygonIdentity,
    RegistryError, RegistryService, SqliteGeometryStore,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

fn square_collection(min_lon: f64, min_lat: f64, size: f64) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [min_lon, min_lat],
                    [min_lon + size, min_lat],
                    [min_lon + size, min_lat + size],
                    [min_lon, min_lat + size],
                    [min_lon, min_lat]
                ]]
            }
        }]
    })
}

fn registry(conn: &Connection) -> RegistryService<SqliteGeometryStore<'_>> {
    RegistryService::new(SqliteGeometryStore::new(conn))
}

fn classify_one(conn: &Connection, lat: f64, lon: f64) -> (String, String) {
    let service = ClassificationService::new(SqliteGeometryStore::new(conn));
    let result = service.classify_point(Coordinate::new(lat, lon)).unwrap();
    (result.glosa, result.postal_code)
}

fn stored_rows(conn: &Connection) -> Vec<(String, String, String)> {
    let mut stmt = conn
        .prepare("SELECT glosa, postal_code, geometry FROM zone_polygons ORDER BY postal_code;")
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(Result::unwrap)
        .collect::<Vec<_>>();
    rows
}

#[test]
fn insert_then_classify_returns_identity() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);

    let inserted = service
        .insert_polygon("Zona A", "1234567", &square_collection(-70.2, -20.3, 0.1))
        .unwrap();
    assert_eq!(inserted.to_string(), "Zona A - 1234567");

    assert_eq!(
        classify_one(&conn, -20.25, -70.15),
        ("Zona A".to_string(), "1234567".to_string())
    );
}

#[test]
fn insert_accepts_composite_name_and_feature_name() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);

    service
        .insert_named_polygon("Iquique Zona 1 - 1100000", &square_collection(0.0, 0.0, 1.0))
        .unwrap();

    let mut named = square_collection(5.0, 5.0, 1.0);
    named["features"][0]["properties"]["name"] = json!("Iquique Zona 2 - 1100001");
    let from_feature = service
        .insert_from_feature_name(&Value::String(named.to_string()))
        .unwrap();
    assert_eq!(from_feature.glosa.as_str(), "Iquique Zona 2");

    let listed = service
        .list_polygons()
        .unwrap()
        .into_iter()
        .map(|zone| zone.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        listed,
        vec!["Iquique Zona 1 - 1100000", "Iquique Zona 2 - 1100001"]
    );
}

#[test]
fn duplicate_insert_fails_and_leaves_store_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    let geojson = square_collection(0.0, 0.0, 1.0);
    service.insert_polygon("Zona A", "1234567", &geojson).unwrap();
    let before = stored_rows(&conn);

    let again = service
        .insert_polygon("Zona A", "1234567", &geojson)
        .unwrap_err();
    assert_eq!(again.kind(), ErrorKind::DuplicateIdentifier);

    assert_eq!(stored_rows(&conn), before);
}

#[test]
fn composite_parts_are_unique_independently() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_named_polygon("A - 1111111", &square_collection(0.0, 0.0, 1.0))
        .unwrap();

    let same_code = service
        .insert_named_polygon("B - 1111111", &square_collection(2.0, 2.0, 1.0))
        .unwrap_err();
    assert_eq!(same_code.kind(), ErrorKind::DuplicateIdentifier);

    let same_name = service
        .insert_named_polygon("a - 2222222", &square_collection(2.0, 2.0, 1.0))
        .unwrap_err();
    assert_eq!(same_name.kind(), ErrorKind::DuplicateIdentifier);

    assert_eq!(service.list_polygons().unwrap().len(), 1);
}

#[test]
fn insert_then_delete_restores_empty_store() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    let before = stored_rows(&conn);

    service
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap();
    let deleted = service.delete_polygon("1234567").unwrap();
    assert_eq!(deleted.glosa.as_str(), "Zona A");

    assert_eq!(stored_rows(&conn), before);
    assert_eq!(
        classify_one(&conn, 0.5, 0.5),
        ("No clasificado".to_string(), "No clasificado".to_string())
    );
}

#[test]
fn delete_missing_polygon_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);

    let err = service.delete_polygon("7654321").unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(id) if id == "7654321"));

    let named = service.delete_named_polygon("Zona A - 7654321").unwrap_err();
    assert_eq!(named.kind(), ErrorKind::NotFound);
}

#[test]
fn replace_moves_classification_to_new_geometry() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 2.0))
        .unwrap();

    let replaced = service
        .replace_polygon("1234567", &square_collection(1.0, 1.0, 2.0))
        .unwrap();
    assert_eq!(replaced.to_string(), "Zona A - 1234567");

    // Inside the old square only.
    assert_eq!(classify_one(&conn, 0.5, 0.5).1, "No clasificado");
    // Inside the new square.
    assert_eq!(classify_one(&conn, 2.5, 2.5).1, "1234567");
}

#[test]
fn replace_requires_existing_identifier_and_valid_geojson() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap();

    let missing = service
        .replace_polygon("7654321", &square_collection(0.0, 0.0, 1.0))
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    let wrong_name = service
        .replace_named_polygon("Zona B - 1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap_err();
    assert_eq!(wrong_name.kind(), ErrorKind::NotFound);

    let bad_geojson = service
        .replace_polygon("1234567", &json!({ "type": "FeatureCollection", "features": [] }))
        .unwrap_err();
    assert_eq!(bad_geojson.kind(), ErrorKind::InvalidGeoJson);

    service
        .replace_named_polygon("zona a - 1234567", &square_collection(3.0, 3.0, 1.0))
        .unwrap();
    assert_eq!(classify_one(&conn, 3.5, 3.5).0, "Zona A");
}

#[test]
fn update_postal_code_is_visible_to_classification() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_polygon("Zona A", "1234567", &square_collection(-70.2, -20.3, 0.1))
        .unwrap();

    let updated = service.update_postal_code("1234567", "7654321").unwrap();
    assert_eq!(updated.to_string(), "Zona A - 7654321");

    assert_eq!(
        classify_one(&conn, -20.25, -70.15),
        ("Zona A".to_string(), "7654321".to_string())
    );
}

#[test]
fn update_postal_code_checks_preconditions() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_polygon("Zona A", "1111111", &square_collection(0.0, 0.0, 1.0))
        .unwrap();
    service
        .insert_polygon("Zona B", "2222222", &square_collection(2.0, 2.0, 1.0))
        .unwrap();

    assert_eq!(
        service.update_postal_code("3333333", "4444444").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        service.update_postal_code("1111111", "2222222").unwrap_err().kind(),
        ErrorKind::DuplicateIdentifier
    );
    assert_eq!(
        service.update_postal_code("1111111", "1111111").unwrap_err().kind(),
        ErrorKind::DuplicateIdentifier
    );
}

#[test]
fn update_glosa_rejects_names_owned_by_other_zones() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_polygon("Zona A", "1111111", &square_collection(0.0, 0.0, 1.0))
        .unwrap();
    service
        .insert_polygon("Zona B", "2222222", &square_collection(2.0, 2.0, 1.0))
        .unwrap();

    let taken = service.update_glosa("1111111", "zona b").unwrap_err();
    assert_eq!(taken.kind(), ErrorKind::DuplicateIdentifier);

    let renamed = service.update_glosa("1111111", "  Zona Centro ").unwrap();
    assert_eq!(renamed.glosa.as_str(), "Zona Centro");
    assert_eq!(classify_one(&conn, 0.5, 0.5).0, "Zona Centro");
}

#[test]
fn accented_glosas_are_unique_regardless_of_case() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_named_polygon("Población Ñuñoa - 1111111", &square_collection(0.0, 0.0, 1.0))
        .unwrap();

    let upper = service
        .insert_named_polygon("POBLACIÓN ÑUÑOA - 2222222", &square_collection(2.0, 2.0, 1.0))
        .unwrap_err();
    assert_eq!(upper.kind(), ErrorKind::DuplicateIdentifier);
    assert_eq!(service.list_polygons().unwrap().len(), 1);

    service
        .insert_polygon("Zona B", "2222222", &square_collection(2.0, 2.0, 1.0))
        .unwrap();
    let taken = service
        .update_glosa("2222222", "población ñuñoa")
        .unwrap_err();
    assert_eq!(taken.kind(), ErrorKind::DuplicateIdentifier);

    let self_rename = service
        .update_glosa("1111111", "POBLACIÓN ÑUÑOA")
        .unwrap_err();
    assert_eq!(self_rename.kind(), ErrorKind::DuplicateIdentifier);

    let names = service
        .list_polygons()
        .unwrap()
        .into_iter()
        .map(|identity| identity.to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Población Ñuñoa - 1111111", "Zona B - 2222222"]);
}

#[test]
fn rename_polygon_enforces_full_protocol() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_named_polygon("Zona A - 1111111", &square_collection(0.0, 0.0, 1.0))
        .unwrap();
    service
        .insert_named_polygon("Zona B - 2222222", &square_collection(2.0, 2.0, 1.0))
        .unwrap();

    let missing_old = service
        .rename_polygon("Zona X - 1111111", "Zona C - 3333333")
        .unwrap_err();
    assert_eq!(missing_old.kind(), ErrorKind::NotFound);

    let existing_new = service
        .rename_polygon("Zona A - 1111111", "Zona B - 2222222")
        .unwrap_err();
    assert_eq!(existing_new.kind(), ErrorKind::DuplicateIdentifier);

    let name_collision = service
        .rename_polygon("Zona A - 1111111", "Zona B - 3333333")
        .unwrap_err();
    assert_eq!(name_collision.kind(), ErrorKind::DuplicateIdentifier);

    let code_collision = service
        .rename_polygon("Zona A - 1111111", "Zona C - 2222222")
        .unwrap_err();
    assert_eq!(code_collision.kind(), ErrorKind::DuplicateIdentifier);

    let renamed = service
        .rename_polygon("Zona A - 1111111", "Zona C - 3333333")
        .unwrap();
    assert_eq!(renamed, PolygonIdentity::parse("Zona C", "3333333").unwrap());

    let record = service.get_polygon("3333333").unwrap().unwrap();
    assert!(record.geometry.intersects_point(0.5, 0.5));
    assert!(service.get_polygon("1111111").unwrap().is_none());
}

#[test]
fn store_fault_mid_replace_surfaces_store_error_and_keeps_pre_image() {
    let conn = open_db_in_memory().unwrap();
    let service = registry(&conn);
    service
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_geometry_update BEFORE UPDATE OF geometry ON zone_polygons
         BEGIN
             SELECT RAISE(ABORT, 'injected fault');
         END;",
    )
    .unwrap();

    let err = service
        .replace_polygon("1234567", &square_collection(5.0, 5.0, 1.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreError);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("injected fault"));

    assert_eq!(classify_one(&conn, 0.5, 0.5).1, "1234567");
    assert_eq!(classify_one(&conn, 5.5, 5.5).1, "No clasificado");
}

#[test]
fn writes_from_other_connections_are_seen_by_store_checks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let writer = polyzone_core::db::open_db(&path).unwrap();
    let reader = polyzone_core::db::open_db(&path).unwrap();

    registry(&writer)
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap();

    let err = registry(&reader)
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateIdentifier);
    assert_eq!(
        SqliteGeometryStore::new(&reader).list_all().unwrap().len(),
        1
    );
}

#[test]
fn busy_writer_surfaces_retryable_store_error_after_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("busy.db");
    let holder = polyzone_core::db::open_db(&path).unwrap();
    let settings = StoreSettings {
        busy_timeout: Duration::from_millis(100),
    };
    let contender = polyzone_core::db::open_db_with(&path, &settings).unwrap();

    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let started_at = Instant::now();
    let err = registry(&contender)
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreError);
    assert!(err.is_retryable(), "unexpected error: {err}");
    assert!(started_at.elapsed() < Duration::from_secs(5));
    assert!(contender.is_autocommit());

    holder.execute_batch("ROLLBACK;").unwrap();
    registry(&contender)
        .insert_polygon("Zona A", "1234567", &square_collection(0.0, 0.0, 1.0))
        .unwrap();
    assert_eq!(classify_one(&holder, 0.5, 0.5).1, "1234567");
}
