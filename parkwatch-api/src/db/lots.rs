//! Parking lot queries
//!
//! The ingestion pipeline only ever writes `occupied` (plus the row's
//! `updated_at`); creation, capacity changes, and deletion happen through
//! the CRUD surface.

use crate::models::ParkingLot;
use chrono::Utc;
use parkwatch_common::{Error, Result};
use sqlx::SqlitePool;

/// All lots, ordered by name
pub async fn list_all(db: &SqlitePool) -> Result<Vec<ParkingLot>> {
    let lots = sqlx::query_as::<_, ParkingLot>(
        "SELECT id, name, capacity, occupied, updated_at FROM parking_lots ORDER BY name ASC",
    )
    .fetch_all(db)
    .await?;

    Ok(lots)
}

/// Look up a lot by its unique name
pub async fn find_by_name(db: &SqlitePool, name: &str) -> Result<Option<ParkingLot>> {
    let lot = sqlx::query_as::<_, ParkingLot>(
        "SELECT id, name, capacity, occupied, updated_at FROM parking_lots WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(db)
    .await?;

    Ok(lot)
}

/// Look up a lot by id
pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<ParkingLot>> {
    let lot = sqlx::query_as::<_, ParkingLot>(
        "SELECT id, name, capacity, occupied, updated_at FROM parking_lots WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(lot)
}

/// Create a new lot
pub async fn create(
    db: &SqlitePool,
    name: &str,
    capacity: i64,
    occupied: i64,
) -> Result<ParkingLot> {
    let lot = sqlx::query_as::<_, ParkingLot>(
        r#"
        INSERT INTO parking_lots (name, capacity, occupied, updated_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, name, capacity, occupied, updated_at
        "#,
    )
    .bind(name)
    .bind(capacity)
    .bind(occupied)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;

    Ok(lot)
}

/// Write a new occupied value for the named lot, returning the updated row
pub async fn update_occupied(db: &SqlitePool, name: &str, occupied: i64) -> Result<ParkingLot> {
    let lot = sqlx::query_as::<_, ParkingLot>(
        r#"
        UPDATE parking_lots
        SET occupied = ?, updated_at = ?
        WHERE name = ?
        RETURNING id, name, capacity, occupied, updated_at
        "#,
    )
    .bind(occupied)
    .bind(Utc::now())
    .bind(name)
    .fetch_optional(db)
    .await?;

    lot.ok_or_else(|| Error::NotFound(format!("parking lot '{}' does not exist", name)))
}

/// Apply a partial update to a lot by id, returning the updated row
pub async fn update_fields(
    db: &SqlitePool,
    id: i64,
    name: Option<&str>,
    capacity: Option<i64>,
    occupied: Option<i64>,
) -> Result<ParkingLot> {
    let current = find_by_id(db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("parking lot id {} does not exist", id)))?;

    let lot = sqlx::query_as::<_, ParkingLot>(
        r#"
        UPDATE parking_lots
        SET name = ?, capacity = ?, occupied = ?, updated_at = ?
        WHERE id = ?
        RETURNING id, name, capacity, occupied, updated_at
        "#,
    )
    .bind(name.unwrap_or(&current.name))
    .bind(capacity.unwrap_or(current.capacity))
    .bind(occupied.unwrap_or(current.occupied))
    .bind(Utc::now())
    .bind(id)
    .fetch_one(db)
    .await?;

    Ok(lot)
}

/// Delete a lot by id; returns false when no row matched
pub async fn delete(db: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM parking_lots WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove every lot (seed utility)
pub async fn delete_all(db: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM parking_lots").execute(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let db = init_memory_pool().await.unwrap();

        let created = create(&db, "Lot A", 120, 0).await.unwrap();
        assert_eq!(created.name, "Lot A");
        assert_eq!(created.capacity, 120);
        assert_eq!(created.occupied, 0);

        let found = find_by_name(&db, "Lot A").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        assert!(find_by_name(&db, "Lot Z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_occupied_touches_timestamp() {
        let db = init_memory_pool().await.unwrap();
        let created = create(&db, "Lot A", 120, 0).await.unwrap();

        let updated = update_occupied(&db, "Lot A", 42).await.unwrap();
        assert_eq!(updated.occupied, 42);
        assert_eq!(updated.capacity, 120);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_occupied_missing_lot_is_not_found() {
        let db = init_memory_pool().await.unwrap();
        let err = update_occupied(&db, "Lot X", 5).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let db = init_memory_pool().await.unwrap();
        create(&db, "Lot C", 40, 0).await.unwrap();
        create(&db, "Lot A", 120, 0).await.unwrap();
        create(&db, "Lot B", 80, 0).await.unwrap();

        let names: Vec<String> = list_all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Lot A", "Lot B", "Lot C"]);
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let db = init_memory_pool().await.unwrap();
        let created = create(&db, "Lot A", 120, 10).await.unwrap();

        let updated = update_fields(&db, created.id, None, Some(90), None)
            .await
            .unwrap();
        assert_eq!(updated.name, "Lot A");
        assert_eq!(updated.capacity, 90);
        assert_eq!(updated.occupied, 10);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let db = init_memory_pool().await.unwrap();
        let created = create(&db, "Lot A", 120, 0).await.unwrap();

        assert!(delete(&db, created.id).await.unwrap());
        assert!(!delete(&db, created.id).await.unwrap());
    }
}
