/// Repository layer for database operations
use crate::domain::{FarmRecord, FieldRecord};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

/// Lookup of fields by id
#[async_trait]
pub trait FieldRepository: Send + Sync {
    async fn find_field(&self, field_id: &str) -> Result<Option<FieldRecord>, sqlx::Error>;
}

type FieldRow = (
    String,
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
    Option<Value>,
    Option<Value>,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
);

/// Fields repository over the Supabase Postgres schema
#[derive(Clone)]
pub struct PgFieldRepo {
    pool: PgPool,
}

impl PgFieldRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FieldRepository for PgFieldRepo {
    /// Load a field with its parent farm
    async fn find_field(&self, field_id: &str) -> Result<Option<FieldRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, FieldRow>(
            "SELECT f.id::text, f.name, f.area::float8, f.crop_type, f.soil_type,
                    f.latitude::float8, f.longitude::float8,
                    to_jsonb(f.centroid), to_jsonb(f.boundary_coordinates),
                    fa.id::text, fa.name, fa.latitude::float8, fa.longitude::float8
             FROM fields f
             LEFT JOIN farms fa ON fa.id = f.farm_id
             WHERE f.id::text = $1
             LIMIT 1",
        )
        .bind(field_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(field_from_row))
    }
}

fn field_from_row(row: FieldRow) -> FieldRecord {
    let (
        id,
        name,
        area,
        crop_type,
        soil_type,
        latitude,
        longitude,
        centroid,
        boundary_coordinates,
        farm_id,
        farm_name,
        farm_latitude,
        farm_longitude,
    ) = row;

    FieldRecord {
        id,
        name,
        area,
        crop_type,
        soil_type,
        latitude,
        longitude,
        centroid: centroid.filter(|v| !v.is_null()),
        boundary_coordinates: boundary_coordinates.filter(|v| !v.is_null()),
        farm: farm_id.map(|id| FarmRecord {
            id,
            name: farm_name,
            latitude: farm_latitude,
            longitude: farm_longitude,
        }),
    }
}
