use async_trait::async_trait;
use serde_json::Value;
use sqlx::AnyConnection;

use super::{decode_record, insert_err, BatchLoader, Layout, LoadError, RowCounts};
use crate::hotelbeds::model::{content_of, FacilityType};

pub const TABLE: &str = "hb_facilities_data";

const INSERT_FACILITY_TYPE: &str = "INSERT INTO hb_facilities_data \
     (code, facility_group_code, facility_typology_code, description) \
     VALUES ($1, $2, $3, $4)";

/// Facility type catalogue (`/types/facilities`), one row per entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacilityCatalogueLoader;

#[async_trait]
impl BatchLoader for FacilityCatalogueLoader {
    fn layout(&self) -> Layout {
        Layout::FacilityCatalogue
    }

    async fn insert_record(
        &self,
        conn: &mut AnyConnection,
        index: usize,
        record: &Value,
        counts: &mut RowCounts,
    ) -> Result<(), LoadError> {
        let facility: FacilityType = decode_record(record, index)?;

        sqlx::query(INSERT_FACILITY_TYPE)
            .bind(facility.code.as_deref())
            .bind(facility.facility_group_code)
            .bind(facility.facility_typology_code)
            .bind(content_of(&facility.description))
            .execute(&mut *conn)
            .await
            .map_err(insert_err(TABLE))?;
        counts.add(TABLE);
        Ok(())
    }
}
