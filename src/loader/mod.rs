//! Batch loaders: map one fetched payload onto relational rows inside a single
//! transaction.
//!
//! Each strategy only knows how to write one record; [`load_batch`] owns the
//! transaction, so a batch either commits as a whole or leaves nothing behind.

pub mod facilities;
pub mod normalized;
pub mod wide;

pub use facilities::FacilityCatalogueLoader;
pub use normalized::NormalizedLoader;
pub use wide::WideLoader;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{AnyConnection, Connection};
use tracing::{error, info};

use crate::hotelbeds::model::{content_of, HotelSummary};
use crate::hotelbeds::Resource;

/// Destination table design. One layout is picked per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Layout {
    /// One general-info row per hotel plus dependent tables per collection.
    Normalized,
    /// One wide row per hotel with nested collections stored as JSON text.
    Wide,
    /// Facility type catalogue rows.
    #[value(skip)]
    FacilityCatalogue,
}

impl Layout {
    pub fn resource(self) -> Resource {
        match self {
            Layout::Normalized | Layout::Wide => Resource::Hotels,
            Layout::FacilityCatalogue => Resource::Facilities,
        }
    }

    pub fn tables(self) -> &'static [&'static str] {
        match self {
            Layout::Normalized => normalized::TABLES,
            Layout::Wide => &[wide::TABLE],
            Layout::FacilityCatalogue => &[facilities::TABLE],
        }
    }

    pub fn loader(self) -> Box<dyn BatchLoader> {
        match self {
            Layout::Normalized => Box::new(NormalizedLoader),
            Layout::Wide => Box::new(WideLoader),
            Layout::FacilityCatalogue => Box::new(FacilityCatalogueLoader),
        }
    }

    /// Default log file for runs of this layout.
    pub fn default_log_file(self) -> &'static str {
        match self {
            Layout::Normalized => "hotel_data.log",
            Layout::Wide => "hotel_data_wide.log",
            Layout::FacilityCatalogue => "facility_data.log",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("payload has no `{key}` array")]
    MissingCollection { key: &'static str },
    #[error("record {index}: mandatory field `{field}` is missing")]
    MissingField {
        index: usize,
        field: &'static str,
        table: &'static str,
    },
    #[error("record {index}: cannot decode: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("record {index}: cannot encode {column} for {table}: {source}")]
    Encode {
        index: usize,
        table: &'static str,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("insert into {table} failed: {source}")]
    Insert {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("transaction {action} failed: {source}")]
    Transaction {
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl LoadError {
    /// Table being written when the error happened, if any.
    pub fn table(&self) -> Option<&'static str> {
        match self {
            LoadError::MissingField { table, .. }
            | LoadError::Encode { table, .. }
            | LoadError::Insert { table, .. } => Some(*table),
            LoadError::MissingCollection { .. }
            | LoadError::Decode { .. }
            | LoadError::Transaction { .. } => None,
        }
    }
}

pub(crate) fn insert_err(table: &'static str) -> impl FnOnce(sqlx::Error) -> LoadError {
    move |source| LoadError::Insert { table, source }
}

/// Rows written per table for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCounts(BTreeMap<&'static str, u64>);

impl RowCounts {
    pub fn add(&mut self, table: &'static str) {
        *self.0.entry(table).or_insert(0) += 1;
    }

    pub fn get(&self, table: &str) -> u64 {
        self.0.get(table).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn merge(&mut self, other: &RowCounts) {
        for (table, n) in &other.0 {
            *self.0.entry(table).or_insert(0) += n;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.0.iter().map(|(t, n)| (*t, *n))
    }
}

#[async_trait]
pub trait BatchLoader: Send + Sync {
    fn layout(&self) -> Layout;

    /// Write one record. Runs inside the batch transaction; any error aborts
    /// the whole batch.
    async fn insert_record(
        &self,
        conn: &mut AnyConnection,
        index: usize,
        record: &Value,
        counts: &mut RowCounts,
    ) -> Result<(), LoadError>;
}

/// The record array of a payload.
pub fn records<'a>(payload: &'a Value, key: &'static str) -> Result<&'a [Value], LoadError> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or(LoadError::MissingCollection { key })
}

/// Load every record of `payload` in one transaction.
///
/// Commits once at the end. On the first failing record the transaction is
/// rolled back, the failing table is logged and the error returned.
pub async fn load_batch(
    conn: &mut AnyConnection,
    loader: &dyn BatchLoader,
    payload: &Value,
) -> Result<RowCounts, LoadError> {
    let layout = loader.layout();
    let resource = layout.resource();
    let records: &[Value] = match records(payload, resource.collection_key()) {
        Ok(records) => records,
        Err(LoadError::MissingCollection { .. }) if !resource.collection_required() => &[],
        Err(err) => return Err(err),
    };

    let mut tx = conn
        .begin()
        .await
        .map_err(|source| LoadError::Transaction {
            action: "begin",
            source,
        })?;
    let mut counts = RowCounts::default();

    for (index, record) in records.iter().enumerate() {
        if let Err(err) = loader
            .insert_record(&mut *tx, index, record, &mut counts)
            .await
        {
            error!(
                ?layout,
                table = err.table().unwrap_or("-"),
                record = index,
                error = %err,
                "error inserting batch; rolling back"
            );
            if let Err(rb) = tx.rollback().await {
                error!(error = %rb, "rollback failed");
            }
            return Err(err);
        }
    }

    tx.commit()
        .await
        .map_err(|source| LoadError::Transaction {
            action: "commit",
            source,
        })?;
    info!(
        ?layout,
        records = records.len(),
        rows = counts.total(),
        "data inserted successfully"
    );
    Ok(counts)
}

/// Hotel attributes whose absence aborts the batch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HotelHeader<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub category_code: &'a str,
    pub accommodation_type_code: &'a str,
    pub last_update: &'a str,
    pub ranking: i64,
}

impl<'a> HotelHeader<'a> {
    pub fn extract(
        hotel: &'a HotelSummary,
        index: usize,
        table: &'static str,
    ) -> Result<Self, LoadError> {
        let missing = |field| LoadError::MissingField {
            index,
            field,
            table,
        };
        Ok(Self {
            code: hotel.code.as_deref().ok_or_else(|| missing("code"))?,
            name: content_of(&hotel.name).ok_or_else(|| missing("name.content"))?,
            category_code: hotel
                .category_code
                .as_deref()
                .ok_or_else(|| missing("categoryCode"))?,
            accommodation_type_code: hotel
                .accommodation_type_code
                .as_deref()
                .ok_or_else(|| missing("accommodationTypeCode"))?,
            last_update: hotel
                .last_update
                .as_deref()
                .ok_or_else(|| missing("lastUpdate"))?,
            ranking: hotel.ranking.ok_or_else(|| missing("ranking"))?,
        })
    }
}

pub(crate) fn decode_record<T>(record: &Value, index: usize) -> Result<T, LoadError>
where
    T: serde::de::DeserializeOwned,
{
    T::deserialize(record).map_err(|source| LoadError::Decode { index, source })
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::AnyConnection;

    use super::Layout;
    use crate::util::db::Db;

    pub async fn sqlite_with(layout: Layout) -> Db {
        let mut db = Db::connect("sqlite::memory:").await.unwrap();
        db.init_schema(layout).await.unwrap();
        db
    }

    pub async fn count(conn: &mut AnyConnection, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(conn)
            .await
            .unwrap()
    }
}
