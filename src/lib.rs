//! Hotelbeds content ETL: pages the content API in fixed index windows,
//! archives each raw response and loads it into SQL in one transaction per
//! window.

pub mod archive;
pub mod config;
pub mod hotelbeds;
pub mod loader;
pub mod pipeline;
pub mod tracing;

pub mod util {
    pub mod db;
    pub mod env;
}
