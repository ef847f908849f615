pub mod model;
pub mod provider;
pub mod signature;

pub use provider::HotelbedsProvider;

use std::fmt;

/// Content API collections this crate knows how to pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Hotels,
    Facilities,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Resource::Hotels => "/hotels",
            Resource::Facilities => "/types/facilities",
        }
    }

    /// Name of the array holding the records in a response payload.
    pub fn collection_key(self) -> &'static str {
        match self {
            Resource::Hotels => "hotels",
            Resource::Facilities => "facilities",
        }
    }

    /// Whether a payload without the collection array is an error. Catalogue
    /// windows past the last entry come back without one.
    pub fn collection_required(self) -> bool {
        matches!(self, Resource::Hotels)
    }

    pub fn use_secondary_language(self) -> bool {
        matches!(self, Resource::Facilities)
    }

    pub fn archive_prefix(self) -> &'static str {
        match self {
            Resource::Hotels => "hotel_data",
            Resource::Facilities => "facility_data",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_key())
    }
}
