//! Fuzzy matching of free-text names against reference data.

/// Country reference data and lookup
mod country;
/// String similarity scoring
mod score;

pub use country::{
    COUNTRIES_DOMAIN,
    CountryDataError,
    CountryEntry,
    CountryTable,
};
pub use score::score;
