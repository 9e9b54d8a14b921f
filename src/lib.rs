pub mod csv;
pub mod fetch;
pub mod geocode;
pub mod process;
pub mod query;
pub mod schema;
pub mod session;

pub use geocode::{GeoPoint, Geocoder};
pub use process::TripRecord;
pub use query::{CityAggregate, FilterCriteria, Totals};
pub use session::Session;
