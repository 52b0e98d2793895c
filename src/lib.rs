pub mod config;
pub mod error;
pub mod fuzzy_matcher;
pub mod geo;
pub mod index;
pub mod ingestion;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod store;

pub use config::{LocationPolicy, ReconcileConfig};
pub use error::{ReconcileError, Result};
pub use geo::GeoCoordinate;
pub use index::CanonicalIndex;
pub use model::{CandidateCoordinate, CandidateRecord, CanonicalRecord};
pub use normalize::{canonicalize, CanonicalizeOptions};
pub use reconcile::Reconciler;
pub use report::ReconcileReport;
