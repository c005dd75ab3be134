//! Domain entity types shared across the storage façade, the remote
//! adapters, and the HTTP surface.

pub mod conductor;
pub mod passenger;
pub mod report;
pub mod signature;
pub mod trip;
pub mod user;

pub use conductor::{Conductor, ConductorInput};
pub use passenger::{Passenger, PassengerInput};
pub use report::{DailyReport, ReportMeta, ReportRow, StoredReport};
pub use signature::{ConductorCredential, Signature, check_embedded_payload};
pub use trip::{FinishTripInput, StartTripInput, Trip, TripStatus};
pub use user::{Role, User};
