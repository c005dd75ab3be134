pub mod import;
pub mod pdf;
pub mod registry;
pub mod reports;
pub mod sync;

pub use import::{ImportSummary, import_passengers_csv};
pub use registry::Registry;
pub use reports::ReportService;
pub use sync::{PullSummary, PushOutcome, SyncService};
