//! Remote mirrors: the spreadsheet adapter for passenger rows and the
//! relational adapter for report metadata. Both are cache mirrors of the
//! local stores, never the source of truth, except immediately after an
//! explicit pull.

pub mod oauth;
pub mod sheets;
pub mod supabase;

pub use sheets::SheetsApi;
pub use supabase::ReportsApi;
