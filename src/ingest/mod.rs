/// Getting observations in and reports out.
///
/// Submodules:
/// - `table`: untyped CSV tables and the report writer.
/// - `history`: append-to-history merge of daily snapshots.
/// - `backend`: daily snapshot fetch from the backend APIs.

pub mod backend;
pub mod history;
pub mod table;
