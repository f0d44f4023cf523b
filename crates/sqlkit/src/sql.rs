//! SQL builders for batched statements.
//!
//! Insert, delete and upsert builders render their SQL once for the largest
//! batch and serve smaller batches by truncating the rendered text. The
//! result is byte-for-byte the SQL a builder for the smaller batch renders.

mod batched;
use batched::Batched;

mod delete;
pub use delete::Delete;

mod insert;
pub use insert::Insert;

mod update;
pub use update::Update;

mod upsert;
pub use upsert::Upsert;
