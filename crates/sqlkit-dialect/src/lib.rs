//! Database products, their SQL dialects, and the catalog of metadata
//! queries used to introspect them.
//!
//! Built-in products register themselves into [`Registry::global`] on first
//! use. Additional products or versions can be registered at any time; lookups
//! always pick the closest registered version at or below the requested one.

mod dialect;
pub use dialect::{Dialect, InsertStrategy, LastInsertIdMode, LoadStrategy, PresetIdStrategy, UpsertStrategy};

mod kind;
pub use kind::{Criteria, Criterion, Kind};

mod placeholder;
pub use placeholder::{Placeholder, PlaceholderGetter};

mod product;
pub use product::{parse_version, Product};

mod query;
pub use query::{Handler, MetadataQuery, NamePrefix, Rendered, Rowset, StaticRows};

mod registry;
pub use registry::Registry;

pub mod products;
