extern crate self as sqlkit;

pub mod cache;
pub use cache::Cache;

pub mod db;
pub use db::Db;

pub mod field;
pub use field::Field;

pub mod load;
pub use load::{LoadConfig, LoadFormat, Loader};

pub mod mapper;
pub use mapper::{GenericMapper, RecordMapper};

pub mod mapper_cache;
pub use mapper_cache::MapperCache;

pub mod matcher;
pub use matcher::{Matcher, Resolver, Slot, Unmapped};

pub mod merge;
pub use merge::{MergeConfig, MergeReport, MergeStrategy, Merger};

pub mod metadata;
pub use metadata::Metadata;

mod options;
pub use options::{Options, DEFAULT_BATCH_SIZE};

pub mod presence;
pub use presence::Presence;

pub mod reader;
pub use reader::Reader;

pub mod session;
pub use session::{Deleter, InsertOutcome, Inserter, Updater};

pub mod sql;

pub mod stringifier;
pub use stringifier::{ReaderConfig, StringifyConfig, Stringifier};

pub mod validator;
pub use validator::{Validation, Validator};

pub use sqlkit_core::{
    bail, driver, err, Cell, Column, Connection, Error, FieldDef, Record, Result, ScanType, Tag,
    Value, Violation,
};
pub use sqlkit_dialect as dialect;
pub use sqlkit_dialect::{Dialect, Kind, Product, Registry};
pub use sqlkit_macros::Record;

#[doc(hidden)]
pub mod codegen_support {
    pub use sqlkit_core::{FieldDef, Record, Result};
}
