use crate::{Placeholder, PlaceholderGetter, Product};

/// How multiple rows are inserted in one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertStrategy {
    /// `INSERT INTO t (..) VALUES (..), (..)`
    #[default]
    MultiValues,

    /// One `VALUES` group per statement
    SingleValues,
}

/// How an insert-or-update is expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpsertStrategy {
    /// No native upsert; merges are decomposed into insert, update and delete
    #[default]
    Undefined,

    /// `INSERT .. ON CONFLICT (..) DO UPDATE SET ..`
    OnConflict,

    /// `INSERT .. ON DUPLICATE KEY UPDATE ..`
    OnDuplicateKey,

    /// `MERGE INTO .. USING ..`
    MergeInto,
}

/// How a bulk load body is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStrategy {
    /// No bulk load support
    #[default]
    Undefined,

    /// `LOAD DATA LOCAL INFILE`
    LoadDataLocal,

    /// `COPY .. FROM STDIN`
    CopyFromStdin,
}

/// Which row of a multi-row insert the driver's last insert id refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LastInsertIdMode {
    /// The id of the first inserted row
    First,

    /// The id of the last inserted row
    #[default]
    Last,
}

/// How identity values are assigned when the database does not generate them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresetIdStrategy {
    /// Identity values are left as supplied
    #[default]
    Undefined,

    /// Ids continue from `MAX(id)` of the table
    Max,

    /// Ids are drawn from the column's sequence
    Sequence,
}

/// SQL rendering rules and capabilities of a product.
#[derive(Debug, Clone)]
pub struct Dialect {
    pub product: Product,
    pub placeholder: Placeholder,

    /// Writes run inside a transaction by default
    pub transactional: bool,

    pub insert: InsertStrategy,
    pub upsert: UpsertStrategy,
    pub load: LoadStrategy,

    pub can_autoincrement: bool,
    pub can_last_insert_id: bool,
    pub can_returning: bool,

    pub last_insert_id_mode: LastInsertIdMode,

    /// Identifier quote character
    pub quote: char,

    pub preset_id: PresetIdStrategy,
}

impl Dialect {
    /// An ANSI dialect for `product`; adjust with the `with_*` setters.
    pub fn new(product: Product) -> Dialect {
        Dialect {
            product,
            placeholder: Placeholder::Fixed("?"),
            transactional: true,
            insert: InsertStrategy::MultiValues,
            upsert: UpsertStrategy::Undefined,
            load: LoadStrategy::Undefined,
            can_autoincrement: false,
            can_last_insert_id: false,
            can_returning: false,
            last_insert_id_mode: LastInsertIdMode::Last,
            quote: '"',
            preset_id: PresetIdStrategy::Undefined,
        }
    }

    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Dialect {
        self.placeholder = placeholder;
        self
    }

    pub fn with_transactional(mut self, transactional: bool) -> Dialect {
        self.transactional = transactional;
        self
    }

    pub fn with_insert(mut self, insert: InsertStrategy) -> Dialect {
        self.insert = insert;
        self
    }

    pub fn with_upsert(mut self, upsert: UpsertStrategy) -> Dialect {
        self.upsert = upsert;
        self
    }

    pub fn with_load(mut self, load: LoadStrategy) -> Dialect {
        self.load = load;
        self
    }

    pub fn with_autoincrement(mut self, can: bool) -> Dialect {
        self.can_autoincrement = can;
        self
    }

    pub fn with_last_insert_id(mut self, can: bool, mode: LastInsertIdMode) -> Dialect {
        self.can_last_insert_id = can;
        self.last_insert_id_mode = mode;
        self
    }

    pub fn with_returning(mut self, can: bool) -> Dialect {
        self.can_returning = can;
        self
    }

    pub fn with_quote(mut self, quote: char) -> Dialect {
        self.quote = quote;
        self
    }

    pub fn with_preset_id(mut self, preset_id: PresetIdStrategy) -> Dialect {
        self.preset_id = preset_id;
        self
    }

    /// Returns a fresh placeholder getter.
    pub fn placeholder_getter(&self) -> PlaceholderGetter {
        self.placeholder.getter()
    }

    /// Quotes an identifier, doubling embedded quote characters.
    pub fn quote_ident(&self, ident: &str) -> String {
        let quote = self.quote;
        let escaped = ident.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Returns `true` when inserted identities can be read back, either
    /// through `RETURNING` or the driver's last insert id.
    pub fn can_read_back_identity(&self) -> bool {
        self.can_returning || self.can_last_insert_id
    }
}

impl Default for Dialect {
    fn default() -> Dialect {
        Dialect::new(Product::new(crate::products::ansi::NAME, ""))
    }
}
