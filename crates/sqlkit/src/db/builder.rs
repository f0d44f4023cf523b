use super::{Db, Shared};
use crate::Metadata;

use sqlkit_core::Connection;
use sqlkit_dialect::{Product, Registry};

use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Builder {
    registry: Option<&'static Registry>,
    product: Option<Product>,
}

impl Builder {
    /// Registry used instead of [`Registry::global`].
    pub fn registry(mut self, registry: &'static Registry) -> Builder {
        self.registry = Some(registry);
        self
    }

    /// Pins the product instead of detecting it from the connection.
    pub fn product(mut self, product: Product) -> Builder {
        self.product = Some(product);
        self
    }

    pub fn build(self, connection: Arc<dyn Connection>) -> Db {
        let registry = self.registry.unwrap_or_else(Registry::global);
        Db {
            shared: Arc::new(Shared {
                connection,
                metadata: Metadata::new(registry),
                product: self.product,
            }),
        }
    }
}
