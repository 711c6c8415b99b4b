mod base;

pub use base::AdCatalog;
