mod base;

pub use base::AggregateStore;
