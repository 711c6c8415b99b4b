mod counter_store_test;
mod flush_test;
mod ledger_store_test;
