mod flush_test;
mod scheduler_test;
