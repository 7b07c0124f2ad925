pub mod classifier_test;
pub mod worker_pool_test;
