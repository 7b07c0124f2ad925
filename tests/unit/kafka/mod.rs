pub mod consumer_manager_test;
