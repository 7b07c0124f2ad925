pub mod controller_test;
