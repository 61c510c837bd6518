pub mod test_server;

pub use test_server::{refused_url, spawn_test_server, TestServer};
