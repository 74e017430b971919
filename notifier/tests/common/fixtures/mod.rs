//! This module provides reusable test utilities:
//! - In-memory reminder database with timetable seeding helpers
//! - Scripted push transport for dispatcher tests
//! - A wired pipeline (generator, dispatcher, cleanup) on a manual clock
//! - Mock push service (wiremock) for HTTP-level transport tests
//! - Test configuration builders
//! - Common test data

// Allow unused code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_push_service;
pub mod mock_transport;
pub mod test_config;
pub mod test_data;
pub mod test_database;
pub mod test_pipeline;
pub mod test_timetable;

// Re-export commonly used items
pub use mock_push_service::MockPushService;
pub use mock_transport::ScriptedTransport;
pub use test_config::TestConfigBuilder;
pub use test_data::*;
pub use test_database::TestDatabase;
pub use test_pipeline::TestPipeline;
pub use test_timetable::StaticTimetable;
