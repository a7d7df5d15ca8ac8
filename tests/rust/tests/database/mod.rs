//! Database integration tests
//!
//! Run against real SQLite files in temporary directories.

mod migrations;
