//! Integration tests for League Harvest
//!
//! These run the whole pipeline against wiremock servers standing in for the
//! league source.

mod harvest_tests;
mod source_tests;
