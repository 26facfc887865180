//! Integration tests for the orchestrator and the HTTP fetcher

mod orchestrator_tests;
