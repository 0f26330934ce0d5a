// ABOUTME: Test helper modules shared across integration tests
// ABOUTME: Re-exports the axum request/response testing utilities

pub mod axum_test;
