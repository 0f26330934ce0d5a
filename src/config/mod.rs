// ABOUTME: Configuration module for the chat relay server
// ABOUTME: Re-exports the environment-backed configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Server configuration, loaded from the process environment.

pub mod environment;

pub use environment::{
    AuthConfig, LlmEnvConfig, PipelineConfig, ServerConfig, StoreConfig, TelemetryConfig,
};
