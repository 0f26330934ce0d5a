// ABOUTME: HTTP route handlers organized by domain
// ABOUTME: Declares the chat and health route groups mounted by the server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! HTTP routes for the relay server.

pub mod chat;
pub mod health;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;
