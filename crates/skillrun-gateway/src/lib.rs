// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Skillrun execution engine.
//!
//! Clients either stream an invocation live over Server-Sent Events or
//! queue it for a worker and poll the result.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{GatewayState, ServerConfig, build_router, start_server};
