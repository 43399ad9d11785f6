// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database`.

pub mod code_artifacts;
pub mod documents;
pub mod queue;
pub mod results;
pub mod users;
