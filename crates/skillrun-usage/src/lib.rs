// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token usage accounting for the Skillrun execution engine.
//!
//! The [`ProviderCatalog`] resolves model names to provider items (with a
//! synthesized fallback for unregistered models) and the [`UsageLedger`]
//! records the usage reports produced by invocations.

pub mod ledger;
pub mod provider;

pub use ledger::{UsageLedger, UsageRecord, UsageTotals};
pub use provider::{ProviderCatalog, ProviderItem, ResolvedProvider};
