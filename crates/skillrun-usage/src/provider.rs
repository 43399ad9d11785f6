// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider catalog: maps model names to registered provider items.
//!
//! Models missing from the catalog get a synthesized identity so usage is
//! never dropped. Synthesized identities are not authoritative for billing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use skillrun_config::model::UsageConfig;
use skillrun_core::jobs::ModelInfo;

/// A registered (or synthesized) provider item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderItem {
    pub item_id: String,
    pub provider: String,
    pub model_name: String,
    pub tier: String,
}

/// Result of resolving a model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub item: ProviderItem,
    /// The model was not registered and the identity was made up.
    pub synthesized: bool,
}

impl ResolvedProvider {
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_name: self.item.model_name.clone(),
            provider: self.item.provider.clone(),
            provider_item_id: self.item.item_id.clone(),
            tier: self.item.tier.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    by_model: HashMap<String, ProviderItem>,
    default_tier: String,
    fallback_provider: String,
}

impl ProviderCatalog {
    pub fn from_config(config: &UsageConfig) -> Self {
        let by_model = config
            .providers
            .iter()
            .map(|p| {
                (
                    p.model_name.clone(),
                    ProviderItem {
                        item_id: p.item_id.clone(),
                        provider: p.provider.clone(),
                        model_name: p.model_name.clone(),
                        tier: p.tier.clone(),
                    },
                )
            })
            .collect();
        Self {
            by_model,
            default_tier: config.default_tier.clone(),
            fallback_provider: config.fallback_provider.clone(),
        }
    }

    /// Resolves a model name, synthesizing an identity for unknown models.
    pub fn resolve(&self, model_name: &str) -> ResolvedProvider {
        if let Some(item) = self.by_model.get(model_name) {
            return ResolvedProvider {
                item: item.clone(),
                synthesized: false,
            };
        }
        ResolvedProvider {
            item: ProviderItem {
                item_id: format!("dynamic:{model_name}"),
                provider: self.infer_provider(model_name),
                model_name: model_name.to_string(),
                tier: self.default_tier.clone(),
            },
            synthesized: true,
        }
    }

    /// Guesses the provider from well-known model name substrings.
    fn infer_provider(&self, model_name: &str) -> String {
        let lower = model_name.to_lowercase();
        let provider = if lower.contains("claude") {
            "anthropic"
        } else if lower.starts_with("gpt") || lower.starts_with("o1") || lower.starts_with("o3") {
            "openai"
        } else if lower.contains("gemini") {
            "google"
        } else if lower.contains("deepseek") {
            "deepseek"
        } else {
            return self.fallback_provider.clone();
        };
        provider.to_string()
    }
}
