//! Overflow pricing lookup
//!
//! Resolves a model identifier to per-1k-token overflow prices. Sources, later ones winning:
//! the built-in table, optionally the LiteLLM price list (`pricing` feature), then entries
//! from the config file.

use crate::cost::output_weight;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

#[cfg(feature = "pricing")]
use anyhow::{Context, Result};
#[cfg(feature = "pricing")]
use tracing::{debug, info};

#[cfg(feature = "pricing")]
const LITELLM_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// Currency per 1,000 input tokens.
    pub input_per_1k: f64,
    /// Currency per 1,000 output tokens.
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    pub fn output_weight(&self) -> f64 {
        output_weight(self.input_per_1k, self.output_per_1k)
    }
}

/// How a lookup was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMatch {
    Exact,
    Normalized,
    Fallback,
    /// Prices given explicitly by the caller
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLookup {
    pub requested: String,
    pub resolved: String,
    pub price: ModelPrice,
    #[serde(rename = "match")]
    pub matched: PriceMatch,
}

#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelPrice>,
    default_model: String,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PriceLookup {
    pub fn manual(price: ModelPrice) -> Self {
        Self {
            requested: "manual".to_string(),
            resolved: "manual".to_string(),
            price,
            matched: PriceMatch::Manual,
        }
    }
}

impl PricingTable {
    /// Pay-as-you-go list prices for common Azure OpenAI deployments.
    pub fn builtin() -> Self {
        let entries = [
            ("gpt-4o", 0.0025, 0.01),
            ("gpt-4o-mini", 0.00015, 0.0006),
            ("gpt-4.1", 0.002, 0.008),
            ("gpt-4.1-mini", 0.0004, 0.0016),
            ("gpt-4.1-nano", 0.0001, 0.0004),
            ("gpt-4-turbo", 0.01, 0.03),
            ("gpt-4", 0.03, 0.06),
            ("gpt-4-32k", 0.06, 0.12),
            ("gpt-35-turbo", 0.0005, 0.0015),
            ("o1", 0.015, 0.06),
            ("o3-mini", 0.0011, 0.0044),
        ];

        let models = entries
            .into_iter()
            .map(|(name, input, output)| (name.to_string(), ModelPrice::new(input, output)))
            .collect();

        Self {
            models,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Insert or replace entries; names are stored lowercased.
    pub fn merge(&mut self, prices: &HashMap<String, ModelPrice>) {
        for (name, price) in prices {
            self.models.insert(name.trim().to_lowercase(), *price);
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Models sorted by name.
    pub fn list(&self) -> Vec<(&str, &ModelPrice)> {
        let mut models: Vec<_> = self
            .models
            .iter()
            .map(|(name, price)| (name.as_str(), price))
            .collect();
        models.sort_by(|a, b| a.0.cmp(b.0));
        models
    }

    /// Resolve `model`, falling back to the default model.
    ///
    /// Returns `None` only when neither the model nor the default model is known.
    pub fn lookup(&self, model: &str) -> Option<PriceLookup> {
        if let Some(price) = self.models.get(model) {
            return Some(PriceLookup {
                requested: model.to_string(),
                resolved: model.to_string(),
                price: *price,
                matched: PriceMatch::Exact,
            });
        }

        let normalized = normalize_model_name(model);
        if let Some(price) = self.models.get(&normalized) {
            return Some(PriceLookup {
                requested: model.to_string(),
                resolved: normalized,
                price: *price,
                matched: PriceMatch::Normalized,
            });
        }

        let fallback = normalize_model_name(&self.default_model);
        let price = self.models.get(&fallback)?;
        warn!(
            model = %model,
            fallback = %fallback,
            "No pricing found for model, using default model pricing"
        );
        Some(PriceLookup {
            requested: model.to_string(),
            resolved: fallback,
            price: *price,
            matched: PriceMatch::Fallback,
        })
    }

    /// Fetch the LiteLLM price list, converted to per-1k prices.
    #[cfg(feature = "pricing")]
    pub async fn fetch_litellm() -> Result<HashMap<String, ModelPrice>> {
        info!("Fetching model pricing from LiteLLM API");

        let client = reqwest::Client::new();
        let response = client
            .get(LITELLM_PRICING_URL)
            .send()
            .await
            .context("Failed to fetch pricing data from LiteLLM")?
            .error_for_status()
            .context("LiteLLM pricing request failed")?;

        let all_pricing: HashMap<String, serde_json::Value> = response
            .json()
            .await
            .context("Failed to parse pricing data JSON")?;

        let prices = parse_litellm_prices(&all_pricing);
        info!("Successfully fetched pricing for {} models", prices.len());
        debug!(models = ?prices.keys().collect::<Vec<_>>(), "Available models");

        Ok(prices)
    }
}

/// Keep entries that carry both per-token costs, scaled to per-1k.
pub fn parse_litellm_prices(
    all_pricing: &HashMap<String, serde_json::Value>,
) -> HashMap<String, ModelPrice> {
    all_pricing
        .iter()
        .filter_map(|(name, entry)| {
            let input = entry.get("input_cost_per_token")?.as_f64()?;
            let output = entry.get("output_cost_per_token")?.as_f64()?;
            Some((name.clone(), ModelPrice::new(input * 1000.0, output * 1000.0)))
        })
        .collect()
}

/// Normalize a model name to the table's naming convention.
///
/// Lowercases, drops a provider prefix (`azure/`), maps `gpt-3.5` to `gpt-35` and strips a
/// trailing date or version suffix (`-2024-08-06`, `-20240806`, `-0613`).
pub fn normalize_model_name(model: &str) -> String {
    let mut name = model.trim().to_lowercase();

    if let Some((_, rest)) = name.rsplit_once('/') {
        name = rest.to_string();
    }

    name = name.replace("gpt-3.5", "gpt-35");

    // -YYYY-MM-DD
    let parts: Vec<&str> = name.split('-').collect();
    if parts.len() > 3 {
        let tail = &parts[parts.len() - 3..];
        let is_date = tail[0].len() == 4
            && tail[1].len() == 2
            && tail[2].len() == 2
            && tail.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()));
        if is_date {
            return parts[..parts.len() - 3].join("-");
        }
    }

    // -YYYYMMDD or -MMDD
    if let Some((head, tail)) = name.rsplit_once('-') {
        if (tail.len() == 8 || tail.len() == 4)
            && tail.chars().all(|c| c.is_ascii_digit())
            && !head.is_empty()
        {
            return head.to_string();
        }
    }

    name
}
