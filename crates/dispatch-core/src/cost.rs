//! Cost estimation for a dispatch candidate.
//!
//! Pure function of (prompt size, expected output, simulated model name, a
//! price book) apart from the optional variance draw applied once per
//! [`Policy::rank`](crate::policy::Policy::rank) evaluation. Nothing here
//! talks to a real billing API — the authoritative price table is an
//! external collaborator; this crate ships [`StaticPriceBook`] so it stays
//! independently testable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Price book
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    pub input_usd_per_1k: f64,
    pub output_usd_per_1k: f64,
}

pub trait PriceBook: Send + Sync {
    fn rate(&self, simulated_model_name: &str) -> ModelRate;
}

/// In-memory price table keyed by simulated model name, falling back to a
/// `"default"` entry for unknown keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPriceBook {
    rates: HashMap<String, ModelRate>,
}

impl StaticPriceBook {
    pub fn new() -> Self {
        let mut rates = HashMap::new();
        rates.insert(
            "default".to_string(),
            ModelRate {
                input_usd_per_1k: 0.0015,
                output_usd_per_1k: 0.002,
            },
        );
        Self { rates }
    }

    pub fn with_rate(mut self, simulated_model_name: impl Into<String>, rate: ModelRate) -> Self {
        self.rates.insert(simulated_model_name.into(), rate);
        self
    }
}

impl Default for StaticPriceBook {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceBook for StaticPriceBook {
    fn rate(&self, simulated_model_name: &str) -> ModelRate {
        self.rates
            .get(simulated_model_name)
            .copied()
            .unwrap_or_else(|| self.rates["default"])
    }
}

// ---------------------------------------------------------------------------
// Jitter source
// ---------------------------------------------------------------------------

/// Source of the exploration jitter and cost-variance draws. Injectable so
/// tests can pin a deterministic value instead of `rand::thread_rng`.
pub trait JitterSource: Send + Sync {
    /// Uniform draw in `[low, high)`.
    fn uniform(&self, low: f64, high: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn uniform(&self, low: f64, high: f64) -> f64 {
        use rand::Rng;
        rand::thread_rng().gen_range(low..high)
    }
}

/// Always returns `low`; used by tests that need a deterministic score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroJitter;

impl JitterSource for ZeroJitter {
    fn uniform(&self, low: f64, _high: f64) -> f64 {
        low
    }
}

// ---------------------------------------------------------------------------
// Cost parameters / estimate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostParams {
    pub simulated_model_name: String,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
    #[serde(default)]
    pub request_fixed_fee_usd: f64,
    #[serde(default = "default_discount_factor")]
    pub discount_factor: f64,
}

fn default_chars_per_token() -> f64 {
    4.0
}

fn default_discount_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub fixed_fee_usd: f64,
    pub total_usd: f64,
    pub simulated_model_name: String,
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

pub struct CostEstimator<'a> {
    price_book: &'a dyn PriceBook,
}

impl<'a> CostEstimator<'a> {
    pub fn new(price_book: &'a dyn PriceBook) -> Self {
        Self { price_book }
    }

    /// Estimate cost with no variance applied.
    pub fn estimate(
        &self,
        prompt_chars: usize,
        expected_output_tokens: Option<u64>,
        params: &CostParams,
    ) -> CostEstimate {
        let rate = self.price_book.rate(&params.simulated_model_name);

        let input_tokens = ((prompt_chars as f64) / params.chars_per_token).ceil() as u64;
        let output_tokens = match expected_output_tokens {
            Some(n) if n > 0 => n,
            _ => ((input_tokens as f64) * 0.2).ceil().max(1.0) as u64,
        };

        let input_cost_usd = (input_tokens as f64 / 1000.0) * rate.input_usd_per_1k;
        let output_cost_usd = (output_tokens as f64 / 1000.0) * rate.output_usd_per_1k;
        let fixed_fee_usd = params.request_fixed_fee_usd;

        let discount = params.discount_factor;
        let input_cost_usd = input_cost_usd * discount;
        let output_cost_usd = output_cost_usd * discount;
        let fixed_fee_usd = fixed_fee_usd * discount;
        let total_usd = input_cost_usd + output_cost_usd + fixed_fee_usd;

        CostEstimate {
            input_tokens,
            output_tokens,
            input_cost_usd,
            output_cost_usd,
            fixed_fee_usd,
            total_usd,
            simulated_model_name: params.simulated_model_name.clone(),
        }
    }

    /// Estimate cost with a single variance draw applied to the input/output
    /// cost components (and therefore to the total). `fixed_fee_usd` is
    /// never varied.
    pub fn estimate_with_variance(
        &self,
        prompt_chars: usize,
        expected_output_tokens: Option<u64>,
        params: &CostParams,
        jitter: &dyn JitterSource,
    ) -> CostEstimate {
        let base = self.estimate(prompt_chars, expected_output_tokens, params);
        let j = jitter.uniform(-0.05, 0.05);
        let factor = 1.0 + j;

        let input_cost_usd = base.input_cost_usd * factor;
        let output_cost_usd = base.output_cost_usd * factor;
        let total_usd = input_cost_usd + output_cost_usd + base.fixed_fee_usd;

        CostEstimate {
            total_usd,
            input_cost_usd,
            output_cost_usd,
            ..base
        }
    }
}
