//! # Spending ceiling
//!
//! Token usage reported by the provider is priced per model and summed. Once
//! the running total reaches `max_budget`, further model calls are refused.

use crate::error::{Error, Result};
use crate::provider::{Usage, UsageTracker};

/// Rough characters-per-token ratio for servers that omit usage
const CHARS_PER_TOKEN: usize = 4;

/// USD per 1K tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl ModelPricing {
    pub fn cost(&self, usage: &Usage) -> f64 {
        (usage.prompt_tokens as f64 / 1000.0) * self.prompt_per_1k
            + (usage.completion_tokens as f64 / 1000.0) * self.completion_per_1k
    }
}

// Longest prefixes first: "gpt-4o-mini" must win over "gpt-4o" and "gpt-4".
const PRICES: &[(&str, ModelPricing)] = &[
    ("gpt-4o-mini", ModelPricing { prompt_per_1k: 0.00015, completion_per_1k: 0.0006 }),
    ("gpt-4o", ModelPricing { prompt_per_1k: 0.005, completion_per_1k: 0.015 }),
    ("gpt-4-turbo", ModelPricing { prompt_per_1k: 0.01, completion_per_1k: 0.03 }),
    ("gpt-4-32k", ModelPricing { prompt_per_1k: 0.06, completion_per_1k: 0.12 }),
    ("gpt-4", ModelPricing { prompt_per_1k: 0.03, completion_per_1k: 0.06 }),
    ("gpt-3.5-turbo-16k", ModelPricing { prompt_per_1k: 0.003, completion_per_1k: 0.004 }),
    ("gpt-3.5-turbo", ModelPricing { prompt_per_1k: 0.0015, completion_per_1k: 0.002 }),
];

/// Price for a model, matched by prefix so dated variants resolve too.
pub fn pricing_for(model: &str) -> Option<ModelPricing> {
    PRICES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, pricing)| *pricing)
}

/// Approximate usage from character counts.
pub fn estimate_usage(prompt_chars: usize, completion_chars: usize) -> Usage {
    let prompt_tokens = prompt_chars.div_ceil(CHARS_PER_TOKEN);
    let completion_tokens = completion_chars.div_ceil(CHARS_PER_TOKEN);
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

#[derive(Debug, Clone)]
pub struct BudgetTracker {
    max_budget: f64,
    spent: f64,
    usage: UsageTracker,
}

impl BudgetTracker {
    pub fn new(max_budget: f64) -> Self {
        Self {
            max_budget,
            spent: 0.0,
            usage: UsageTracker::new(),
        }
    }

    /// Record usage for one model call and return its cost.
    ///
    /// Models without a known price are tracked for tokens but cost nothing.
    pub fn record(&mut self, model: &str, usage: &Usage) -> f64 {
        self.usage.track(model, usage);

        let cost = match pricing_for(model) {
            Some(pricing) => pricing.cost(usage),
            None => {
                tracing::warn!(model, "no price known for model, usage not counted against budget");
                0.0
            }
        };
        self.spent += cost;
        cost
    }

    /// Fail with `BudgetExceeded` once the ceiling has been reached.
    pub fn ensure_available(&self) -> Result<()> {
        if self.spent >= self.max_budget {
            return Err(Error::budget_exceeded(self.spent, self.max_budget)
                .with_operation("budget::ensure_available"));
        }
        Ok(())
    }

    pub fn max_budget(&self) -> f64 {
        self.max_budget
    }

    pub fn spent(&self) -> f64 {
        self.spent
    }

    pub fn remaining(&self) -> f64 {
        (self.max_budget - self.spent).max(0.0)
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn usage(prompt: usize, completion: usize) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn test_prefix_pricing() {
        assert_eq!(pricing_for("gpt-4o-mini-2024-07-18").unwrap().prompt_per_1k, 0.00015);
        assert_eq!(pricing_for("gpt-4-0613").unwrap().prompt_per_1k, 0.03);
        assert_eq!(pricing_for("gpt-3.5-turbo-16k").unwrap().completion_per_1k, 0.004);
        assert!(pricing_for("llama3").is_none());
    }

    #[test]
    fn test_records_cost() {
        let mut budget = BudgetTracker::new(1.0);
        let cost = budget.record("gpt-4", &usage(1000, 1000));
        assert!((cost - 0.09).abs() < 1e-9);
        assert!((budget.remaining() - 0.91).abs() < 1e-9);
        assert_eq!(budget.usage().total_tokens(), 2000);
        assert!(budget.ensure_available().is_ok());
    }

    #[test]
    fn test_exhausted_budget() {
        let mut budget = BudgetTracker::new(0.05);
        budget.record("gpt-4", &usage(1000, 1000));

        let err = budget.ensure_available().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BudgetExceeded);
        assert_eq!(budget.remaining(), 0.0);
    }

    #[test]
    fn test_zero_budget_refuses_immediately() {
        assert!(BudgetTracker::new(0.0).ensure_available().is_err());
    }

    #[test]
    fn test_unknown_model_is_free() {
        let mut budget = BudgetTracker::new(0.01);
        assert_eq!(budget.record("local-model", &usage(100_000, 100_000)), 0.0);
        assert!(budget.ensure_available().is_ok());
    }

    #[test]
    fn test_estimate_usage_rounds_up() {
        let usage = estimate_usage(9, 4);
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 1);
        assert_eq!(usage.total_tokens, 4);
    }
}
