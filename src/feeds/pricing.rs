use super::{FeedHealth, Sticky};
use crate::backend::PricePayload;
use crate::config::PricingConfig;
use crate::error::{ChargewatchError, Result};
use serde::{Deserialize, Serialize};

/// Energy price in effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price_per_kwh: f64,
    pub label: String,
    /// The backend (or the configured default) is not quoting a live tariff
    pub is_fallback: bool,
}

impl TryFrom<PricePayload> for PriceQuote {
    type Error = ChargewatchError;

    fn try_from(p: PricePayload) -> Result<Self> {
        if !p.price.is_finite() {
            return Err(ChargewatchError::api("non-finite price"));
        }
        Ok(Self {
            price_per_kwh: p.price.max(0.0),
            label: p.label.unwrap_or_default(),
            is_fallback: p.fallback,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PricingFeed {
    quote: Sticky<PriceQuote>,
}

impl PricingFeed {
    /// Seed with the configured default rate, if any
    pub fn new(config: &PricingConfig) -> Self {
        let quote = match config.default_price_per_kwh {
            Some(price) => Sticky::seeded(PriceQuote {
                price_per_kwh: price.max(0.0),
                label: config.default_label.clone(),
                is_fallback: true,
            }),
            None => Sticky::default(),
        };
        Self { quote }
    }

    pub fn quote(&self) -> Option<&PriceQuote> {
        self.quote.get()
    }

    pub fn health(&self) -> FeedHealth {
        self.quote.health()
    }

    pub fn price_per_kwh(&self) -> f64 {
        self.quote.get().map_or(0.0, |q| q.price_per_kwh)
    }

    pub fn apply(&mut self, result: Result<PricePayload>) -> bool {
        self.quote
            .apply(result.and_then(PriceQuote::try_from))
            .is_some()
    }
}
