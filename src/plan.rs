use clap::ValueEnum;
use serde::Serialize;

use crate::store::Subscription;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Agency,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Agency => "agency",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Pro => "Pro",
            Self::Agency => "Agency",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "agency" => Some(Self::Agency),
            _ => None,
        }
    }

    pub fn resolve(subscription: Option<&Subscription>) -> Self {
        subscription
            .filter(|subscription| subscription.status.trim().eq_ignore_ascii_case("active"))
            .and_then(|subscription| Self::parse(&subscription.plan))
            .unwrap_or(Self::Free)
    }

    pub fn campaign_limit(self) -> Option<usize> {
        match self {
            Self::Free => Some(3),
            Self::Pro => Some(25),
            Self::Agency => None,
        }
    }

    pub fn visible<'a, T>(self, campaigns: &'a [T]) -> &'a [T] {
        match self.campaign_limit() {
            Some(limit) => &campaigns[..campaigns.len().min(limit)],
            None => campaigns,
        }
    }
}
