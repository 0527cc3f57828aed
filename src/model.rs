use std::fmt;
use std::iter::Sum;
use std::ops::AddAssign;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub campaign_name: String,
    pub ad_set_name: String,
    pub ad_name: String,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: Decimal,
    pub purchases: u64,
    pub revenue: Decimal,
}

impl PerformanceRecord {
    pub fn metrics(&self) -> Metrics {
        Metrics {
            impressions: self.impressions,
            clicks: self.clicks,
            spend: self.spend,
            purchases: self.purchases,
            revenue: self.revenue,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub impressions: u64,
    pub clicks: u64,
    pub spend: Decimal,
    pub purchases: u64,
    pub revenue: Decimal,
}

impl Metrics {
    /// Revenue over spend; 0 when nothing was spent.
    pub fn roas(&self) -> Decimal {
        ratio(self.revenue, self.spend)
    }

    pub fn ctr(&self) -> Decimal {
        ratio(Decimal::from(self.clicks), Decimal::from(self.impressions))
    }

    pub fn cpc(&self) -> Decimal {
        ratio(self.spend, Decimal::from(self.clicks))
    }

    pub fn cpm(&self) -> Decimal {
        self.spend
            .checked_mul(Decimal::ONE_THOUSAND)
            .map_or(Decimal::ZERO, |spend| ratio(spend, Decimal::from(self.impressions)))
    }

    pub fn cpa(&self) -> Decimal {
        ratio(self.spend, Decimal::from(self.purchases))
    }
}

impl AddAssign<&Metrics> for Metrics {
    fn add_assign(&mut self, other: &Metrics) {
        self.impressions = self.impressions.saturating_add(other.impressions);
        self.clicks = self.clicks.saturating_add(other.clicks);
        self.spend = self.spend.saturating_add(other.spend);
        self.purchases = self.purchases.saturating_add(other.purchases);
        self.revenue = self.revenue.saturating_add(other.revenue);
    }
}

impl<'a> Sum<&'a Metrics> for Metrics {
    fn sum<I: Iterator<Item = &'a Metrics>>(iter: I) -> Self {
        let mut total = Metrics::default();
        for metrics in iter {
            total += metrics;
        }
        total
    }
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub scale_roas: Decimal,
    pub min_roas: Decimal,
    pub learning_spend: Decimal,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            scale_roas: Decimal::new(30, 1),
            min_roas: Decimal::new(15, 1),
            learning_spend: Decimal::ONE_HUNDRED,
        }
    }
}

impl Rules {
    pub fn validate(&self) -> Result<()> {
        if self.scale_roas <= Decimal::ZERO {
            bail!("scale_roas must be greater than 0 (got {})", self.scale_roas);
        }
        if self.min_roas < Decimal::ZERO {
            bail!("min_roas must not be negative (got {})", self.min_roas);
        }
        if self.learning_spend < Decimal::ZERO {
            bail!(
                "learning_spend must not be negative (got {})",
                self.learning_spend
            );
        }
        if self.min_roas > self.scale_roas {
            bail!(
                "min_roas ({}) must not exceed scale_roas ({})",
                self.min_roas,
                self.scale_roas
            );
        }
        Ok(())
    }

    /// First match wins: learning spend dominates every ROAS threshold.
    pub fn classify(&self, spend: Decimal, roas: Decimal) -> Verdict {
        if spend < self.learning_spend {
            Verdict::Learn
        } else if roas >= self.scale_roas {
            Verdict::Scale
        } else if roas >= self.min_roas {
            Verdict::Watch
        } else {
            Verdict::Cut
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Scale,
    Watch,
    Cut,
    Learn,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [Self::Scale, Self::Watch, Self::Cut, Self::Learn];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scale => "scale",
            Self::Watch => "watch",
            Self::Cut => "cut",
            Self::Learn => "learn",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Scale => "Scale",
            Self::Watch => "Watch",
            Self::Cut => "Cut",
            Self::Learn => "Learn",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Scale => "↑",
            Self::Watch => "●",
            Self::Cut => "↓",
            Self::Learn => "○",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon(), self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPaths {
    pub data_root: String,
    pub manifest_dir: String,
    pub source_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestCounts {
    pub data_rows: usize,
    pub records_kept: usize,
    pub rows_dropped: usize,
    pub warning_count: usize,
    pub campaigns: usize,
    pub ad_sets: usize,
    pub ads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub upload_id: String,
    pub account_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub source_sha256: String,
    pub delimiter: String,
    pub mapped_columns: Vec<String>,
    pub ignored_columns: Vec<String>,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub warnings: Vec<String>,
}
