use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    PeriodStart,
    PeriodEnd,
    CampaignName,
    AdSetName,
    AdName,
    Impressions,
    Clicks,
    Spend,
    Purchases,
    Revenue,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        Self::PeriodStart,
        Self::PeriodEnd,
        Self::CampaignName,
        Self::AdSetName,
        Self::AdName,
        Self::Impressions,
        Self::Clicks,
        Self::Spend,
        Self::Purchases,
        Self::Revenue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeriodStart => "period_start",
            Self::PeriodEnd => "period_end",
            Self::CampaignName => "campaign_name",
            Self::AdSetName => "ad_set_name",
            Self::AdName => "ad_name",
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Spend => "spend",
            Self::Purchases => "purchases",
            Self::Revenue => "revenue",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::PeriodStart => "reporting start",
            Self::PeriodEnd => "reporting end",
            Self::CampaignName => "campaign name",
            Self::AdSetName => "ad set name",
            Self::AdName => "ad name",
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Spend => "spend",
            Self::Purchases => "purchases",
            Self::Revenue => "revenue",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|field| field.as_str() == wanted)
    }
}

const BUILTIN_SYNONYMS: &[(&str, CanonicalField)] = &[
    ("reporting starts", CanonicalField::PeriodStart),
    ("reporting start", CanonicalField::PeriodStart),
    ("date_start", CanonicalField::PeriodStart),
    ("date start", CanonicalField::PeriodStart),
    ("start date", CanonicalField::PeriodStart),
    ("period start", CanonicalField::PeriodStart),
    ("period_start", CanonicalField::PeriodStart),
    ("date", CanonicalField::PeriodStart),
    ("day", CanonicalField::PeriodStart),
    ("reporting ends", CanonicalField::PeriodEnd),
    ("reporting end", CanonicalField::PeriodEnd),
    ("date_end", CanonicalField::PeriodEnd),
    ("date end", CanonicalField::PeriodEnd),
    ("end date", CanonicalField::PeriodEnd),
    ("period end", CanonicalField::PeriodEnd),
    ("period_end", CanonicalField::PeriodEnd),
    ("campaign name", CanonicalField::CampaignName),
    ("campaign_name", CanonicalField::CampaignName),
    ("campaign", CanonicalField::CampaignName),
    ("ad set name", CanonicalField::AdSetName),
    ("adset name", CanonicalField::AdSetName),
    ("adset_name", CanonicalField::AdSetName),
    ("ad_set_name", CanonicalField::AdSetName),
    ("ad set", CanonicalField::AdSetName),
    ("adset", CanonicalField::AdSetName),
    ("ad group name", CanonicalField::AdSetName),
    ("ad group", CanonicalField::AdSetName),
    ("ad name", CanonicalField::AdName),
    ("ad_name", CanonicalField::AdName),
    ("ad", CanonicalField::AdName),
    ("impressions", CanonicalField::Impressions),
    ("impr", CanonicalField::Impressions),
    ("impr.", CanonicalField::Impressions),
    ("link clicks", CanonicalField::Clicks),
    ("link_clicks", CanonicalField::Clicks),
    ("clicks", CanonicalField::Clicks),
    ("clicks (all)", CanonicalField::Clicks),
    ("amount spent (usd)", CanonicalField::Spend),
    ("amount spent", CanonicalField::Spend),
    ("amount_spent", CanonicalField::Spend),
    ("spend", CanonicalField::Spend),
    ("spent", CanonicalField::Spend),
    ("cost", CanonicalField::Spend),
    ("direct website purchases", CanonicalField::Purchases),
    ("website purchases", CanonicalField::Purchases),
    ("purchases", CanonicalField::Purchases),
    ("conversions", CanonicalField::Purchases),
    (
        "direct website purchases conversion value",
        CanonicalField::Revenue,
    ),
    ("website purchases conversion value", CanonicalField::Revenue),
    ("purchases conversion value", CanonicalField::Revenue),
    ("purchase conversion value", CanonicalField::Revenue),
    ("conversion value", CanonicalField::Revenue),
    ("purchase value", CanonicalField::Revenue),
    ("revenue", CanonicalField::Revenue),
];

#[derive(Debug, Clone)]
pub struct ColumnVocabulary {
    entries: HashMap<String, CanonicalField>,
}

impl Default for ColumnVocabulary {
    fn default() -> Self {
        let entries = BUILTIN_SYNONYMS
            .iter()
            .map(|(header, field)| (normalize_header(header), *field))
            .collect();
        Self { entries }
    }
}

impl ColumnVocabulary {
    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, header: &str, field: CanonicalField) {
        self.entries.insert(normalize_header(header), field);
    }

    pub fn resolve(&self, header: &str) -> Option<CanonicalField> {
        self.entries.get(&normalize_header(header)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn extend_from_json(&mut self, raw: &str) -> Result<usize> {
        let overrides: HashMap<String, String> =
            serde_json::from_str(raw).context("column map must be a JSON object of strings")?;

        for (header, field_name) in &overrides {
            let Some(field) = CanonicalField::parse(field_name) else {
                bail!("column map entry {header:?} names unknown field {field_name:?}");
            };
            self.insert(header, field);
        }

        Ok(overrides.len())
    }

    pub fn with_overrides_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read column map {}", path.display()))?;
        let mut vocabulary = Self::default();
        vocabulary
            .extend_from_json(&raw)
            .with_context(|| format!("invalid column map {}", path.display()))?;
        Ok(vocabulary)
    }
}

pub fn normalize_header(raw: &str) -> String {
    let trimmed = raw
        .trim_start_matches('\u{feff}')
        .trim()
        .trim_matches('"')
        .trim();
    trimmed
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}
