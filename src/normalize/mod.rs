use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::model::PerformanceRecord;

mod values;
mod vocabulary;


pub use values::{Cell, ValueParser};
pub use vocabulary::{CanonicalField, ColumnVocabulary};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    pub fn detect(header_line: &str) -> Self {
        if header_line.contains('\t') {
            Self::Tab
        } else {
            Self::Comma
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Comma => ',',
            Self::Tab => '\t',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comma => "comma",
            Self::Tab => "tab",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub records: Vec<PerformanceRecord>,
    pub warnings: Vec<String>,
    pub delimiter: Delimiter,
    pub mapped_columns: Vec<String>,
    pub ignored_columns: Vec<String>,
    pub data_rows: usize,
    pub rows_dropped: usize,
}

pub fn normalize(raw_text: &str, vocabulary: &ColumnVocabulary) -> Result<NormalizeOutcome> {
    Normalizer::new(vocabulary)?.normalize(raw_text)
}

pub struct Normalizer<'a> {
    vocabulary: &'a ColumnVocabulary,
    values: ValueParser,
    today: NaiveDate,
}

struct HeaderLayout {
    columns: Vec<(usize, CanonicalField)>,
    mapped: Vec<String>,
    ignored: Vec<String>,
}

impl<'a> Normalizer<'a> {
    pub fn new(vocabulary: &'a ColumnVocabulary) -> Result<Self> {
        Ok(Self {
            vocabulary,
            values: ValueParser::new()?,
            today: Utc::now().date_naive(),
        })
    }

    #[cfg(test)]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn normalize(&self, raw_text: &str) -> Result<NormalizeOutcome> {
        let mut lines = raw_text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line))
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((header_line_no, header_line)) = lines.next() else {
            bail!("input is empty");
        };

        let delimiter = Delimiter::detect(header_line);
        let header_cells = split_record(header_line, delimiter.as_char());
        let layout = self.resolve_header(&header_cells);
        if layout.columns.is_empty() {
            bail!(
                "no recognizable header columns on line {header_line_no} (found: {})",
                header_cells.join(", ")
            );
        }

        let mut records = Vec::new();
        let mut warnings = Vec::new();
        let mut data_rows = 0_usize;

        for (line_no, line) in lines {
            data_rows += 1;
            let cells = split_record(line, delimiter.as_char());
            let fields: Vec<(CanonicalField, &str)> = layout
                .columns
                .iter()
                .filter_map(|(index, field)| cells.get(*index).map(|cell| (*field, cell.as_str())))
                .collect();

            let location = format!("line {line_no}");
            if let Some(record) = self.normalize_fields(&fields, &location, &mut warnings) {
                records.push(record);
            }
        }

        let rows_dropped = data_rows - records.len();
        debug!(
            delimiter = delimiter.as_str(),
            data_rows,
            records = records.len(),
            rows_dropped,
            warnings = warnings.len(),
            "normalized export"
        );

        Ok(NormalizeOutcome {
            records,
            warnings,
            delimiter,
            mapped_columns: layout.mapped,
            ignored_columns: layout.ignored,
            data_rows,
            rows_dropped,
        })
    }

    pub fn normalize_fields(
        &self,
        fields: &[(CanonicalField, &str)],
        location: &str,
        warnings: &mut Vec<String>,
    ) -> Option<PerformanceRecord> {
        let mut cells: HashMap<CanonicalField, &str> = HashMap::new();
        for (field, raw) in fields {
            cells.entry(*field).or_insert(*raw);
        }
        let text = |field: CanonicalField| -> String {
            cells
                .get(&field)
                .map(|raw| raw.trim().to_string())
                .unwrap_or_default()
        };

        let campaign_name = text(CanonicalField::CampaignName);
        let ad_set_name = text(CanonicalField::AdSetName);
        let ad_name = text(CanonicalField::AdName);

        let missing: Vec<&str> = [
            (CanonicalField::AdName, &ad_name),
            (CanonicalField::CampaignName, &campaign_name),
            (CanonicalField::AdSetName, &ad_set_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| field.describe())
        .collect();
        if !missing.is_empty() {
            warnings.push(format!(
                "{location}: dropped row missing {}",
                missing.join(", ")
            ));
            return None;
        }

        let raw = |field: CanonicalField| cells.get(&field).copied().unwrap_or("");

        let period_start = match self.values.parse_date(raw(CanonicalField::PeriodStart)) {
            Cell::Value(date) => date,
            Cell::Missing => self.today,
            Cell::Invalid => {
                warnings.push(format!(
                    "{location}: unparseable reporting start {:?}, using {}",
                    raw(CanonicalField::PeriodStart).trim(),
                    self.today
                ));
                self.today
            }
        };
        let period_end = match self.values.parse_date(raw(CanonicalField::PeriodEnd)) {
            Cell::Value(date) => date,
            Cell::Missing => period_start,
            Cell::Invalid => {
                warnings.push(format!(
                    "{location}: unparseable reporting end {:?}, using {}",
                    raw(CanonicalField::PeriodEnd).trim(),
                    self.today
                ));
                self.today
            }
        };

        let mut count = |field: CanonicalField| -> u64 {
            match self.values.parse_count(raw(field)) {
                Cell::Value(value) => value,
                Cell::Missing => 0,
                Cell::Invalid => {
                    warnings.push(invalid_number_warning(location, field, raw(field)));
                    0
                }
            }
        };
        let impressions = count(CanonicalField::Impressions);
        let clicks = count(CanonicalField::Clicks);
        let purchases = count(CanonicalField::Purchases);

        let mut amount = |field: CanonicalField| -> Decimal {
            match self.values.parse_amount(raw(field)) {
                Cell::Value(value) => value,
                Cell::Missing => Decimal::ZERO,
                Cell::Invalid => {
                    warnings.push(invalid_number_warning(location, field, raw(field)));
                    Decimal::ZERO
                }
            }
        };
        let spend = amount(CanonicalField::Spend);
        let revenue = amount(CanonicalField::Revenue);

        Some(PerformanceRecord {
            period_start,
            period_end,
            campaign_name,
            ad_set_name,
            ad_name,
            impressions,
            clicks,
            spend,
            purchases,
            revenue,
        })
    }

    fn resolve_header(&self, header_cells: &[String]) -> HeaderLayout {
        let mut columns = Vec::new();
        let mut mapped = Vec::new();
        let mut ignored = Vec::new();

        for (index, cell) in header_cells.iter().enumerate() {
            let header = cell.trim().to_string();
            match self.vocabulary.resolve(&header) {
                Some(field) if columns.iter().all(|(_, seen)| *seen != field) => {
                    columns.push((index, field));
                    mapped.push(format!("{header} -> {}", field.as_str()));
                }
                _ => ignored.push(header),
            }
        }

        HeaderLayout {
            columns,
            mapped,
            ignored,
        }
    }
}

fn invalid_number_warning(location: &str, field: CanonicalField, raw: &str) -> String {
    format!(
        "{location}: unparseable {} {:?}, using 0",
        field.describe(),
        raw.trim()
    )
}

pub fn split_record(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ch if ch == delimiter && !in_quotes => {
                cells.push(std::mem::take(&mut current));
            }
            ch => current.push(ch),
        }
    }
    cells.push(current);

    cells
}
