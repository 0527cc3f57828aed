use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::SampleArgs;
use crate::util::ensure_directory;

pub const META_COLUMNS: [&str; 10] = [
    "Reporting starts",
    "Reporting ends",
    "Ad name",
    "Campaign name",
    "Ad set name",
    "Impressions",
    "Link clicks",
    "Amount spent (USD)",
    "Direct website purchases",
    "Direct website purchases conversion value",
];

const SAMPLE_ROWS: &[[&str; 10]] = &[
    ["2024-01-15", "2024-01-21", "Video - Summer Vibes", "Summer Sale 2024", "Lookalike 1%", "45000", "1100", "750", "18", "3400"],
    ["2024-01-15", "2024-01-21", "Carousel - Products", "Summer Sale 2024", "Lookalike 1%", "40000", "800", "650", "10", "1800"],
    ["2024-01-15", "2024-01-21", "Static - Hero Image", "Summer Sale 2024", "Interest - Fashion", "35000", "720", "580", "8", "1400"],
    ["2024-01-15", "2024-01-21", "UGC Review", "Summer Sale 2024", "Interest - Fashion", "30000", "680", "520", "9", "1900"],
    ["2024-01-15", "2024-01-21", "Brand Story Video", "Brand Awareness Q4", "Broad - US", "120000", "1200", "1100", "6", "950"],
    ["2024-01-15", "2024-01-21", "Product Demo", "Brand Awareness Q4", "Broad - US", "80000", "600", "700", "6", "1150"],
    ["2024-01-15", "2024-01-21", "Retargeting - Cart", "Retargeting", "Cart Abandoners", "15000", "450", "280", "12", "2800"],
    ["2024-01-15", "2024-01-21", "Retargeting - Viewed", "Retargeting", "Product Viewers", "25000", "380", "320", "8", "1600"],
];

pub fn run(args: SampleArgs) -> Result<()> {
    let export = sample_export();

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                ensure_directory(parent)?;
            }
            fs::write(path, &export)
                .with_context(|| format!("failed to write sample export {}", path.display()))?;
            info!(path = %path.display(), rows = SAMPLE_ROWS.len(), "wrote sample export");
        }
        None => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            output.write_all(export.as_bytes())?;
            output.flush()?;
        }
    }

    Ok(())
}

pub fn sample_export() -> String {
    let mut lines = Vec::with_capacity(SAMPLE_ROWS.len() + 1);
    lines.push(META_COLUMNS.join("\t"));
    lines.extend(SAMPLE_ROWS.iter().map(|row| row.join("\t")));
    let mut export = lines.join("\n");
    export.push('\n');
    export
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{ColumnVocabulary, Delimiter, normalize};

    #[test]
    fn sample_export_normalizes_cleanly() {
        let vocabulary = ColumnVocabulary::default();
        let outcome = normalize(&sample_export(), &vocabulary).expect("sample should normalize");

        assert_eq!(outcome.delimiter, Delimiter::Tab);
        assert_eq!(outcome.records.len(), SAMPLE_ROWS.len());
        assert!(outcome.warnings.is_empty());
        assert!(outcome.ignored_columns.is_empty());
        assert_eq!(outcome.records[6].campaign_name, "Retargeting");
    }
}
