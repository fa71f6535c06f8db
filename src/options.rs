use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ExtractError;

/// Digits of a phone number, so `555-1234`, `555.1234` and `(555) 1234`
/// compare equal.
#[must_use]
pub fn normalize_number(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Numbers whose calls are never exported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    numbers: BTreeSet<String>,
}

impl Whitelist {
    #[must_use]
    pub fn contains(&self, number: &str) -> bool {
        let normalized = normalize_number(number);
        !normalized.is_empty() && self.numbers.contains(&normalized)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Whitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            numbers: iter
                .into_iter()
                .map(|number| normalize_number(number.as_ref()))
                .filter(|number| !number.is_empty())
                .collect(),
        }
    }
}

impl FromStr for Whitelist {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut numbers = BTreeSet::new();
        for token in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let normalized = normalize_number(token);
            if normalized.is_empty() {
                return Err(format!("whitelist entry '{token}' has no digits"));
            }
            numbers.insert(normalized);
        }
        Ok(Self { numbers })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub pdf_path: PathBuf,
    /// Number whose call sections are extracted, as printed in the document.
    pub search_number: String,
    /// Literal marking the header row of every call section.
    pub search_key: String,
    pub max_pages: u32,
    /// Rows above a key row that identify the section's owner.
    pub section_header_rows: usize,
    /// Rows separating the end of one section from the next key row.
    pub rows_between_sections: usize,
    pub whitelist: Option<Whitelist>,
    pub output_dir: PathBuf,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pdf_path: PathBuf::new(),
            search_number: String::new(),
            search_key: String::new(),
            max_pages: 100,
            section_header_rows: 3,
            rows_between_sections: 5,
            whitelist: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.search_number.trim().is_empty() {
            return Err(ExtractError::InvalidOption(
                "search number must not be empty".to_string(),
            ));
        }
        if self.search_key.trim().is_empty() {
            return Err(ExtractError::InvalidOption(
                "search key must not be empty".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ExtractError::InvalidOption(
                "max pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Leading token of the section key; the header row's first column name
    /// once a region read has split the row into cells.
    #[must_use]
    pub fn key_lead(&self) -> &str {
        self.search_key
            .split_whitespace()
            .next()
            .unwrap_or(&self.search_key)
    }

    /// `<output_dir>/<pdf stem>_<search number>.csv`, dots in the number
    /// replaced by underscores.
    #[must_use]
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        let stem = self
            .pdf_path
            .file_stem()
            .map_or_else(|| "calls".into(), |stem| stem.to_string_lossy());
        let number = self.search_number.replace('.', "_");
        self.output_dir.join(format!("{stem}_{number}{suffix}.csv"))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::str::FromStr;

    use super::{ScanOptions, Whitelist, normalize_number};

    #[test]
    fn normalizes_punctuation_out_of_numbers() {
        assert_eq!(normalize_number("555.123-4567"), "5551234567");
        assert_eq!(normalize_number("(555) 123 4567"), "5551234567");
    }

    #[test]
    fn whitelist_matches_regardless_of_punctuation() {
        let whitelist = Whitelist::from_str("555-1234, 800.555.0000").expect("whitelist should parse");
        assert_eq!(whitelist.len(), 2);
        assert!(whitelist.contains("555.1234"));
        assert!(whitelist.contains("555-1234"));
        assert!(!whitelist.contains("555-9999"));
        assert!(!whitelist.contains(""));
    }

    #[test]
    fn reject_whitelist_entry_without_digits() {
        let err = Whitelist::from_str("555-1234,abc").expect_err("entry without digits should fail");
        assert!(err.contains("abc"));
    }

    #[test]
    fn validation_rejects_missing_values() {
        let options = ScanOptions::default();
        assert!(options.validate().is_err());

        let options = ScanOptions {
            search_number: "555.123.4567".to_string(),
            search_key: "Date Time Number".to_string(),
            max_pages: 0,
            ..ScanOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn key_lead_is_first_token() {
        let options = ScanOptions {
            search_key: "Date Time Number".to_string(),
            ..ScanOptions::default()
        };
        assert_eq!(options.key_lead(), "Date");
    }

    #[test]
    fn output_path_uses_pdf_stem_and_number() {
        let options = ScanOptions {
            pdf_path: PathBuf::from("/bills/march.pdf"),
            search_number: "555.123.4567".to_string(),
            ..ScanOptions::default()
        };
        assert_eq!(
            options.output_path(""),
            PathBuf::from("output/march_555_123_4567.csv")
        );
        assert_eq!(
            options.output_path("_carriers"),
            PathBuf::from("output/march_555_123_4567_carriers.csv")
        );
    }
}
