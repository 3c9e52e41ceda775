//! Partial date-time parsing
//!
//! Accepts any prefix of a strftime format, e.g. `2009-10` against
//! `%Y-%m-%dT%H:%M:%S%.fZ`. The longest prefix whose separators all occur in
//! the input (in order) is chosen, the input is strictly parsed against it,
//! and the omitted trailing fields take their minimum values.

use std::sync::LazyLock;

use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Canonical ISO-8601 format used for RQL date literals
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DateParseError {
    #[error("invalid date format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },

    #[error("'{input}' contains none of the separators of '{format}'")]
    NoPrefix { input: String, format: String },

    #[error("'{input}' does not start with a four-digit year")]
    YearWidth { input: String },

    #[error("'{input}' does not match date format '{format}': {source}")]
    Mismatch {
        input: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One field of a format together with the literal text preceding it
#[derive(Debug, Clone, PartialEq)]
struct Component {
    /// Format text for this component (`-%m`, `%.f`, `Z`)
    text: String,
    /// Literal characters that must appear in the input for this component
    separators: String,
    /// Text appended to the input when the component is omitted
    default: String,
}

/// A strftime format that can parse any of its component prefixes
#[derive(Debug, Clone, PartialEq)]
pub struct PartialFormat {
    full: String,
    components: Vec<Component>,
}

impl PartialFormat {
    pub fn new(format: &str) -> Result<Self, DateParseError> {
        let invalid = |reason: String| DateParseError::InvalidFormat {
            format: format.to_string(),
            reason,
        };

        let mut components = Vec::new();
        let mut literal = String::new();
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let mut specifier = String::from('%');
            while let Some(&m) = chars.peek() {
                if matches!(m, '.' | '-' | '_' | ':' | '#') || m.is_ascii_digit() {
                    specifier.push(m);
                    chars.next();
                } else {
                    break;
                }
            }
            let Some(letter) = chars.next() else {
                return Err(invalid("dangling '%'".to_string()));
            };
            if letter == '%' && specifier == "%" {
                literal.push('%');
                continue;
            }
            specifier.push(letter);

            let has_dot = specifier.starts_with("%.");
            let default = field_default(letter, has_dot)
                .ok_or_else(|| invalid(format!("unsupported specifier '{specifier}'")))?;

            let mut separators = std::mem::take(&mut literal);
            let text = format!("{separators}{specifier}");
            if has_dot {
                separators.push('.');
            }
            let default = format!("{}{default}", text_before_spec(&text, &specifier));
            components.push(Component {
                text,
                separators,
                default,
            });
        }

        if !literal.is_empty() {
            components.push(Component {
                text: literal.clone(),
                separators: literal.clone(),
                default: literal,
            });
        }

        if components.is_empty() {
            return Err(invalid("format is empty".to_string()));
        }

        Ok(Self {
            full: format.to_string(),
            components,
        })
    }

    /// The canonical `%Y-%m-%dT%H:%M:%S%.fZ` format
    pub fn iso() -> Result<Self, DateParseError> {
        Self::new(ISO_FORMAT)
    }

    pub fn format(&self) -> &str {
        &self.full
    }

    /// Format text of the first `len` components
    pub fn prefix(&self, len: usize) -> String {
        self.components[..len.min(self.components.len())]
            .iter()
            .map(|c| c.text.as_str())
            .collect()
    }

    /// Length of the longest prefix whose separators all appear in `input` in order
    pub fn matching_prefix_len(&self, input: &str) -> usize {
        (1..=self.components.len())
            .rev()
            .find(|&len| {
                let required: String = self.components[..len]
                    .iter()
                    .map(|c| c.separators.as_str())
                    .collect();
                contains_in_order(input, &required)
            })
            .unwrap_or(0)
    }

    pub fn parse(&self, input: &str) -> Result<NaiveDateTime, DateParseError> {
        let len = self.matching_prefix_len(input);
        if len == 0 {
            return Err(DateParseError::NoPrefix {
                input: input.to_string(),
                format: self.full.clone(),
            });
        }

        let prefix = self.prefix(len);
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, input, StrftimeItems::new(&prefix)).map_err(|source| {
            DateParseError::Mismatch {
                input: input.to_string(),
                format: prefix.clone(),
                source,
            }
        })?;

        // chrono accepts one to four year digits; `12-5` is not a date
        if self.components[0].text == "%Y"
            && input.bytes().take_while(u8::is_ascii_digit).count() != 4
        {
            return Err(DateParseError::YearWidth {
                input: input.to_string(),
            });
        }

        let mut completed = input.to_string();
        for component in &self.components[len..] {
            completed.push_str(&component.default);
        }

        let mismatch = |source| DateParseError::Mismatch {
            input: input.to_string(),
            format: self.full.clone(),
            source,
        };
        match NaiveDateTime::parse_from_str(&completed, &self.full) {
            Ok(datetime) => Ok(datetime),
            // Date-only formats carry no time fields
            Err(err) => NaiveDate::parse_from_str(&completed, &self.full)
                .map_err(mismatch)?
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| mismatch(err)),
        }
    }
}

static ISO: LazyLock<Result<PartialFormat, DateParseError>> = LazyLock::new(PartialFormat::iso);

/// Parse a (possibly partial) ISO-8601 date-time
pub fn parse_partial_datetime(input: &str) -> Result<NaiveDateTime, DateParseError> {
    ISO.as_ref().map_err(Clone::clone)?.parse(input)
}

fn text_before_spec<'a>(text: &'a str, specifier: &str) -> &'a str {
    &text[..text.len() - specifier.len()]
}

/// Minimum value rendering for an omitted field
fn field_default(letter: char, has_dot: bool) -> Option<&'static str> {
    let default = match letter {
        'Y' => "0000",
        'y' | 'C' => "00",
        'm' | 'd' => "01",
        'e' => "1",
        'j' => "001",
        'H' | 'M' | 'S' => "00",
        'f' if has_dot => ".0",
        'f' => "0",
        _ => return None,
    };
    Some(default)
}

fn contains_in_order(input: &str, required: &str) -> bool {
    let mut rest = input.chars();
    required.chars().all(|sep| rest.any(|c| c == sep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, us: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_micro_opt(h, mi, s, us)
            .unwrap()
    }

    #[test]
    fn every_iso_prefix_parses() {
        let cases = [
            ("2009", dt(2009, 1, 1, 0, 0, 0, 0)),
            ("2009-10", dt(2009, 10, 1, 0, 0, 0, 0)),
            ("2009-10-12", dt(2009, 10, 12, 0, 0, 0, 0)),
            ("2009-10-12T12", dt(2009, 10, 12, 12, 0, 0, 0)),
            ("2009-10-12T12:15", dt(2009, 10, 12, 12, 15, 0, 0)),
            ("2009-10-12T12:15:23", dt(2009, 10, 12, 12, 15, 23, 0)),
            ("2009-10-12T12:15:23.123450", dt(2009, 10, 12, 12, 15, 23, 123450)),
            ("2009-10-12T12:15:23.123450Z", dt(2009, 10, 12, 12, 15, 23, 123450)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_partial_datetime(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn short_fraction_keeps_precision() {
        assert_eq!(
            parse_partial_datetime("2009-10-12T12:15:23.12345Z").unwrap(),
            dt(2009, 10, 12, 12, 15, 23, 123450)
        );
    }

    #[test]
    fn iso_components() {
        let format = PartialFormat::iso().unwrap();
        assert_eq!(format.prefix(1), "%Y");
        assert_eq!(format.prefix(2), "%Y-%m");
        assert_eq!(format.prefix(4), "%Y-%m-%dT%H");
        assert_eq!(format.prefix(7), "%Y-%m-%dT%H:%M:%S%.f");
        assert_eq!(format.prefix(8), ISO_FORMAT);
        assert_eq!(format.prefix(100), ISO_FORMAT);
    }

    #[test]
    fn prefix_selection_follows_separators() {
        let format = PartialFormat::iso().unwrap();
        assert_eq!(format.matching_prefix_len("2009"), 1);
        assert_eq!(format.matching_prefix_len("2009-10"), 2);
        assert_eq!(format.matching_prefix_len("2009-10-12T12:15"), 5);
        // '.' without the preceding separators does not count
        assert_eq!(format.matching_prefix_len("12.5"), 1);
        // trailing separator selects the longer prefix, which then fails strictly
        assert_eq!(format.matching_prefix_len("2009-"), 2);
    }

    #[test]
    fn mismatches_are_reported() {
        for input in ["", "2009-", "2009-13", "2009-02-30", "abc", "2009-10-12T12:15:23Z", "10:30"] {
            let err = parse_partial_datetime(input).unwrap_err();
            assert!(
                matches!(err, DateParseError::Mismatch { .. }),
                "{input}: {err:?}"
            );
        }
    }

    #[test]
    fn short_years_are_not_dates() {
        for input in ["12-5", "1-1", "99-12-31", "7-7-7T7", "123"] {
            let err = parse_partial_datetime(input).unwrap_err();
            assert!(
                matches!(err, DateParseError::YearWidth { .. }),
                "{input}: {err:?}"
            );
        }
        assert!(parse_partial_datetime("0012-05").is_ok());
    }

    #[test]
    fn custom_formats() {
        let format = PartialFormat::new("%d/%m/%Y").unwrap();
        assert_eq!(format.parse("12/10/2009").unwrap(), dt(2009, 10, 12, 0, 0, 0, 0));
        assert_eq!(format.parse("12").unwrap(), dt(0, 1, 12, 0, 0, 0, 0));
        assert!(format.parse("12/13").is_err());

        let format = PartialFormat::new("T%H:%M").unwrap();
        assert!(matches!(
            format.parse("12:30"),
            Err(DateParseError::NoPrefix { .. })
        ));
    }

    #[test]
    fn invalid_formats() {
        assert!(PartialFormat::new("").is_err());
        assert!(PartialFormat::new("%Y-%").is_err());
        assert!(PartialFormat::new("%Y-%Q").is_err());
    }
}
