//! Literal coercion and token decoding
//!
//! `coerce` is total: every string yields exactly one literal, falling back
//! to `Literal::String`. Decoding and typed converters (`number:12`) are the
//! fallible half and are only used by the resolver, which turns their
//! failures into parse errors.

use winnow::ascii::{digit0, digit1};
use winnow::combinator::{alt, eof, opt, terminated};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::ast::Literal;
use crate::datetime::{DateParseError, parse_partial_datetime};

/// Coerce decoded token text into a typed literal
pub fn coerce(text: &str) -> Literal {
    match text {
        "true" => return Literal::Boolean(true),
        "false" => return Literal::Boolean(false),
        "null" => return Literal::Null,
        _ => {}
    }

    if is_integer(text)
        && let Ok(n) = text.parse::<i64>()
    {
        return Literal::Integer(n);
    }

    if is_float(text)
        && let Ok(x) = text.parse::<f64>()
        && x.is_finite()
    {
        return Literal::Float(x);
    }

    if let Ok(datetime) = parse_partial_datetime(text) {
        return Literal::DateTime(datetime);
    }

    Literal::String(text.to_string())
}

fn is_integer(text: &str) -> bool {
    let mut input = text;
    let result: winnow::ModalResult<_> =
        terminated((opt(one_of(['+', '-'])), digit1), eof).parse_next(&mut input);
    result.is_ok()
}

fn is_float(text: &str) -> bool {
    let mut input = text;
    let mantissa = alt(((digit1, opt(('.', digit0))).void(), ('.', digit1).void()));
    let exponent = (one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1);
    let mut pattern = terminated((opt(one_of(['+', '-'])), mantissa, opt(exponent)), eof);
    let result: winnow::ModalResult<_> = pattern.parse_next(&mut input);
    result.is_ok()
}

/// Explicit type converter prefix: `string:`, `number:`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    String,
    Number,
    Boolean,
    Date,
    Null,
}

impl Converter {
    pub const ALL: [Converter; 5] = [
        Converter::String,
        Converter::Number,
        Converter::Boolean,
        Converter::Date,
        Converter::Null,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Converter::String => "string",
            Converter::Number => "number",
            Converter::Boolean => "boolean",
            Converter::Date => "date",
            Converter::Null => "null",
        }
    }

    /// Split `name:rest` off a raw token, if `name` is a known converter
    pub fn split(raw: &str) -> Option<(Self, &str)> {
        let (name, rest) = raw.split_once(':')?;
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .map(|c| (c, rest))
    }

    pub fn convert(self, text: &str) -> Result<Literal, ConversionError> {
        let mismatch = || ConversionError {
            converter: self,
            value: text.to_string(),
            reason: None,
        };
        match self {
            Converter::String => Ok(Literal::String(text.to_string())),
            Converter::Number => match coerce(text) {
                lit @ (Literal::Integer(_) | Literal::Float(_)) => Ok(lit),
                _ => Err(mismatch()),
            },
            Converter::Boolean => match text {
                "true" => Ok(Literal::Boolean(true)),
                "false" => Ok(Literal::Boolean(false)),
                _ => Err(mismatch()),
            },
            Converter::Date => parse_partial_datetime(text)
                .map(Literal::DateTime)
                .map_err(|err| ConversionError {
                    reason: Some(err),
                    ..mismatch()
                }),
            Converter::Null if text.is_empty() => Ok(Literal::Null),
            Converter::Null => Err(mismatch()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionError {
    pub converter: Converter,
    pub value: String,
    pub reason: Option<DateParseError>,
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' is not a valid {} literal",
            self.value,
            self.converter.name()
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConversionError {}

/// Why a token could not be percent-decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// `%` not followed by two hex digits; carries the byte offset in the token
    MalformedEscape(usize),
    InvalidUtf8,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::MalformedEscape(at) => {
                write!(f, "unterminated percent escape at position {at}")
            }
            DecodeError::InvalidUtf8 => write!(f, "percent escapes do not form valid UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Percent-decode a token. With `plus_as_space`, `+` decodes to a space
/// (query-string value semantics).
pub fn decode(raw: &str, plus_as_space: bool) -> Result<String, DecodeError> {
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
        {
            return Err(DecodeError::MalformedEscape(i));
        }
    }

    let decoded = if plus_as_space && raw.contains('+') {
        urlencoding::decode(&raw.replace('+', " ")).map(|s| s.into_owned())
    } else {
        urlencoding::decode(raw).map(|s| s.into_owned())
    };
    decoded.map_err(|_| DecodeError::InvalidUtf8)
}

/// Percent-encode text so that it survives as a single RQL token
pub fn encode(text: &str) -> String {
    urlencoding::encode(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn coerce_scalars() {
        assert_eq!(coerce("123"), Literal::Integer(123));
        assert_eq!(coerce("-7"), Literal::Integer(-7));
        assert_eq!(coerce("+7"), Literal::Integer(7));
        assert_eq!(coerce("12.5"), Literal::Float(12.5));
        assert_eq!(coerce(".5"), Literal::Float(0.5));
        assert_eq!(coerce("1e3"), Literal::Float(1000.0));
        assert_eq!(coerce("-2.5E-1"), Literal::Float(-0.25));
        assert_eq!(coerce("true"), Literal::Boolean(true));
        assert_eq!(coerce("false"), Literal::Boolean(false));
        assert_eq!(coerce("null"), Literal::Null);
        assert_eq!(coerce("foo"), Literal::String("foo".into()));
    }

    #[test]
    fn coerce_is_case_sensitive() {
        assert_eq!(coerce("True"), Literal::String("True".into()));
        assert_eq!(coerce("NULL"), Literal::String("NULL".into()));
    }

    #[test]
    fn coerce_edge_numbers() {
        // overflows i64, still a finite float
        assert_eq!(coerce("99999999999999999999"), Literal::Float(1e20));
        // infinite floats are not numbers
        assert_eq!(coerce("1e999"), Literal::String("1e999".into()));
        assert_eq!(coerce("1.2.3"), Literal::String("1.2.3".into()));
        assert_eq!(coerce("inf"), Literal::String("inf".into()));
        assert_eq!(coerce("NaN"), Literal::String("NaN".into()));
        assert_eq!(coerce("-"), Literal::String("-".into()));
        assert_eq!(coerce(""), Literal::String(String::new()));
    }

    #[test]
    fn coerce_dates() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(
            coerce("2009-10"),
            Literal::DateTime(date(2009, 10, 1).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            coerce("2009-10-12T12:15:23.123450Z"),
            Literal::DateTime(date(2009, 10, 12).and_hms_micro_opt(12, 15, 23, 123450).unwrap())
        );
        // integers win over year-only dates
        assert_eq!(coerce("2009"), Literal::Integer(2009));
        assert_eq!(coerce("2009-13"), Literal::String("2009-13".into()));
        // dates need a four-digit year
        for code in ["12-5", "1-1", "99-12-31"] {
            assert_eq!(coerce(code), Literal::String(code.into()));
        }
    }

    #[test]
    fn converters() {
        assert_eq!(Converter::split("string:12"), Some((Converter::String, "12")));
        assert_eq!(Converter::split("url:x"), None);
        assert_eq!(Converter::split("plain"), None);

        assert_eq!(
            Converter::String.convert("12").unwrap(),
            Literal::String("12".into())
        );
        assert_eq!(Converter::Number.convert("12").unwrap(), Literal::Integer(12));
        assert!(Converter::Number.convert("abc").is_err());
        assert_eq!(
            Converter::Boolean.convert("false").unwrap(),
            Literal::Boolean(false)
        );
        assert!(Converter::Boolean.convert("yes").is_err());
        assert_eq!(
            Converter::Date.convert("2009").unwrap(),
            Literal::DateTime(
                NaiveDate::from_ymd_opt(2009, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        let err = Converter::Date.convert("soon").unwrap_err();
        assert!(err.reason.is_some());
        assert!(err.to_string().contains("'soon' is not a valid date literal"));
        assert_eq!(Converter::Null.convert("").unwrap(), Literal::Null);
    }

    #[test]
    fn decode_tokens() {
        assert_eq!(decode("a%20b", false).unwrap(), "a b");
        assert_eq!(decode("a+b", false).unwrap(), "a+b");
        assert_eq!(decode("a+b", true).unwrap(), "a b");
        assert_eq!(decode("a%2Bb", true).unwrap(), "a+b");
        assert_eq!(decode("%28x%29", false).unwrap(), "(x)");
        assert_eq!(decode("caf%C3%A9", false).unwrap(), "café");
        assert_eq!(decode("50%", false), Err(DecodeError::MalformedEscape(2)));
        assert_eq!(decode("%zz", false), Err(DecodeError::MalformedEscape(0)));
        assert_eq!(decode("%FF", false), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn encode_round_trips_through_decode() {
        for text in ["a b", "x,y", "(1)", "a&b=c", "+sign", "ünï"] {
            assert_eq!(decode(&encode(text), true).unwrap(), text);
        }
    }
}
