//! Date and time resolution.

use crate::error::RecognizerError;
use crate::prompt::recognizer::Recognizer;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use colloquy_core::Result;
use serde::{Deserialize, Serialize};

/// One resolved reading of a date or time expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateTimeResolution {
    /// TIMEX expression, e.g. `2018-12-05T09` or `XXXX-WXX-3T16`.
    pub timex: String,
    /// Concrete value, e.g. `2018-12-05 09:00:00`. Empty when the
    /// expression has no single concrete value.
    pub value: String,
}

impl DateTimeResolution {
    #[must_use]
    pub fn new(timex: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            timex: timex.into(),
            value: value.into(),
        }
    }

    fn date(date: NaiveDate) -> Self {
        let text = date.format("%Y-%m-%d").to_string();
        Self::new(text.clone(), text)
    }

    fn date_time(at: NaiveDateTime) -> Self {
        let timex = match (at.minute(), at.second()) {
            (0, 0) => at.format("%Y-%m-%dT%H"),
            (_, 0) => at.format("%Y-%m-%dT%H:%M"),
            _ => at.format("%Y-%m-%dT%H:%M:%S"),
        };
        Self::new(timex.to_string(), at.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

fn parse_date_time(token: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(token, format).ok())
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(token, format).ok())
}

/// Recognizes ISO-8601 calendar dates and date-times.
///
/// Accepts `2018-12-05`, `2018-12-05T09:30` and `2018-12-05 09:30:15`
/// anywhere in the text; every match becomes a candidate, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDateTimeRecognizer;

#[async_trait]
impl Recognizer for IsoDateTimeRecognizer {
    type Candidate = DateTimeResolution;

    fn name(&self) -> &str {
        "iso-datetime"
    }

    async fn recognize(
        &self,
        text: &str,
        _locale: &str,
    ) -> Result<Vec<DateTimeResolution>, RecognizerError> {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .map(|token| token.trim_matches(|c: char| matches!(c, ',' | ';' | '!' | '?' | '(' | ')')))
            .map(|token| token.trim_end_matches('.'))
            .collect();

        let mut found = Vec::new();
        let mut index = 0;
        while index < tokens.len() {
            let token = tokens[index];
            index += 1;
            if let Some(at) = parse_date_time(token) {
                found.push(DateTimeResolution::date_time(at));
            } else if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
                match tokens.get(index).and_then(|next| parse_time(next)) {
                    Some(time) => {
                        index += 1;
                        found.push(DateTimeResolution::date_time(date.and_time(time)));
                    }
                    None => found.push(DateTimeResolution::date(date)),
                }
            }
        }
        Ok(found)
    }
}
