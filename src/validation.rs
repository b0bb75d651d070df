//! Field-level input checks collected into a single 422 response.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::ApiError;

#[derive(Debug, Default)]
pub struct Validator {
    errors: HashMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        // Keep the first failure per field
        self.errors.entry(field.to_string()).or_insert_with(|| message.into());
        self
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.error(field, message);
        }
        self
    }

    pub fn required<T>(&mut self, field: &str, value: &Option<T>) -> &mut Self {
        if value.is_none() {
            self.error(field, "This field is required");
        }
        self
    }

    /// Present and not blank
    pub fn required_str(&mut self, field: &str, value: &Option<String>) -> &mut Self {
        match value {
            Some(s) if !s.trim().is_empty() => self,
            _ => self.error(field, "This field is required"),
        }
    }

    pub fn length(&mut self, field: &str, value: &Option<String>, min: usize, max: usize) -> &mut Self {
        if let Some(s) = value {
            let len = s.chars().count();
            if len < min || len > max {
                self.error(field, format!("Must be between {} and {} characters", min, max));
            }
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &Option<String>) -> &mut Self {
        if let Some(s) = value {
            if !is_email(s) {
                self.error(field, "Must be a valid email address");
            }
        }
        self
    }

    pub fn one_of(&mut self, field: &str, value: &Option<String>, allowed: &[&str]) -> &mut Self {
        if let Some(s) = value {
            if !allowed.contains(&s.as_str()) {
                self.error(field, format!("Must be one of: {}", allowed.join(", ")));
            }
        }
        self
    }

    pub fn positive(&mut self, field: &str, value: &Option<Decimal>) -> &mut Self {
        if let Some(v) = value {
            if *v <= Decimal::ZERO {
                self.error(field, "Must be greater than 0");
            }
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: &Option<Decimal>) -> &mut Self {
        if let Some(v) = value {
            if *v < Decimal::ZERO {
                self.error(field, "Must be 0 or more");
            }
        }
        self
    }

    pub fn range_i64(&mut self, field: &str, value: Option<i64>, min: i64, max: i64) -> &mut Self {
        if let Some(v) = value {
            if v < min || v > max {
                self.error(field, format!("Must be between {} and {}", min, max));
            }
        }
        self
    }

    pub fn range_decimal(&mut self, field: &str, value: &Option<Decimal>, min: Decimal, max: Decimal) -> &mut Self {
        if let Some(v) = value {
            if *v < min || *v > max {
                self.error(field, format!("Must be between {} and {}", min, max));
            }
        }
        self
    }

    /// `end` must fall strictly after `start` when both are present
    pub fn date_after(&mut self, field: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> &mut Self {
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                self.error(field, "Must be after the start date");
            }
        }
        self
    }

    /// Inclusive range: `end` may equal `start`
    pub fn date_not_before(&mut self, field: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> &mut Self {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                self.error(field, "Must not be before the start date");
            }
        }
        self
    }

    /// Calendar dates outside `[min_year, max_year]` are refused
    pub fn date_years(&mut self, field: &str, value: Option<NaiveDate>, min_year: i32, max_year: i32) -> &mut Self {
        if let Some(date) = value {
            if date.year() < min_year || date.year() > max_year {
                self.error(field, format!("Must fall between {} and {}", min_year, max_year));
            }
        }
        self
    }

    /// `YYYY-MM`
    pub fn period(&mut self, field: &str, value: &Option<String>) -> &mut Self {
        if let Some(s) = value {
            if parse_period(s).is_none() {
                self.error(field, "Must use the YYYY-MM format");
            }
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::unprocessable_entity(
                "The given data was invalid",
                std::mem::take(&mut self.errors),
            ))
        }
    }
}

fn is_email(s: &str) -> bool {
    let mut parts = s.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.contains(char::is_whitespace)
        }
        _ => false,
    }
}

/// Parses `YYYY-MM` into (year, month)
pub fn parse_period(s: &str) -> Option<(i32, u32)> {
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_errors_per_field() {
        let mut v = Validator::new();
        v.required_str("nom", &None)
            .required_str("ville", &Some("  ".into()))
            .email("email", &Some("not-an-email".into()))
            .positive("montant_total", &Some(Decimal::ZERO));
        let err = v.finish().unwrap_err();
        match err {
            ApiError::UnprocessableEntity { field_errors, .. } => {
                assert_eq!(field_errors.len(), 4);
                assert!(field_errors.contains_key("montant_total"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn first_error_per_field_wins() {
        let mut v = Validator::new();
        v.required_str("reason", &None).length("reason", &Some("x".into()), 10, 1000);
        match v.finish().unwrap_err() {
            ApiError::UnprocessableEntity { field_errors, .. } => {
                assert_eq!(field_errors["reason"], "This field is required");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn accepts_valid_input() {
        let mut v = Validator::new();
        v.email("email", &Some("contact@acme.sn".into()))
            .one_of("leave_type", &Some("annual".into()), &["annual", "sick"])
            .date_after(
                "end_date",
                NaiveDate::from_ymd_opt(2024, 1, 1),
                NaiveDate::from_ymd_opt(2024, 1, 2),
            )
            .period("period", &Some("2024-07".into()));
        assert!(v.is_valid());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn inclusive_ranges_accept_a_single_day() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 2);
        let mut v = Validator::new();
        v.date_not_before("date_fin", day, day);
        assert!(v.is_valid());

        v.date_after("end_date", day, day);
        assert!(!v.is_valid());

        let mut v = Validator::new();
        v.date_not_before("date_fin", day, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(!v.is_valid());
    }

    #[test]
    fn far_dates_are_refused() {
        let mut v = Validator::new();
        v.date_years("start_date", NaiveDate::from_ymd_opt(2024, 1, 1), 1900, 2200)
            .date_years("end_date", Some(NaiveDate::MAX), 1900, 2200);
        match v.finish().unwrap_err() {
            ApiError::UnprocessableEntity { field_errors, .. } => {
                assert_eq!(field_errors.len(), 1);
                assert!(field_errors.contains_key("end_date"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_periods() {
        assert_eq!(parse_period("2024-02"), Some((2024, 2)));
        assert_eq!(parse_period("2024-13"), None);
        assert_eq!(parse_period("24-02"), None);
    }
}
