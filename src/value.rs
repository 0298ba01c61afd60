//! Sub-parsers for numeric filter values: plain numbers, durations, sizes and
//! percentages.
//!
//! Each parser splits the text into a numeric part and an optional unit. A
//! missing unit is fine (the user may still be typing). An unknown unit gives
//! a `Degraded` result that still carries both parts. Text that does not start
//! with a number gives `None`.

use serde::Serialize;

use crate::outcome::Parsed;

/// A number with an optional unit suffix, both borrowed from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnitValue<'a> {
    pub value: &'a str,
    pub unit: Option<&'a str>,
}

impl<'a> UnitValue<'a> {
    /// The numeric part as a float.
    pub fn amount(&self) -> Option<f64> {
        self.value.parse().ok()
    }

    /// Number with its `k`/`m`/`b` multiplier applied.
    pub fn number_value(&self) -> Option<f64> {
        Some(self.amount()? * number_multiplier(self.unit)?)
    }

    /// Duration in milliseconds. No unit means milliseconds.
    pub fn duration_millis(&self) -> Option<f64> {
        Some(self.amount()? * duration_factor(self.unit)?)
    }

    /// Size in bytes. No unit means bytes.
    pub fn size_bytes(&self) -> Option<f64> {
        Some(self.amount()? * size_factor(self.unit)?)
    }

    /// Percentage as a fraction. `50%` is `0.5`; a bare number is taken as
    /// already being a fraction.
    pub fn percentage_fraction(&self) -> Option<f64> {
        let amount = self.amount()?;
        match self.unit {
            None => Some(amount),
            Some("%") => Some(amount / 100.0),
            Some(_) => None,
        }
    }
}

pub fn parse_number(text: &str) -> Option<Parsed<UnitValue<'_>>> {
    parse_with_units(text, |unit| number_multiplier(Some(unit)).is_some())
}

pub fn parse_duration(text: &str) -> Option<Parsed<UnitValue<'_>>> {
    parse_with_units(text, |unit| duration_factor(Some(unit)).is_some())
}

pub fn parse_size(text: &str) -> Option<Parsed<UnitValue<'_>>> {
    parse_with_units(text, |unit| size_factor(Some(unit)).is_some())
}

pub fn parse_percentage(text: &str) -> Option<Parsed<UnitValue<'_>>> {
    parse_with_units(text, |unit| unit == "%")
}

fn parse_with_units<'a>(text: &'a str, known_unit: impl Fn(&str) -> bool) -> Option<Parsed<UnitValue<'a>>> {
    let (value, suffix) = split_numeric(text)?;
    if suffix.is_empty() {
        return Some(Parsed::Ok(UnitValue { value, unit: None }));
    }
    let parsed = UnitValue { value, unit: Some(suffix) };
    Some(Parsed::new(parsed, !known_unit(suffix)))
}

/// Splits a leading `-?digits[.digits]` off `text`. At least one digit is
/// required on either side of the dot.
fn split_numeric(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if digits > 0 || frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }
    Some(text.split_at(end))
}

fn number_multiplier(unit: Option<&str>) -> Option<f64> {
    let Some(unit) = unit else { return Some(1.0) };
    match unit.to_ascii_lowercase().as_str() {
        "k" => Some(1e3),
        "m" => Some(1e6),
        "b" => Some(1e9),
        _ => None,
    }
}

fn duration_factor(unit: Option<&str>) -> Option<f64> {
    let Some(unit) = unit else { return Some(1.0) };
    match unit.to_ascii_lowercase().as_str() {
        "ms" => Some(1.0),
        "s" => Some(1_000.0),
        "m" | "min" => Some(60_000.0),
        "h" | "hr" => Some(3_600_000.0),
        "d" | "day" => Some(86_400_000.0),
        "w" | "wk" => Some(604_800_000.0),
        _ => None,
    }
}

fn size_factor(unit: Option<&str>) -> Option<f64> {
    let Some(unit) = unit else { return Some(1.0) };
    let unit = unit.to_ascii_lowercase();
    let factor = match unit.as_str() {
        "bit" => 0.125,
        "nb" => 0.5,
        "b" | "bytes" => 1.0,
        _ => {
            const PREFIXES: [&str; 8] = ["k", "m", "g", "t", "p", "e", "z", "y"];
            let (prefix, base) = if let Some(prefix) = unit.strip_suffix("ib") {
                (prefix, 1024f64)
            } else if let Some(prefix) = unit.strip_suffix('b') {
                (prefix, 1000f64)
            } else {
                return None;
            };
            let power = PREFIXES.iter().position(|p| *p == prefix)?;
            base.powi(power as i32 + 1)
        }
    };
    Some(factor)
}
