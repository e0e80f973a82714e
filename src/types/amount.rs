use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde_json::Value;

/// Monetary amount in the backend's currency. The transport layer sends totals
/// both as JSON numbers and as decimal strings; both land here as `f64`.
#[derive(Debug, Copy, Clone, Default, PartialEq, PartialOrd)]
pub struct Amount(f64);

impl Amount {
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Amount(value)
        } else {
            Amount::default()
        }
    }

    /// Anything that is not a finite number or a numeric string coerces to zero.
    pub fn from_json(value: &Value) -> Self {
        let parsed = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };

        parsed.map(Amount::new).unwrap_or_default()
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.2}", self.0)
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::new(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount::new(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_and_numbers_compare_equal() {
        assert_eq!(Amount::from_json(&json!("125000.00")), Amount::from_json(&json!(125000)));
        assert_eq!(Amount::from_json(&json!(" 12.5 ")).as_f64(), 12.5);
    }

    #[test]
    fn missing_or_garbage_values_coerce_to_zero() {
        assert_eq!(Amount::from_json(&Value::Null), Amount::default());
        assert_eq!(Amount::from_json(&json!("n/a")), Amount::default());
        assert_eq!(Amount::from_json(&json!({ "value": 3 })), Amount::default());
    }

    #[test]
    fn sums_and_formats_with_two_decimals() {
        let total: Amount = [Amount::new(10.0), Amount::new(2.25), Amount::new(0.5)]
            .into_iter()
            .sum();

        assert_eq!(total.to_string(), "12.75");
        assert_eq!(Amount::new(150_000.0).to_string(), "150000.00");
    }
}
