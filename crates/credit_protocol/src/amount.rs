//! Monetary amounts as exact JSON numbers.
//!
//! serde_json keeps the literal digits of every number (`arbitrary_precision`),
//! so amounts are read from and written as decimal text without ever passing
//! through `f64`. Strings holding numbers are rejected.

use rust_decimal::Decimal;
use serde_json::Number;
use std::str::FromStr;

/// Exact value of a JSON number, or why it does not fit a [`Decimal`].
pub fn decimal_from_number(number: &Number) -> Result<Decimal, String> {
    let text = number.to_string();
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(&text)
    } else {
        Decimal::from_str(&text)
    };
    parsed.map_err(|e| format!("amount {text} does not fit a decimal: {e}"))
}

pub fn number_from_decimal(amount: &Decimal) -> Result<Number, String> {
    Number::from_str(&amount.to_string()).map_err(|e| e.to_string())
}

pub(crate) mod exact {
    use super::{decimal_from_number, number_from_decimal};
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Number;

    pub fn serialize<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        number_from_decimal(amount)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let number = Number::deserialize(deserializer)?;
        decimal_from_number(&number).map_err(D::Error::custom)
    }
}

pub(crate) mod exact_option {
    use super::decimal_from_number;
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Number;

    pub fn serialize<S: Serializer>(
        amount: &Option<Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match amount {
            Some(amount) => super::exact::serialize(amount, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        match Option::<Number>::deserialize(deserializer)? {
            Some(number) => decimal_from_number(&number)
                .map(Some)
                .map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(text: &str) -> Number {
        Number::from_str(text).unwrap()
    }

    #[test]
    fn digits_are_kept_verbatim() {
        for text in ["2000.0000000000001", "1234.123456789012345", "0.10", "-42"] {
            let amount = decimal_from_number(&number(text)).unwrap();
            assert_eq!(amount.to_string(), text);
            assert_eq!(number_from_decimal(&amount).unwrap().to_string(), text);
        }
    }

    #[test]
    fn exponents_are_expanded() {
        assert_eq!(
            decimal_from_number(&number("1.5e3")).unwrap(),
            Decimal::new(1500, 0)
        );
    }

    #[test]
    fn out_of_range_numbers_are_errors() {
        assert!(decimal_from_number(&number("1e40")).is_err());
    }
}
