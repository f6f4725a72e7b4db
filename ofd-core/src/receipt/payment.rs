use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::ConfigError;

/// How the customer settles the receipt total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Card,
    Mix,
}

impl FromStr for PaymentType {
    type Err = ConfigError;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentType::Cash),
            "card" => Ok(PaymentType::Card),
            "mix" => Ok(PaymentType::Mix),
            _ => Err(ConfigError::InvalidPaymentType {
                input: value.to_string(),
            }),
        }
    }
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Card => "card",
            PaymentType::Mix => "mix",
        }
    }
}

/// Payment for a receipt: a split policy over the total, or amounts received
/// up front (advance prepayments, credit sales).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payment {
    Policy(PaymentType),
    Received { cash: i64, card: i64 },
}

impl From<PaymentType> for Payment {
    fn from(value: PaymentType) -> Self {
        Payment::Policy(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSplit {
    pub cash: i64,
    pub card: i64,
}

impl Payment {
    /// Split `total` into cash and card parts.
    ///
    /// # Examples
    /// ```rust
    /// use ofd_core::receipt::{Payment, PaymentType};
    ///
    /// let split = Payment::Policy(PaymentType::Mix).split(415001);
    /// assert_eq!((split.cash, split.card), (207500, 207501));
    /// ```
    pub fn split(&self, total: i64) -> PaymentSplit {
        match *self {
            Payment::Policy(PaymentType::Cash) => PaymentSplit {
                cash: total,
                card: 0,
            },
            Payment::Policy(PaymentType::Card) => PaymentSplit {
                cash: 0,
                card: total,
            },
            Payment::Policy(PaymentType::Mix) => {
                let cash = total.div_euclid(2);
                PaymentSplit {
                    cash,
                    card: total - cash,
                }
            }
            Payment::Received { cash, card } => PaymentSplit { cash, card },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_always_cover_total() {
        for total in [0, 1, 2, 15000, 400000, 415001, 999_999_999] {
            for policy in [PaymentType::Cash, PaymentType::Card, PaymentType::Mix] {
                let split = Payment::Policy(policy).split(total);
                assert_eq!(split.cash + split.card, total, "{policy:?} {total}");
            }
            assert_eq!(Payment::Policy(PaymentType::Mix).split(total).cash, total / 2);
        }
    }

    #[test]
    fn received_amounts_pass_through() {
        let split = Payment::Received {
            cash: 0,
            card: 250114,
        }
        .split(750338);
        assert_eq!(split, PaymentSplit { cash: 0, card: 250114 });
    }

    #[test]
    fn parses_payment_type() {
        assert_eq!("MIX".parse::<PaymentType>().unwrap(), PaymentType::Mix);
        assert!("cheque".parse::<PaymentType>().is_err());
    }
}
