//! Receipt field model and validation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The five receipt attributes the gateway extracts and lets users correct.
///
/// Enumeration order is load-bearing: it fixes the numeric edit-menu mapping
/// (1-5), the positional pairing in multi-field edits, and the display order
/// of every rendered summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiptField {
    Name,
    Phone,
    Email,
    Amount,
    Date,
}

impl ReceiptField {
    pub const ALL: [ReceiptField; 5] = [
        Self::Name,
        Self::Phone,
        Self::Email,
        Self::Amount,
        Self::Date,
    ];

    /// Map an edit-menu digit ("1".."5") to a field.
    pub fn from_menu_digit(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Self::Name),
            "2" => Some(Self::Phone),
            "3" => Some(Self::Email),
            "4" => Some(Self::Amount),
            "5" => Some(Self::Date),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Phone => "Phone",
            Self::Email => "Email",
            Self::Amount => "Amount",
            Self::Date => "Date",
        }
    }
}

/// Extracted/edited receipt values.
///
/// Values are always strings; extractor keys that arrive absent or null
/// deserialize to empty strings, and `normalize` trims the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub phone: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub email: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub amount: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub date: String,
}

/// Extractor replies carry explicit nulls often enough that both absent and
/// null keys must land as empty strings.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

impl ReceiptRecord {
    pub fn get(&self, field: ReceiptField) -> &str {
        match field {
            ReceiptField::Name => &self.name,
            ReceiptField::Phone => &self.phone,
            ReceiptField::Email => &self.email,
            ReceiptField::Amount => &self.amount,
            ReceiptField::Date => &self.date,
        }
    }

    pub fn set(&mut self, field: ReceiptField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ReceiptField::Name => self.name = value,
            ReceiptField::Phone => self.phone = value,
            ReceiptField::Email => self.email = value,
            ReceiptField::Amount => self.amount = value,
            ReceiptField::Date => self.date = value,
        }
    }

    /// Trim every value in place.
    pub fn normalize(&mut self) {
        for field in ReceiptField::ALL {
            let trimmed = self.get(field).trim().to_string();
            self.set(field, trimmed);
        }
    }

    /// True when every field is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        ReceiptField::ALL
            .iter()
            .all(|field| self.get(*field).trim().is_empty())
    }
}

/// Validate a candidate value for a field.
///
/// Returns a corrective message naming the field and the expected format;
/// the dialogue engine surfaces it verbatim.
pub fn validate(field: ReceiptField, raw: &str) -> Result<(), String> {
    let value = raw.trim();
    match field {
        ReceiptField::Name => {
            if value.is_empty() {
                Err("Name cannot be empty.".to_string())
            } else {
                Ok(())
            }
        }
        ReceiptField::Phone => {
            if value.len() == 10 && value.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err("Phone must be exactly 10 digits with no spaces or symbols, e.g. 9876543210.".to_string())
            }
        }
        ReceiptField::Email => {
            if valid_email(value) {
                Ok(())
            } else {
                Err("Email must look like name@example.com: one @, a dot in the domain, no spaces.".to_string())
            }
        }
        ReceiptField::Amount => {
            if valid_amount(value) {
                Ok(())
            } else {
                Err("Amount must be a number with at most 2 decimal places, e.g. 1499 or 1499.50.".to_string())
            }
        }
        ReceiptField::Date => {
            if valid_date(value) {
                Ok(())
            } else {
                Err("Date was not recognized. Use a format like 2024-03-21 or 21/03/2024.".to_string())
            }
        }
    }
}

fn valid_email(value: &str) -> bool {
    if value.chars().filter(|c| *c == '@').count() != 1 {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !local.ends_with(char::is_whitespace)
        && !domain.starts_with(char::is_whitespace)
}

fn valid_amount(value: &str) -> bool {
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };
    let whole_ok = !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit());
    let fraction_ok = match fraction {
        Some(f) => (1..=2).contains(&f.len()) && f.chars().all(|c| c.is_ascii_digit()),
        None => true,
    };
    whole_ok && fraction_ok
}

/// Formats accepted for the date field, tried in order.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%b %d, %Y",
];

fn valid_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|format| NaiveDate::parse_from_str(value, format).is_ok())
}
