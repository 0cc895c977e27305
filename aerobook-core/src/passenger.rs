use aerobook_shared::Masked;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};

const MAX_NAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 256;
const MAX_PASSPORT_LEN: usize = 32;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{7,15}$").expect("phone pattern is valid"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub id: Uuid,
    pub full_name: String,
    pub email: Masked<String>,
    pub passport_number: Masked<String>,
    pub phone_number: Option<Masked<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPassenger {
    pub full_name: String,
    pub email: Masked<String>,
    pub passport_number: Masked<String>,
    #[serde(default)]
    pub phone_number: Option<Masked<String>>,
}

impl NewPassenger {
    pub fn validate(&self) -> BookingResult<()> {
        let name = self.full_name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(BookingError::Validation(format!(
                "full name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }

        let email = self.email.expose();
        if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
            return Err(BookingError::Validation("email address is invalid".into()));
        }

        let passport = self.passport_number.expose().trim();
        if passport.is_empty() || passport.len() > MAX_PASSPORT_LEN {
            return Err(BookingError::Validation(format!(
                "passport number must be 1 to {MAX_PASSPORT_LEN} characters"
            )));
        }

        if let Some(phone) = self.phone() {
            if !PHONE_RE.is_match(phone) {
                return Err(BookingError::Validation(
                    "phone number must be 7-15 digits, optionally starting with +".into(),
                ));
            }
        }
        Ok(())
    }

    /// Phone number with blank input treated as absent.
    fn phone(&self) -> Option<&str> {
        self.phone_number
            .as_ref()
            .map(|p| p.expose().trim())
            .filter(|p| !p.is_empty())
    }

    pub fn into_passenger(self) -> BookingResult<Passenger> {
        self.validate()?;
        let phone_number = self.phone().map(|p| Masked::new(p.to_string()));
        Ok(Passenger {
            id: Uuid::now_v7(),
            full_name: self.full_name.trim().to_string(),
            email: Masked::new(self.email.expose().trim().to_string()),
            passport_number: Masked::new(self.passport_number.expose().trim().to_string()),
            phone_number,
        })
    }
}
