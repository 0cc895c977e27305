use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps passenger PII (email, passport number, phone) so it never reaches log output.
///
/// `Debug` and `Display` print a fixed mask. Serialization writes the real value,
/// since API responses and the database layer need it.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_formatting() {
        let email = Masked::new("jane@example.com".to_string());
        assert_eq!(format!("{:?}", email), "********");
        assert_eq!(email.to_string(), "********");
        assert_eq!(email.expose(), "jane@example.com");
    }

    #[test]
    fn test_masked_serializes_real_value() {
        let passport = Masked::new("X1234567".to_string());
        let json = serde_json::to_string(&passport).unwrap();
        assert_eq!(json, "\"X1234567\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, passport);
    }
}
