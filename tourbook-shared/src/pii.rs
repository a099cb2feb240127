use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps customer contact data (email, phone) so that `{:?}` and `{}` in
/// tracing macros never print the raw value. Serialization passes the real
/// value through because API responses and stored rows need it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl fmt::Display for Masked<String> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", redact(&self.0))
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
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}

/// Keeps the first character and, for emails, the domain: `a****@example.com`.
fn redact(value: &str) -> String {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return String::new(),
    };

    match value.split_once('@') {
        Some((local, domain)) => {
            let hidden = local.chars().count().saturating_sub(1);
            format!("{}{}@{}", first, "*".repeat(hidden), domain)
        }
        None => format!("{}{}", first, "*".repeat(chars.count())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_email_domain() {
        let email = Masked("asha@example.com".to_string());
        assert_eq!(email.to_string(), "a***@example.com");
        assert_eq!(format!("{:?}", email), "********");
    }

    #[test]
    fn test_display_masks_phone() {
        let phone = Masked("+919812345678".to_string());
        assert_eq!(phone.to_string(), "+************");
    }

    #[test]
    fn test_serialize_passes_value_through() {
        let email = Masked("asha@example.com".to_string());
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"asha@example.com\"");
    }
}
