use uuid::Uuid;

pub const REFERENCE_LEN: usize = 8;

/// Short human-shareable booking token: 8 uppercase hex characters.
pub fn generate_reference() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(REFERENCE_LEN);
    token.to_uppercase()
}

pub fn is_valid_reference(value: &str) -> bool {
    value.len() == REFERENCE_LEN
        && value.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_shape() {
        for _ in 0..32 {
            let reference = generate_reference();
            assert!(is_valid_reference(&reference), "bad reference {}", reference);
        }
    }

    #[test]
    fn test_rejects_lowercase_and_wrong_length() {
        assert!(!is_valid_reference("a1b2c3d4"));
        assert!(!is_valid_reference("A1B2C3D"));
        assert!(is_valid_reference("A1B2C3D4"));
    }
}
