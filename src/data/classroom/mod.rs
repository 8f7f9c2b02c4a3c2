use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

pub const CODE_LENGTH: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Classroom {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Join code, always uppercase.
    pub code: String,
    pub teacher: Uuid,
    /// Enrolled students in join order.
    #[serde(default)]
    pub students: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Classroom {
    pub fn new(
        name: impl ToString,
        subject: impl ToString,
        description: Option<String>,
        code: impl ToString,
        teacher: Uuid,
        created_at: DateTime<Utc>,
    ) -> Classroom {
        Classroom {
            id: Uuid::new_v4(),
            name: name.to_string(),
            subject: subject.to_string(),
            description,
            code: code.to_string(),
            teacher,
            students: vec![],
            created_at,
        }
    }

    pub fn has_student(&self, user: Uuid) -> bool {
        self.students.contains(&user)
    }
}

/// Draws a join code from `rng`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are matched case-insensitively; stored codes are uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn generated_codes_are_uppercase_alphanumeric() {
        for _ in 0..64 {
            let code = generate_code(&mut OsRng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_normalize_to_uppercase() {
        assert_eq!(normalize_code(" abc123 "), "ABC123");
    }
}
