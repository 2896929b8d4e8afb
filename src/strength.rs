// src/strength.rs
//
// Interactive policy evaluator for user-chosen passwords. This is the gate
// for the change-password flow and is deliberately a separate scale from the
// entropy-based assessment of generated passwords; the two must not be
// conflated.
use std::collections::HashSet;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Minimum length for an active password change. Stricter than signup.
pub const MIN_CHANGE_LENGTH: usize = 12;
/// Minimum length at account-creation time. The two thresholds are
/// intentionally different.
pub const MIN_SIGNUP_LENGTH: usize = 8;

/// Number of requirements in [`PasswordRequirements`]; a fully conforming
/// password scores exactly this.
pub const REQUIREMENT_COUNT: u8 = 6;

lazy_static! {
    // Static denylist of known-weak passwords, exact-match. Not editable at
    // runtime.
    static ref COMMON_PASSWORDS: HashSet<&'static str> = {
        [
            "password",
            "password1",
            "password123",
            "passw0rd",
            "p@ssword",
            "p@ssw0rd",
            "123456",
            "1234567",
            "12345678",
            "123456789",
            "1234567890",
            "qwerty",
            "qwerty123",
            "abc123",
            "letmein",
            "welcome",
            "welcome1",
            "admin",
            "admin123",
            "iloveyou",
            "monkey",
            "dragon",
            "sunshine",
            "princess",
            "football",
            "baseball",
            "master",
            "shadow",
            "superman",
            "trustno1",
            "banking123",
            "changeme",
        ]
        .into_iter()
        .collect()
    };
}

/// Which individual requirements a candidate password meets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequirements {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub numbers: bool,
    pub special_chars: bool,
    pub not_common: bool,
}

impl PasswordRequirements {
    /// Human-readable names of the unmet requirements, for form-level
    /// feedback.
    pub fn unmet(&self) -> Vec<&'static str> {
        let mut unmet = Vec::new();
        if !self.length {
            unmet.push("at least 12 characters");
        }
        if !self.uppercase {
            unmet.push("an uppercase letter");
        }
        if !self.lowercase {
            unmet.push("a lowercase letter");
        }
        if !self.numbers {
            unmet.push("a number");
        }
        if !self.special_chars {
            unmet.push("a special character");
        }
        if !self.not_common {
            unmet.push("not a commonly used password");
        }
        unmet
    }
}

/// Result of [`validate_password_strength`]: the satisfied-requirement count
/// (0-6) and the individual checks. The change-password flow accepts only a
/// full score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthReport {
    pub score: u8,
    pub requirements: PasswordRequirements,
}

impl StrengthReport {
    pub fn satisfies_all(&self) -> bool {
        self.score == REQUIREMENT_COUNT
    }
}

/// Evaluate a candidate password against the change-password policy.
///
/// The denylist lookup lowercases the candidate first, so `Password123`
/// fails `not_common` just like `password123`; the list itself stays
/// exact-match and lowercase.
pub fn validate_password_strength(password: &str) -> StrengthReport {
    let requirements = PasswordRequirements {
        length: password.chars().count() >= MIN_CHANGE_LENGTH,
        uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
        lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
        numbers: password.chars().any(|c| c.is_ascii_digit()),
        special_chars: password.chars().any(|c| !c.is_ascii_alphanumeric()),
        not_common: !COMMON_PASSWORDS.contains(password.to_ascii_lowercase().as_str()),
    };

    let score = [
        requirements.length,
        requirements.uppercase,
        requirements.lowercase,
        requirements.numbers,
        requirements.special_chars,
        requirements.not_common,
    ]
    .into_iter()
    .filter(|met| *met)
    .count() as u8;

    StrengthReport {
        score,
        requirements,
    }
}

/// The weaker account-creation check: length only.
pub fn meets_signup_minimum(password: &str) -> bool {
    password.chars().count() >= MIN_SIGNUP_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_password_fails_length_even_with_other_classes() {
        let report = validate_password_strength("short1!");
        assert!(!report.requirements.length);
        assert!(report.requirements.lowercase);
        assert!(report.requirements.numbers);
        assert!(report.requirements.special_chars);
        assert!(report.score < REQUIREMENT_COUNT);
        assert!(!report.satisfies_all());
    }

    #[test]
    fn conforming_password_scores_full() {
        let report = validate_password_strength("Correct-Horse7-Battery");
        assert_eq!(report.score, REQUIREMENT_COUNT);
        assert!(report.satisfies_all());
        assert!(report.requirements.unmet().is_empty());
    }

    #[test]
    fn denylisted_password_fails_not_common() {
        let report = validate_password_strength("password123");
        assert!(!report.requirements.not_common);

        // Exact match is case-insensitive on the candidate.
        let report = validate_password_strength("Password123");
        assert!(!report.requirements.not_common);
    }

    #[test]
    fn unmet_lists_every_missing_requirement() {
        let report = validate_password_strength("abc");
        let unmet = report.requirements.unmet();
        assert!(unmet.contains(&"at least 12 characters"));
        assert!(unmet.contains(&"an uppercase letter"));
        assert!(unmet.contains(&"a number"));
        assert!(unmet.contains(&"a special character"));
    }

    #[test]
    fn signup_threshold_is_weaker_than_change_threshold() {
        assert!(meets_signup_minimum("8chars!!"));
        assert!(!meets_signup_minimum("seven!!"));
        // The same 8-character password does not pass the change gate.
        assert!(!validate_password_strength("Abcd12!x").satisfies_all());
    }
}
