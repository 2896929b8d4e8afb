// src/generators/password.rs
//
// Password generation engine. Every credential-bearing draw goes through
// `OsRng`; a general-purpose PRNG is never acceptable here because the
// output is used as a real account credential.
use std::collections::HashSet;

use rand::rngs::OsRng;
use rand::Rng;
use thiserror::Error;

use crate::config::Config;
use crate::models::PasswordPolicy;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBERS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()-_=+[]{}|;:,.<>?";

// Visually-similar characters dropped under `exclude_similar`.
const SIMILAR: &[u8] = b"il1Lo0O";
// Syntactically-ambiguous characters dropped under `exclude_ambiguous`.
const AMBIGUOUS: &[u8] = b"{}[]()/\\'\"`~,;:.<>";

/// Generation length bounds. Shorter passwords are a policy error, not a
/// silently-weakened credential.
const MIN_LENGTH: usize = 12;
const MAX_LENGTH: usize = 128;

/// Bounded retry budget for the defensive re-validation loop. Validation
/// failure after a guaranteed-minimum draw is statistically near-impossible,
/// so hitting this limit means the policy is unsatisfiable in practice.
pub const MAX_GENERATION_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Invalid password policy: {0}")]
    Policy(String),

    #[error("Could not generate a conforming password after {0} attempts")]
    Generation(usize),
}

/// Five ordered strength tiers mapped from the entropy estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthLabel {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
    Excellent,
}

impl std::fmt::Display for StrengthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrengthLabel::Weak => write!(f, "Weak"),
            StrengthLabel::Moderate => write!(f, "Moderate"),
            StrengthLabel::Strong => write!(f, "Strong"),
            StrengthLabel::VeryStrong => write!(f, "Very Strong"),
            StrengthLabel::Excellent => write!(f, "Excellent"),
        }
    }
}

/// Result of [`PasswordGenerator::assess`]. `entropy_bits` is the
/// upper-bound estimate from [`PasswordGenerator::calculate_entropy`], not a
/// measurement of the randomness source.
#[derive(Debug, Clone)]
pub struct StrengthAssessment {
    pub label: StrengthLabel,
    pub entropy_bits: f64,
    pub recommendation: &'static str,
}

// One enabled character class: its effective alphabet and guaranteed minimum.
struct CharClass {
    alphabet: Vec<u8>,
    min_count: usize,
}

pub struct PasswordGenerator {
    suggestion_attempt_factor: usize,
}

impl PasswordGenerator {
    pub fn new() -> Self {
        Self {
            suggestion_attempt_factor: 10,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            suggestion_attempt_factor: config.suggestion_attempt_factor,
        }
    }

    /// Generate a password satisfying `policy`.
    ///
    /// Draws exactly `min_count` characters from each enabled class, fills
    /// the remainder from the union alphabet, then applies a Fisher-Yates
    /// shuffle to remove positional bias. The result is re-validated before
    /// returning; a non-conforming draw is regenerated up to
    /// [`MAX_GENERATION_ATTEMPTS`] times.
    pub fn generate(&self, policy: &PasswordPolicy) -> Result<String, GeneratorError> {
        let classes = Self::enabled_classes(policy)?;

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let candidate = Self::sample(policy.length, &classes);
            if Self::satisfies(&candidate, &classes) {
                return Ok(candidate);
            }
            log::warn!("generated password failed re-validation, regenerating");
        }

        Err(GeneratorError::Generation(MAX_GENERATION_ATTEMPTS))
    }

    /// Generate up to `count` unique passwords. Gives up after
    /// `count * suggestion_attempt_factor` attempts and returns whatever
    /// unique set was produced, so a tiny policy space can never loop
    /// forever.
    pub fn suggestions(
        &self,
        count: usize,
        policy: &PasswordPolicy,
    ) -> Result<Vec<String>, GeneratorError> {
        // Surface policy errors even when no suggestions were asked for.
        Self::enabled_classes(policy)?;

        let mut seen = HashSet::new();
        let mut suggestions = Vec::with_capacity(count);
        let max_attempts = count * self.suggestion_attempt_factor;
        let mut attempts = 0;

        while suggestions.len() < count && attempts < max_attempts {
            attempts += 1;
            let password = self.generate(policy)?;
            if seen.insert(password.clone()) {
                suggestions.push(password);
            }
        }

        Ok(suggestions)
    }

    /// Compose a pronounceable password from alternating word lists.
    ///
    /// Lower entropy than [`PasswordGenerator::generate`] by design: present
    /// the result with that caveat, never as a drop-in security equivalent.
    /// With `append_number` a two-digit suffix and a trailing `!` are added
    /// to satisfy number/special-character policies.
    pub fn memorable(&self, word_count: usize, separator: &str, append_number: bool) -> String {
        let mut rng = OsRng;
        let lists: [&[&str]; 3] = [ADJECTIVES, NOUNS, VERBS];

        let mut password = String::new();
        for i in 0..word_count.max(1) {
            let list = lists[i % lists.len()];
            let word = list[rng.gen_range(0..list.len())];

            // Capitalize each word so the uppercase class is covered.
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                password.push(first.to_ascii_uppercase());
                password.push_str(chars.as_str());
            }

            if i + 1 < word_count.max(1) {
                password.push_str(separator);
            }
        }

        if append_number {
            let suffix: u32 = rng.gen_range(10..=99);
            password.push_str(&suffix.to_string());
            password.push('!');
        }

        password
    }

    /// Upper-bound entropy estimate: `length * log2(charset)`, where the
    /// charset size is the sum of the class sizes actually observed in the
    /// password (26 lower, 26 upper, 10 digits, 32 special). This is not a
    /// true information-theoretic measurement.
    pub fn calculate_entropy(&self, password: &str) -> f64 {
        if password.is_empty() {
            return 0.0;
        }

        let mut charset_size = 0usize;
        if password.chars().any(|c| c.is_ascii_lowercase()) {
            charset_size += 26;
        }
        if password.chars().any(|c| c.is_ascii_uppercase()) {
            charset_size += 26;
        }
        if password.chars().any(|c| c.is_ascii_digit()) {
            charset_size += 10;
        }
        if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
            charset_size += 32;
        }

        password.chars().count() as f64 * (charset_size as f64).log2()
    }

    /// Map the entropy estimate onto the five strength tiers.
    pub fn assess(&self, password: &str) -> StrengthAssessment {
        let entropy_bits = self.calculate_entropy(password);

        let (label, recommendation) = if entropy_bits < 25.0 {
            (
                StrengthLabel::Weak,
                "Too easy to guess. Use a longer password with mixed character types.",
            )
        } else if entropy_bits < 40.0 {
            (
                StrengthLabel::Moderate,
                "Acceptable for low-value accounts only. Add length and symbols.",
            )
        } else if entropy_bits < 60.0 {
            (
                StrengthLabel::Strong,
                "Good. Consider 16+ characters for sensitive accounts.",
            )
        } else if entropy_bits < 80.0 {
            (
                StrengthLabel::VeryStrong,
                "Very good. Suitable for most account credentials.",
            )
        } else {
            (
                StrengthLabel::Excellent,
                "Excellent. No changes needed.",
            )
        };

        StrengthAssessment {
            label,
            entropy_bits,
            recommendation,
        }
    }

    // Resolve the policy into effective per-class alphabets, validating the
    // policy invariants along the way.
    fn enabled_classes(policy: &PasswordPolicy) -> Result<Vec<CharClass>, GeneratorError> {
        if policy.length < MIN_LENGTH || policy.length > MAX_LENGTH {
            return Err(GeneratorError::Policy(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH, MAX_LENGTH, policy.length
            )));
        }

        let selected: [(bool, &[u8], usize); 4] = [
            (policy.include_lowercase, LOWERCASE, policy.min_lowercase),
            (policy.include_uppercase, UPPERCASE, policy.min_uppercase),
            (policy.include_numbers, NUMBERS, policy.min_numbers),
            (policy.include_special, SPECIAL, policy.min_special),
        ];

        let mut classes = Vec::new();
        for (enabled, alphabet, min_count) in selected {
            if !enabled {
                continue;
            }

            let mut alphabet = alphabet.to_vec();
            if policy.exclude_similar {
                alphabet.retain(|c| !SIMILAR.contains(c));
            }
            if policy.exclude_ambiguous {
                alphabet.retain(|c| !AMBIGUOUS.contains(c));
            }

            if alphabet.is_empty() {
                return Err(GeneratorError::Policy(
                    "a required character class is empty after exclusions".into(),
                ));
            }

            classes.push(CharClass { alphabet, min_count });
        }

        if classes.is_empty() {
            return Err(GeneratorError::Policy(
                "at least one character class must be enabled".into(),
            ));
        }

        let total_min: usize = classes.iter().map(|c| c.min_count).sum();
        if total_min > policy.length {
            return Err(GeneratorError::Policy(format!(
                "sum of per-class minimums ({}) exceeds length ({})",
                total_min, policy.length
            )));
        }

        Ok(classes)
    }

    // Draw the guaranteed minimums, fill from the union alphabet, shuffle.
    fn sample(length: usize, classes: &[CharClass]) -> String {
        let mut rng = OsRng;
        let mut bytes = Vec::with_capacity(length);

        for class in classes {
            for _ in 0..class.min_count {
                bytes.push(class.alphabet[rng.gen_range(0..class.alphabet.len())]);
            }
        }

        let union: Vec<u8> = classes.iter().flat_map(|c| c.alphabet.iter().copied()).collect();
        while bytes.len() < length {
            bytes.push(union[rng.gen_range(0..union.len())]);
        }

        Self::fisher_yates(&mut bytes);

        // All alphabets are ASCII.
        String::from_utf8(bytes).unwrap_or_default()
    }

    // In-place Fisher-Yates shuffle over the CSPRNG.
    fn fisher_yates(bytes: &mut [u8]) {
        let mut rng = OsRng;
        for i in (1..bytes.len()).rev() {
            let j = rng.gen_range(0..=i);
            bytes.swap(i, j);
        }
    }

    // Defensive re-validation: every class minimum must be met and every
    // character must come from some enabled alphabet.
    fn satisfies(password: &str, classes: &[CharClass]) -> bool {
        for class in classes {
            let observed = password
                .bytes()
                .filter(|b| class.alphabet.contains(b))
                .count();
            if observed < class.min_count {
                return false;
            }
        }

        password
            .bytes()
            .all(|b| classes.iter().any(|c| c.alphabet.contains(&b)))
    }
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self::new()
    }
}

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "clever", "crisp", "eager", "fresh", "gentle", "golden", "happy",
    "keen", "lively", "mellow", "noble", "quick", "quiet", "silver", "steady", "sunny", "wise",
];

const NOUNS: &[&str] = &[
    "anchor", "bridge", "canyon", "cedar", "comet", "falcon", "garden", "harbor", "island",
    "lantern", "meadow", "mountain", "orchard", "otter", "pebble", "river", "saddle", "summit",
    "thunder", "willow",
];

const VERBS: &[&str] = &[
    "carries", "climbs", "dances", "drifts", "flows", "gathers", "glides", "grows", "jumps",
    "leaps", "rises", "roams", "rolls", "sails", "shines", "sings", "soars", "turns", "wanders",
    "waves",
];
