// src/generators/mod.rs
pub mod password;

pub use password::{
    GeneratorError, PasswordGenerator, StrengthAssessment, StrengthLabel, MAX_GENERATION_ATTEMPTS,
};
