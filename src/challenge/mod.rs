//! Challenge provisioning and code grading contracts
//!
//! The service does not generate challenge content or execute code itself;
//! both concerns live behind the traits defined here.

pub mod executor;
pub mod provider;

pub use executor::{CodeExecutor, MockCodeExecutor};
pub use provider::{
    difficulty_for_level, validate_challenge, ChallengeProvider, ChallengeRequest,
    MockChallengeProvider, StaticChallengeProvider,
};
