//! Error kinds shared by every component of the threshold voting core.
//!
//! One flat enum mirrors the language-neutral error kinds of the
//! specification so that callers crossing the crate boundary see a single,
//! stable vocabulary of failures instead of one enum per module.

use thiserror::Error;

pub type ThresholdResult<T> = Result<T, ThresholdError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("invalid threshold config: {0}")]
    InvalidThresholdConfig(String),

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("invalid partial decryption proof")]
    InvalidPartialProof,

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("insufficient partials: have {have}, need {need}")]
    InsufficientPartials { have: usize, need: usize },

    #[error("invalid partial in combine from guardian {guardian_index}")]
    InvalidPartialInCombine { guardian_index: u16 },

    #[error("combine failed: {0}")]
    CombineFailed(String),

    #[error("guardian already registered: {0}")]
    GuardianAlreadyRegistered(String),

    #[error("guardian not found: {0}")]
    GuardianNotFound(String),

    #[error("invalid share index: {0}")]
    InvalidShareIndex(u16),

    #[error("guardian registry is full (capacity {capacity})")]
    RegistryFull { capacity: u16 },

    #[error("poll {0} is not configured")]
    PollNotConfigured(String),

    #[error("invalid interval config: {0}")]
    InvalidIntervalConfig(String),

    #[error("invalid poll scheduling state: {0}")]
    PollSchedulingState(String),

    #[error("ceremony not found: {0}")]
    CeremonyNotFound(String),

    #[error("ceremony {0} already complete")]
    CeremonyAlreadyComplete(String),

    #[error("duplicate partial submission from guardian {0}")]
    DuplicatePartialSubmission(u16),

    #[error("invalid ceremony partial proof: {0}")]
    InvalidCeremonyPartialProof(String),

    #[error("insufficient guardians: have {have}, need {need}")]
    InsufficientGuardians { have: usize, need: usize },

    #[error("invalid threshold poll config: {0}")]
    InvalidThresholdPollConfig(String),

    #[error("instance id mismatch on tagged ciphertext")]
    InstanceIdMismatch,

    #[error("ceremony {0} timed out")]
    CeremonyTimedOut(String),

    #[error("voter {0} has already cast a ballot at this precinct")]
    DuplicateVote(String),

    #[error("tally inconsistency: {0}")]
    TallyInconsistent(String),
}
