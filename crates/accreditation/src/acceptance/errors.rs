use serde::Serialize;

/// Classification of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authorization,
    State,
    Timing,
    Input,
}

/// Reasons an accreditation operation is aborted.
///
/// The display strings are part of the public contract and callers match on them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcceptanceError {
    #[error("Only Chairman can call this function")]
    NotChairman,
    #[error("You are not a committee member")]
    NotCommitteeMember,
    #[error("User is already a current committee Member")]
    AlreadyMember,
    #[error("User is not a current committee Member")]
    NotMember,
    #[error("Applicant fee has been paid")]
    AlreadyPaid,
    #[error("Applicant has not paid the application fee")]
    NotPaid,
    #[error("Applicant is already open for voting")]
    AlreadyOpen,
    #[error("Applicant is not open for voting")]
    PollNotOpen,
    #[error("Applicant has no voting record")]
    PollNotFound,
    #[error("You have already voted for this applicant")]
    DuplicateBallot,
    #[error("Voting has already closed")]
    AlreadyClosed,
    #[error("Voting has not closed")]
    PollNotClosed,
    #[error("Application fee has already been distributed")]
    AlreadyDistributed,
    #[error("The institution must be approved to perform this function")]
    InstitutionNotApproved,
    #[error("Deadline not up")]
    DeadlineNotReached,
    #[error("Voting deadline is out of range")]
    DeadlineOutOfRange,
    #[error("Application fee is 5 ETH")]
    InsufficientFee,
    #[error("Escrow balance overflow")]
    BalanceOverflow,
}

impl AcceptanceError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            AcceptanceError::NotChairman | AcceptanceError::NotCommitteeMember => {
                ErrorKind::Authorization
            }
            AcceptanceError::DeadlineNotReached => ErrorKind::Timing,
            AcceptanceError::InsufficientFee
            | AcceptanceError::BalanceOverflow
            | AcceptanceError::DeadlineOutOfRange => ErrorKind::Input,
            AcceptanceError::AlreadyMember
            | AcceptanceError::NotMember
            | AcceptanceError::AlreadyPaid
            | AcceptanceError::NotPaid
            | AcceptanceError::AlreadyOpen
            | AcceptanceError::PollNotOpen
            | AcceptanceError::PollNotFound
            | AcceptanceError::DuplicateBallot
            | AcceptanceError::AlreadyClosed
            | AcceptanceError::PollNotClosed
            | AcceptanceError::AlreadyDistributed
            | AcceptanceError::InstitutionNotApproved => ErrorKind::State,
        }
    }
}
