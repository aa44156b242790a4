//! # Status Codes & Classification
//!
//! Nodes answer every request twice over: a *precheck* code in the immediate
//! reply (did the node accept the request for processing?) and, later, a
//! *consensus* status in the receipt (what did the network decide?). Both use
//! the same [`Status`] code space.
//!
//! ## Design Decisions
//!
//! - Which codes mean "retry" is decided by lookup tables ([`Classifier`]),
//!   not by `match` arms scattered through the engine. Each request type
//!   names the classifier it uses; moving a code between sets is a one-line
//!   edit to a table below.
//! - Unknown codes are preserved as [`Status::Unrecognized`] so a newer node
//!   talking to an older client degrades to "terminal" instead of failing to
//!   decode.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! statuses {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $name:literal,)+) => {
        /// A precheck or consensus status code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "i32", into = "i32")]
        pub enum Status {
            $($(#[$doc])* $variant,)+
            /// A code this client does not know about.
            Unrecognized(i32),
        }

        impl Status {
            /// Numeric wire code.
            pub fn code(self) -> i32 {
                match self {
                    $(Status::$variant => $code,)+
                    Status::Unrecognized(code) => code,
                }
            }

            /// Upper snake case name, as nodes print it.
            pub fn name(self) -> &'static str {
                match self {
                    $(Status::$variant => $name,)+
                    Status::Unrecognized(_) => "UNRECOGNIZED",
                }
            }
        }

        impl From<i32> for Status {
            fn from(code: i32) -> Self {
                match code {
                    $($code => Status::$variant,)+
                    other => Status::Unrecognized(other),
                }
            }
        }
    };
}

statuses! {
    /// Accepted for processing, or (in a receipt) not yet decided.
    Ok = 0 => "OK",
    InvalidTransaction = 1 => "INVALID_TRANSACTION",
    PayerAccountNotFound = 2 => "PAYER_ACCOUNT_NOT_FOUND",
    /// The body names a different node than the one it was sent to.
    InvalidNodeAccount = 3 => "INVALID_NODE_ACCOUNT",
    TransactionExpired = 4 => "TRANSACTION_EXPIRED",
    InvalidTransactionStart = 5 => "INVALID_TRANSACTION_START",
    InvalidTransactionDuration = 6 => "INVALID_TRANSACTION_DURATION",
    InvalidSignature = 7 => "INVALID_SIGNATURE",
    MemoTooLong = 8 => "MEMO_TOO_LONG",
    InsufficientTxFee = 9 => "INSUFFICIENT_TX_FEE",
    InsufficientPayerBalance = 10 => "INSUFFICIENT_PAYER_BALANCE",
    DuplicateTransaction = 11 => "DUPLICATE_TRANSACTION",
    /// The node is overloaded. Try the same node again later.
    Busy = 12 => "BUSY",
    NotSupported = 13 => "NOT_SUPPORTED",
    InvalidFileId = 14 => "INVALID_FILE_ID",
    InvalidAccountId = 15 => "INVALID_ACCOUNT_ID",
    InvalidContractId = 16 => "INVALID_CONTRACT_ID",
    InvalidTransactionId = 17 => "INVALID_TRANSACTION_ID",
    ReceiptNotFound = 18 => "RECEIPT_NOT_FOUND",
    RecordNotFound = 19 => "RECORD_NOT_FOUND",
    InvalidSolidityId = 20 => "INVALID_SOLIDITY_ID",
    /// Consensus has not been reached yet.
    Unknown = 21 => "UNKNOWN",
    /// The transaction reached consensus and took effect.
    Success = 22 => "SUCCESS",
    FailInvalid = 23 => "FAIL_INVALID",
    FailFee = 24 => "FAIL_FEE",
    FailBalance = 25 => "FAIL_BALANCE",
    /// The node failed to hand the transaction to the platform.
    PlatformTransactionNotCreated = 49 => "PLATFORM_TRANSACTION_NOT_CREATED",
    /// The node is up but not yet participating in consensus.
    PlatformNotActive = 50 => "PLATFORM_NOT_ACTIVE",
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unrecognized(code) => write!(f, "UNRECOGNIZED({code})"),
            other => f.write_str(other.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// What the engine should do with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done; map the response to the caller's value.
    Success,
    /// Back off and ask the same node again.
    Retry,
    /// Give up and surface the status as an error.
    Terminal,
}

/// A named partition of the status space.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    /// Codes that complete the request.
    pub ok: &'static [Status],
    /// Codes worth asking about again.
    pub retriable: &'static [Status],
    /// Disposition of everything else.
    pub otherwise: Disposition,
}

impl Classifier {
    pub fn classify(&self, status: Status) -> Disposition {
        if self.ok.contains(&status) {
            Disposition::Success
        } else if self.retriable.contains(&status) {
            Disposition::Retry
        } else {
            self.otherwise
        }
    }
}

/// Precheck codes for transaction submission.
pub const SUBMIT: Classifier = Classifier {
    ok: &[Status::Ok],
    retriable: &[
        Status::Busy,
        Status::PlatformTransactionNotCreated,
        Status::PlatformNotActive,
    ],
    otherwise: Disposition::Terminal,
};

/// Precheck codes for receipt and record queries. Not-found is retriable:
/// the node may simply not have seen the transaction reach consensus yet.
pub const RECEIPT_PRECHECK: Classifier = Classifier {
    ok: &[Status::Ok],
    retriable: &[
        Status::Busy,
        Status::Unknown,
        Status::ReceiptNotFound,
        Status::RecordNotFound,
        Status::PlatformNotActive,
    ],
    otherwise: Disposition::Terminal,
};

/// Consensus status carried by a receipt. The listed codes mean "still
/// pending"; anything else is a final verdict, good or bad.
pub const RECEIPT_CONSENSUS: Classifier = Classifier {
    ok: &[],
    retriable: &[
        Status::Unknown,
        Status::Ok,
        Status::Busy,
        Status::ReceiptNotFound,
        Status::RecordNotFound,
    ],
    otherwise: Disposition::Success,
};
