use crate::address::Address;
use thiserror::Error;

/// Failures reported by stores, views and authorities.
///
/// Misuse that the types cannot rule out is reported here rather than
/// silently ignored; lookups that miss return `None` instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("map is frozen")]
    Frozen,
    #[error("partial copy is not supported (requested {requested} of {len})")]
    PartialCopy { requested: usize, len: usize },
    #[error("candidate rejected: {0}")]
    Rejected(String),
    #[error("value at {address} does not belong to this master set")]
    Foreign { address: Address },
    #[error("plain form: {0}")]
    Plain(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
