//! Last-contact-date advancement
//!
//! Logging an interaction may move an analyst's last-contact-date
//! forward, never backward.

use chrono::NaiveDate;

/// Outcome of comparing a newly logged interaction date against the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactAdvance {
    /// Persist this date as the new last-contact-date
    Advance(NaiveDate),
    /// Leave the stored date alone
    NoOp,
}

impl ContactAdvance {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ContactAdvance::Advance(date) => Some(*date),
            ContactAdvance::NoOp => None,
        }
    }
}

/// Decides whether `candidate` should replace `current`.
///
/// An absent current date sorts before every real date. Equal dates still
/// advance, so the write is issued.
pub fn advance_if_newer(current: Option<NaiveDate>, candidate: NaiveDate) -> ContactAdvance {
    let current = current.unwrap_or(NaiveDate::MIN);
    if candidate >= current {
        ContactAdvance::Advance(candidate)
    } else {
        ContactAdvance::NoOp
    }
}
