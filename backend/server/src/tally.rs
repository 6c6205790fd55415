//! # Tally Store
//!
//! In-memory poll state.
//!
//! Core purpose is to own the vote counts and the set of credentials that already voted.
//! Both live behind one lock so the membership test, the insertion and the increment are a
//! single critical section.
//!
//! ## Invariants
//!
//! - A credential id enters the voted set at most once and never leaves it
//! - `sum(counts) == |voted set|` whenever the lock is released
//! - Counts only grow, so a tally's total doubles as its version
use std::{collections::HashSet, fmt, str::FromStr};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollOption {
    A,
    B,
    C,
}

impl PollOption {
    pub const ALL: [PollOption; 3] = [PollOption::A, PollOption::B, PollOption::C];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PollOption::A => "A",
            PollOption::B => "B",
            PollOption::C => "C",
        }
    }
}

impl fmt::Display for PollOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollOption {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(PollOption::A),
            "B" => Ok(PollOption::B),
            "C" => Ok(PollOption::C),
            _ => Err(AppError::InvalidOption),
        }
    }
}

/// Point-in-time vote counts, serialized as `{"A":n,"B":n,"C":n}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "B")]
    pub b: u64,
    #[serde(rename = "C")]
    pub c: u64,
}

impl Tally {
    pub const fn get(&self, option: PollOption) -> u64 {
        match option {
            PollOption::A => self.a,
            PollOption::B => self.b,
            PollOption::C => self.c,
        }
    }

    pub const fn total(&self) -> u64 {
        self.a + self.b + self.c
    }

    /// True when no count in `self` is lower than in `earlier`.
    pub fn dominates(&self, earlier: &Tally) -> bool {
        PollOption::ALL
            .iter()
            .all(|&option| self.get(option) >= earlier.get(option))
    }

    fn increment(&mut self, option: PollOption) {
        match option {
            PollOption::A => self.a += 1,
            PollOption::B => self.b += 1,
            PollOption::C => self.c += 1,
        }
    }
}

#[derive(Default)]
struct Ledger {
    votes: Tally,
    voted: HashSet<Uuid>,
}

#[derive(Default)]
pub struct TallyStore {
    ledger: Mutex<Ledger>,
}

impl TallyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_snapshot(&self) -> Tally {
        self.ledger.lock().votes
    }

    pub fn has_voted(&self, credential_id: &Uuid) -> bool {
        self.ledger.lock().voted.contains(credential_id)
    }

    pub fn voter_count(&self) -> usize {
        self.ledger.lock().voted.len()
    }

    /// Sole mutation path. Voted state is checked before the option code, so a repeat voter
    /// sees `AlreadyVoted` even when the option is bogus.
    pub(crate) fn apply_vote(
        &self,
        credential_id: Uuid,
        option_code: &str,
    ) -> Result<(PollOption, Tally), AppError> {
        let mut ledger = self.ledger.lock();

        if ledger.voted.contains(&credential_id) {
            return Err(AppError::AlreadyVoted);
        }

        let option: PollOption = option_code.parse()?;

        ledger.voted.insert(credential_id);
        ledger.votes.increment(option);

        debug_assert_eq!(ledger.votes.total(), ledger.voted.len() as u64);

        Ok((option, ledger.votes))
    }
}
