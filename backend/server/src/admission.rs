//! # Admission Controller
//!
//! Single writer of the tally.
//!
//! Check order is identity, then voted state, then option code. The last two happen inside
//! the store's critical section. Publishing to the hub happens after the store lock is
//! released, using the tally the commit returned.
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    error::AppError,
    hub::BroadcastHub,
    identity::{Identity, IdentityIssuer},
    tally::{PollOption, Tally, TallyStore},
};

#[derive(Debug)]
pub struct Admitted {
    pub voter: Identity,
    pub option: PollOption,
    pub votes: Tally,
}

pub struct AdmissionController {
    issuer: Arc<IdentityIssuer>,
    store: Arc<TallyStore>,
    hub: Arc<BroadcastHub>,
}

impl AdmissionController {
    pub fn new(issuer: Arc<IdentityIssuer>, store: Arc<TallyStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { issuer, store, hub }
    }

    pub fn submit_vote(&self, credential: &str, option_code: &str) -> Result<Admitted, AppError> {
        let voter = self.issuer.verify(credential)?;

        let (option, votes) = self
            .store
            .apply_vote(voter.credential_id, option_code)
            .map_err(|e| {
                debug!(
                    "Rejected vote from {} ({}): {e}",
                    voter.display_name, voter.credential_id
                );
                e
            })?;

        info!(
            "{} ({}) voted {option}, {} votes total",
            voter.display_name,
            voter.credential_id,
            votes.total()
        );

        self.hub.publish(votes);

        Ok(Admitted {
            voter,
            option,
            votes,
        })
    }
}
