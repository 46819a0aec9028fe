//! Messages passed along factor graph edges.
//!
//! A message is a [`GaussianState`] with the receiver's own contribution
//! already removed. It is stored as `Option` rather than a zeroed
//! placeholder: before the first round a variable or factor simply has not
//! heard from a given neighbor yet, and that absence should not contribute
//! information when folded into a belief or a relinearization point.

use std::collections::BTreeMap;

use gbp_gaussian::GaussianState;
use gbp_linalg::{Float, Vector};

use crate::id::{FactorId, VariableId};

#[derive(Debug, Clone)]
pub struct Message(Option<GaussianState>);

impl Message {
    #[must_use]
    pub fn new(state: GaussianState) -> Self {
        Self(Some(state))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    #[must_use]
    pub fn payload(&self) -> Option<&GaussianState> {
        self.0.as_ref()
    }

    /// The mean of the carried state, or `None` if the message is empty or
    /// its precision is not invertible. Used to pick a relinearization point
    /// from the previous round's incoming messages.
    #[must_use]
    pub fn mean(&self) -> Option<Vector<Float>> {
        self.0.as_ref().and_then(|s| s.to_moments().ok()).map(|(mean, _)| mean)
    }
}

/// Messages a variable has received, one per adjacent factor.
pub type VariableInbox = BTreeMap<FactorId, Message>;

/// Messages a factor has received, one per adjacent variable.
pub type FactorInbox = BTreeMap<VariableId, Message>;

/// Messages a factor is about to send, one per adjacent variable.
pub type FactorOutbox = BTreeMap<VariableId, Message>;
