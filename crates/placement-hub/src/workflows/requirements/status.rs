use super::domain::RequirementStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusTransitionError {
    #[error("requirement is {from} and cannot move to {to}")]
    NotAllowed {
        from: &'static str,
        to: &'static str,
    },
    #[error("a reason is required to reject a requirement")]
    MissingReason,
    #[error("requirement is {0} and cannot be forwarded")]
    NotForwardable(&'static str),
}

impl RequirementStatus {
    /// Position along the forward path. `Rejected` sits outside of it.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Draft => Some(0),
            Self::Submitted => Some(1),
            Self::UnderReview => Some(2),
            Self::Forwarded => Some(3),
            Self::Accepted => Some(4),
            Self::ClientReview => Some(5),
            Self::Completed => Some(6),
            Self::Rejected => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    pub fn can_transition_to(self, next: RequirementStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(_), None) => self != Self::Draft,
            (Some(current), Some(target)) => target > current,
            (None, _) => false,
        }
    }

    pub const fn is_forwardable(self) -> bool {
        matches!(
            self,
            Self::Submitted | Self::UnderReview | Self::Forwarded | Self::Accepted | Self::ClientReview
        )
    }

    /// Status after a successful forward; later statuses survive re-forwarding.
    pub const fn after_forward(self) -> Self {
        match self {
            Self::Submitted | Self::UnderReview => Self::Forwarded,
            other => other,
        }
    }
}

/// Validate an operator-requested status change and normalise the rejection reason.
pub fn check_transition(
    from: RequirementStatus,
    to: RequirementStatus,
    reason: Option<&str>,
) -> Result<Option<String>, StatusTransitionError> {
    if !from.can_transition_to(to) {
        return Err(StatusTransitionError::NotAllowed {
            from: from.label(),
            to: to.label(),
        });
    }

    if to == RequirementStatus::Rejected {
        let reason = reason
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(StatusTransitionError::MissingReason)?;
        return Ok(Some(reason.to_string()));
    }

    Ok(None)
}
