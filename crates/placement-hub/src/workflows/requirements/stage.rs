//! Onboarding pipeline for a labour assignment.
//!
//! Each stage only advances through the action listed for it in [`TRANSITIONS`]; anything
//! else is rejected so an assignment can never skip a milestone.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    OfferLetterSign,
    VisaApplying,
    QvcPayment,
    ContractSign,
    MedicalStatus,
    Fingerprint,
    VisaPrinting,
    ReadyToTravel,
    TravelConfirmation,
    ArrivalConfirmation,
    Deployed,
}

impl Stage {
    pub const fn ordered() -> [Self; 11] {
        [
            Self::OfferLetterSign,
            Self::VisaApplying,
            Self::QvcPayment,
            Self::ContractSign,
            Self::MedicalStatus,
            Self::Fingerprint,
            Self::VisaPrinting,
            Self::ReadyToTravel,
            Self::TravelConfirmation,
            Self::ArrivalConfirmation,
            Self::Deployed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::OfferLetterSign => "Offer Letter Sign",
            Self::VisaApplying => "Visa Applying",
            Self::QvcPayment => "QVC Payment",
            Self::ContractSign => "Contract Sign",
            Self::MedicalStatus => "Medical Status",
            Self::Fingerprint => "Fingerprint",
            Self::VisaPrinting => "Visa Printing",
            Self::ReadyToTravel => "Ready to Travel",
            Self::TravelConfirmation => "Travel Confirmation",
            Self::ArrivalConfirmation => "Arrival Confirmation",
            Self::Deployed => "Deployed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deployed)
    }

    /// Actions that may be invoked while the assignment sits in this stage.
    pub fn available_actions(self) -> Vec<StageAction> {
        TRANSITIONS
            .iter()
            .filter(|transition| transition.from == self)
            .map(|transition| transition.action)
            .collect()
    }

    /// Resolve the stage reached by applying `action`.
    pub fn apply(self, action: StageAction) -> Result<Stage, StageTransitionError> {
        if self.is_terminal() {
            return Err(StageTransitionError::AlreadyDeployed);
        }

        TRANSITIONS
            .iter()
            .find(|transition| transition.from == self && transition.action == action)
            .map(|transition| transition.to)
            .ok_or(StageTransitionError::OutOfOrder {
                action: action.endpoint(),
                stage: self.label(),
            })
    }
}

/// Named operations exposed per assignment, one endpoint each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageAction {
    UploadOfferLetter,
    VerifyOfferLetter,
    MarkVisaApplied,
    MarkQvcPaid,
    SignContract,
    MarkMedicalCleared,
    MarkFingerprintDone,
    UploadVisa,
    ScheduleTravel,
    ConfirmTravel,
    ConfirmArrival,
}

impl StageAction {
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::UploadOfferLetter => "upload-offer-letter",
            Self::VerifyOfferLetter => "verify-offer-letter",
            Self::MarkVisaApplied => "mark-visa-applied",
            Self::MarkQvcPaid => "mark-qvc-paid",
            Self::SignContract => "sign-contract",
            Self::MarkMedicalCleared => "mark-medical-cleared",
            Self::MarkFingerprintDone => "mark-fingerprint-done",
            Self::UploadVisa => "upload-visa",
            Self::ScheduleTravel => "schedule-travel",
            Self::ConfirmTravel => "confirm-travel",
            Self::ConfirmArrival => "confirm-arrival",
        }
    }

    pub fn from_endpoint(raw: &str) -> Option<Self> {
        [
            Self::UploadOfferLetter,
            Self::VerifyOfferLetter,
            Self::MarkVisaApplied,
            Self::MarkQvcPaid,
            Self::SignContract,
            Self::MarkMedicalCleared,
            Self::MarkFingerprintDone,
            Self::UploadVisa,
            Self::ScheduleTravel,
            Self::ConfirmTravel,
            Self::ConfirmArrival,
        ]
        .into_iter()
        .find(|action| action.endpoint() == raw)
    }

    /// Offer-letter actions are gated on the client's contract terms.
    pub const fn requires_offer_letter_details(self) -> bool {
        matches!(self, Self::UploadOfferLetter | Self::VerifyOfferLetter)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StageTransition {
    pub from: Stage,
    pub action: StageAction,
    pub to: Stage,
}

pub const TRANSITIONS: [StageTransition; 11] = [
    StageTransition {
        from: Stage::OfferLetterSign,
        action: StageAction::UploadOfferLetter,
        to: Stage::OfferLetterSign,
    },
    StageTransition {
        from: Stage::OfferLetterSign,
        action: StageAction::VerifyOfferLetter,
        to: Stage::VisaApplying,
    },
    StageTransition {
        from: Stage::VisaApplying,
        action: StageAction::MarkVisaApplied,
        to: Stage::QvcPayment,
    },
    StageTransition {
        from: Stage::QvcPayment,
        action: StageAction::MarkQvcPaid,
        to: Stage::ContractSign,
    },
    StageTransition {
        from: Stage::ContractSign,
        action: StageAction::SignContract,
        to: Stage::MedicalStatus,
    },
    StageTransition {
        from: Stage::MedicalStatus,
        action: StageAction::MarkMedicalCleared,
        to: Stage::Fingerprint,
    },
    StageTransition {
        from: Stage::Fingerprint,
        action: StageAction::MarkFingerprintDone,
        to: Stage::VisaPrinting,
    },
    StageTransition {
        from: Stage::VisaPrinting,
        action: StageAction::UploadVisa,
        to: Stage::ReadyToTravel,
    },
    StageTransition {
        from: Stage::ReadyToTravel,
        action: StageAction::ScheduleTravel,
        to: Stage::TravelConfirmation,
    },
    StageTransition {
        from: Stage::TravelConfirmation,
        action: StageAction::ConfirmTravel,
        to: Stage::ArrivalConfirmation,
    },
    StageTransition {
        from: Stage::ArrivalConfirmation,
        action: StageAction::ConfirmArrival,
        to: Stage::Deployed,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageTransitionError {
    #[error("'{action}' is not available while the assignment is at {stage}")]
    OutOfOrder {
        action: &'static str,
        stage: &'static str,
    },
    #[error("assignment is already deployed")]
    AlreadyDeployed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_stage_in_order() {
        let actions = [
            StageAction::VerifyOfferLetter,
            StageAction::MarkVisaApplied,
            StageAction::MarkQvcPaid,
            StageAction::SignContract,
            StageAction::MarkMedicalCleared,
            StageAction::MarkFingerprintDone,
            StageAction::UploadVisa,
            StageAction::ScheduleTravel,
            StageAction::ConfirmTravel,
            StageAction::ConfirmArrival,
        ];

        let mut stage = Stage::OfferLetterSign;
        let mut visited = vec![stage];
        for action in actions {
            let next = stage.apply(action).expect("transition allowed");
            assert!(next > stage, "{action:?} must move forward");
            stage = next;
            visited.push(stage);
        }

        assert_eq!(visited, Stage::ordered().to_vec());
        assert!(stage.is_terminal());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let err = Stage::VisaApplying
            .apply(StageAction::UploadVisa)
            .expect_err("cannot print a visa before applying");
        assert_eq!(
            err,
            StageTransitionError::OutOfOrder {
                action: "upload-visa",
                stage: "Visa Applying",
            }
        );
    }

    #[test]
    fn deployed_exposes_no_actions() {
        assert!(Stage::Deployed.available_actions().is_empty());
        assert_eq!(
            Stage::Deployed.apply(StageAction::ConfirmArrival),
            Err(StageTransitionError::AlreadyDeployed)
        );
    }

    #[test]
    fn offer_letter_upload_keeps_the_stage() {
        assert_eq!(
            Stage::OfferLetterSign.apply(StageAction::UploadOfferLetter),
            Ok(Stage::OfferLetterSign)
        );
        assert_eq!(
            Stage::OfferLetterSign.available_actions(),
            vec![StageAction::UploadOfferLetter, StageAction::VerifyOfferLetter]
        );
    }

    #[test]
    fn endpoints_round_trip_to_actions() {
        for transition in TRANSITIONS {
            let action = transition.action;
            assert_eq!(StageAction::from_endpoint(action.endpoint()), Some(action));
        }
        assert_eq!(StageAction::from_endpoint("teleport"), None);
    }
}
