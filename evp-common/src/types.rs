//! Domain vocabulary for the evaluation process
//!
//! Form kinds, lifecycle statuses, notification kinds, and role tiers.
//! All enums are stored as TEXT in the database and serialized with the
//! same snake_case spelling on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Role tiers, low number = high privilege.
pub mod role {
    pub const SUPER_ADMIN: i64 = 1;
    pub const COMPANY_ADMIN: i64 = 2;
    pub const HSE_SPECIALIST: i64 = 3;
    pub const CONTRACTOR_ADMIN: i64 = 4;
    pub const SUPERVISOR: i64 = 5;

    /// Admin = super admin, company admin, or HSE specialist
    pub fn is_admin(role_id: i64) -> bool {
        (SUPER_ADMIN..=HSE_SPECIALIST).contains(&role_id)
    }
}

/// The four ordered assessment stages of an evaluation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FormKind {
    Frm32,
    Frm33,
    Frm34,
    Frm35,
}

impl FormKind {
    /// All form kinds in workflow order
    pub const ALL: [FormKind; 4] = [
        FormKind::Frm32,
        FormKind::Frm33,
        FormKind::Frm34,
        FormKind::Frm35,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::Frm32 => "frm32",
            FormKind::Frm33 => "frm33",
            FormKind::Frm34 => "frm34",
            FormKind::Frm35 => "frm35",
        }
    }

    /// Next form in the sequence, None after frm35
    pub fn next(&self) -> Option<FormKind> {
        match self {
            FormKind::Frm32 => Some(FormKind::Frm33),
            FormKind::Frm33 => Some(FormKind::Frm34),
            FormKind::Frm34 => Some(FormKind::Frm35),
            FormKind::Frm35 => None,
        }
    }

    /// Role tier expected to fill this form.
    ///
    /// frm32 is the contractor self-assessment; frm33-35 are supervisor
    /// evaluations. Enforced in-process at submission intake.
    pub fn expected_submitter_tier(&self) -> i64 {
        match self {
            FormKind::Frm32 => role::CONTRACTOR_ADMIN,
            FormKind::Frm33 | FormKind::Frm34 | FormKind::Frm35 => role::SUPERVISOR,
        }
    }

    /// Enrollment status reached when this form completes (and the full
    /// set is not yet complete)
    pub fn completed_status(&self) -> EnrollmentStatus {
        match self {
            FormKind::Frm32 => EnrollmentStatus::Frm32Completed,
            FormKind::Frm33 => EnrollmentStatus::Frm33Completed,
            FormKind::Frm34 => EnrollmentStatus::Frm34Completed,
            FormKind::Frm35 => EnrollmentStatus::Frm35Completed,
        }
    }

    /// Notification kind inviting someone to fill this form
    pub fn invite_kind(&self) -> NotificationKind {
        match self {
            FormKind::Frm32 => NotificationKind::Frm32Invite,
            FormKind::Frm33 => NotificationKind::Frm33Invite,
            FormKind::Frm34 => NotificationKind::Frm34Invite,
            FormKind::Frm35 => NotificationKind::Frm35Invite,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frm32" => Ok(FormKind::Frm32),
            "frm33" => Ok(FormKind::Frm33),
            "frm34" => Ok(FormKind::Frm34),
            "frm35" => Ok(FormKind::Frm35),
            other => Err(Error::InvalidInput(format!("unknown form kind: {other}"))),
        }
    }
}

/// Session lifecycle: active is initial, completed/cancelled are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-contractor progress within a session cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Frm32Sent,
    Frm32Completed,
    Frm33Completed,
    Frm34Completed,
    Frm35Completed,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Frm32Sent => "frm32_sent",
            EnrollmentStatus::Frm32Completed => "frm32_completed",
            EnrollmentStatus::Frm33Completed => "frm33_completed",
            EnrollmentStatus::Frm34Completed => "frm34_completed",
            EnrollmentStatus::Frm35Completed => "frm35_completed",
            EnrollmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form submission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Submitted,
    Scored,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Scored => "scored",
            SubmissionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    Frm32Invite,
    Frm33Invite,
    Frm34Invite,
    Frm35Invite,
    ProcessComplete,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Frm32Invite => "frm32_invite",
            NotificationKind::Frm33Invite => "frm33_invite",
            NotificationKind::Frm34Invite => "frm34_invite",
            NotificationKind::Frm35Invite => "frm35_invite",
            NotificationKind::ProcessComplete => "process_complete",
            NotificationKind::Reminder => "reminder",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivery lifecycle, advanced only by the delivery collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Bounced,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Bounced => "bounced",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_kind_sequence() {
        assert_eq!(FormKind::Frm32.next(), Some(FormKind::Frm33));
        assert_eq!(FormKind::Frm33.next(), Some(FormKind::Frm34));
        assert_eq!(FormKind::Frm34.next(), Some(FormKind::Frm35));
        assert_eq!(FormKind::Frm35.next(), None);
    }

    #[test]
    fn form_kind_round_trip() {
        for kind in FormKind::ALL {
            assert_eq!(kind.as_str().parse::<FormKind>().unwrap(), kind);
        }
        assert!("frm99".parse::<FormKind>().is_err());
    }

    #[test]
    fn admin_tier_boundary() {
        assert!(role::is_admin(role::SUPER_ADMIN));
        assert!(role::is_admin(role::HSE_SPECIALIST));
        assert!(!role::is_admin(role::CONTRACTOR_ADMIN));
        assert!(!role::is_admin(role::SUPERVISOR));
    }

    #[test]
    fn submitter_roles() {
        assert_eq!(
            FormKind::Frm32.expected_submitter_tier(),
            role::CONTRACTOR_ADMIN
        );
        for kind in [FormKind::Frm33, FormKind::Frm34, FormKind::Frm35] {
            assert_eq!(kind.expected_submitter_tier(), role::SUPERVISOR);
        }
    }

    #[test]
    fn terminal_session_states() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
    }
}
