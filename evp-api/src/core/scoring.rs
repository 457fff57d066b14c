//! Scoring aggregator
//!
//! Computes a contractor's final score from the submission set of one
//! (session, contractor, cycle) tuple. Pure function of the current rows;
//! re-invoked idempotently on every submission change.

use evp_common::{FormKind, SubmissionStatus};

use crate::db::submissions::SubmissionRow;

const FRM32_WEIGHT: f64 = 0.5;
const FRM35_WEIGHT: f64 = 0.5;

/// The inputs the aggregator needs from one submission
#[derive(Debug, Clone, Copy)]
pub struct FormScore {
    pub form_id: FormKind,
    pub status: SubmissionStatus,
    pub final_score: Option<f64>,
}

impl From<&SubmissionRow> for FormScore {
    fn from(row: &SubmissionRow) -> Self {
        FormScore {
            form_id: row.form_id,
            status: row.status,
            final_score: row.final_score,
        }
    }
}

/// Weighted final score: 0.5 x frm32 + 0.5 x frm35, defined only when both
/// forms are completed with non-null scores. frm33/frm34 are evaluative
/// inputs to the supervisor workflow and never contribute.
pub fn aggregate_final_score(forms: &[FormScore]) -> Option<f64> {
    let completed_score = |kind: FormKind| {
        forms
            .iter()
            .find(|f| f.form_id == kind && f.status == SubmissionStatus::Completed)
            .and_then(|f| f.final_score)
    };

    let frm32 = completed_score(FormKind::Frm32)?;
    let frm35 = completed_score(FormKind::Frm35)?;
    Some(FRM32_WEIGHT * frm32 + FRM35_WEIGHT * frm35)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(form_id: FormKind, status: SubmissionStatus, final_score: Option<f64>) -> FormScore {
        FormScore {
            form_id,
            status,
            final_score,
        }
    }

    #[test]
    fn both_ends_completed_yields_weighted_half_sum() {
        let forms = [
            form(FormKind::Frm32, SubmissionStatus::Completed, Some(80.0)),
            form(FormKind::Frm33, SubmissionStatus::Pending, None),
            form(FormKind::Frm34, SubmissionStatus::Pending, None),
            form(FormKind::Frm35, SubmissionStatus::Completed, Some(90.0)),
        ];
        assert_eq!(aggregate_final_score(&forms), Some(85.0));
    }

    #[test]
    fn undefined_until_frm35_completes() {
        let forms = [
            form(FormKind::Frm32, SubmissionStatus::Completed, Some(80.0)),
            form(FormKind::Frm33, SubmissionStatus::Completed, Some(70.0)),
            form(FormKind::Frm34, SubmissionStatus::Completed, Some(60.0)),
            form(FormKind::Frm35, SubmissionStatus::Submitted, None),
        ];
        assert_eq!(aggregate_final_score(&forms), None);
    }

    #[test]
    fn undefined_when_frm32_missing_score() {
        // completed status but no score recorded: aggregate stays undefined
        let forms = [
            form(FormKind::Frm32, SubmissionStatus::Completed, None),
            form(FormKind::Frm35, SubmissionStatus::Completed, Some(90.0)),
        ];
        assert_eq!(aggregate_final_score(&forms), None);
    }

    #[test]
    fn intermediate_forms_never_contribute() {
        let forms = [
            form(FormKind::Frm32, SubmissionStatus::Completed, Some(100.0)),
            form(FormKind::Frm33, SubmissionStatus::Completed, Some(0.0)),
            form(FormKind::Frm34, SubmissionStatus::Completed, Some(0.0)),
            form(FormKind::Frm35, SubmissionStatus::Completed, Some(100.0)),
        ];
        assert_eq!(aggregate_final_score(&forms), Some(100.0));
    }

    #[test]
    fn empty_set_is_undefined_not_zero() {
        assert_eq!(aggregate_final_score(&[]), None);
    }

    #[test]
    fn repeated_invocation_is_stable() {
        let forms = [
            form(FormKind::Frm32, SubmissionStatus::Completed, Some(80.0)),
            form(FormKind::Frm35, SubmissionStatus::Completed, Some(90.0)),
        ];
        let first = aggregate_final_score(&forms);
        for _ in 0..10 {
            assert_eq!(aggregate_final_score(&forms), first);
        }
    }
}
