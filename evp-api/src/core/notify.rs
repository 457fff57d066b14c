//! Notification rendering and enqueueing
//!
//! Renders invitation, reminder, and completion emails into notification
//! rows with status pending. Transmission belongs to the external mail
//! collaborator; it reports back through the delivery-status callback.

use sqlx::SqliteConnection;
use tracing::warn;

use evp_common::{FormKind, NotificationKind, NotificationStatus};

use crate::db::contractors::ContractorRow;
use crate::db::notifications::{self, NewNotification};
use crate::error::ApiResult;

/// Link into the external form-filling client
fn form_link(form_base_url: &str, form: FormKind, session_id: &str, contractor_id: &str, cycle: i64) -> String {
    match form {
        FormKind::Frm32 => format!(
            "{form_base_url}/?session={session_id}&contractor={contractor_id}"
        ),
        _ => format!(
            "{form_base_url}/{form}?session={session_id}&contractor={contractor_id}&cycle={cycle}"
        ),
    }
}

/// FRM32 invitation addressed to the contractor contact
pub fn frm32_invite(
    contractor: &ContractorRow,
    session_id: &str,
    custom_message: Option<&str>,
    form_base_url: &str,
) -> NewNotification {
    let link = form_link(form_base_url, FormKind::Frm32, session_id, &contractor.id, 1);
    let subject = "Evaluation Process - FRM32 Form".to_string();
    let body = format!(
        "Dear {person},\n\n\
         You have been invited to participate in the evaluation process for {name}.\n\n\
         Please fill out the FRM32 form:\n{link}\n\n\
         Session ID: {session_id}\n\n{extra}",
        person = contractor.contact_person,
        name = contractor.name,
        extra = custom_message.unwrap_or(""),
    );

    NewNotification {
        session_id: session_id.to_string(),
        contractor_id: Some(contractor.id.clone()),
        recipient_email: contractor.contact_email.clone(),
        recipient_name: Some(contractor.contact_person.clone()),
        notification_type: NotificationKind::Frm32Invite,
        form_id: Some(FormKind::Frm32),
        subject,
        body,
        status: NotificationStatus::Pending,
        error_message: None,
    }
}

/// Supervisor invitation for a follow-up form (frm33..frm35).
///
/// The recipient is the supervisor assigned on the contractor record. A
/// contractor without an assigned supervisor produces a row in failed
/// state so the missing assignment is auditable rather than silently
/// mailed to a placeholder.
pub fn supervisor_invite(
    contractor: &ContractorRow,
    session_id: &str,
    cycle: i64,
    form: FormKind,
    form_base_url: &str,
) -> NewNotification {
    let link = form_link(form_base_url, form, session_id, &contractor.id, cycle);
    let subject = format!("Evaluation Process - {} Form", form.as_str().to_uppercase());
    let body = format!(
        "Dear {supervisor},\n\n\
         The previous form in the evaluation process for {name} has been completed.\n\n\
         Please proceed with the {form_upper} evaluation:\n{link}\n\n\
         Session ID: {session_id}\nCycle: {cycle}\n",
        supervisor = contractor.supervisor_name.as_deref().unwrap_or("Supervisor"),
        name = contractor.name,
        form_upper = form.as_str().to_uppercase(),
    );

    match &contractor.supervisor_email {
        Some(email) => NewNotification {
            session_id: session_id.to_string(),
            contractor_id: Some(contractor.id.clone()),
            recipient_email: email.clone(),
            recipient_name: contractor.supervisor_name.clone(),
            notification_type: form.invite_kind(),
            form_id: Some(form),
            subject,
            body,
            status: NotificationStatus::Pending,
            error_message: None,
        },
        None => {
            warn!(
                contractor_id = %contractor.id,
                "no supervisor assigned; {} invite recorded as failed",
                form
            );
            NewNotification {
                session_id: session_id.to_string(),
                contractor_id: Some(contractor.id.clone()),
                recipient_email: String::new(),
                recipient_name: None,
                notification_type: form.invite_kind(),
                form_id: Some(form),
                subject,
                body,
                status: NotificationStatus::Failed,
                error_message: Some(format!(
                    "no supervisor assigned for contractor {}",
                    contractor.id
                )),
            }
        }
    }
}

/// Process-complete notice to the contractor contact
pub fn process_complete(contractor: &ContractorRow, session_id: &str) -> NewNotification {
    NewNotification {
        session_id: session_id.to_string(),
        contractor_id: Some(contractor.id.clone()),
        recipient_email: contractor.contact_email.clone(),
        recipient_name: Some(contractor.contact_person.clone()),
        notification_type: NotificationKind::ProcessComplete,
        form_id: None,
        subject: "Evaluation Process Complete".to_string(),
        body: format!(
            "Dear {person},\n\n\
             The evaluation process for {name} has been completed.\n\n\
             Session ID: {session_id}\n",
            person = contractor.contact_person,
            name = contractor.name,
        ),
        status: NotificationStatus::Pending,
        error_message: None,
    }
}

/// Admin-requested reminder for one outstanding form, addressed to the
/// form's expected filler
pub fn reminder(
    contractor: &ContractorRow,
    session_id: &str,
    cycle: i64,
    form: FormKind,
    form_base_url: &str,
) -> NewNotification {
    let link = form_link(form_base_url, form, session_id, &contractor.id, cycle);
    let (recipient_email, recipient_name) = match form {
        FormKind::Frm32 => (
            contractor.contact_email.clone(),
            Some(contractor.contact_person.clone()),
        ),
        _ => (
            contractor.supervisor_email.clone().unwrap_or_default(),
            contractor.supervisor_name.clone(),
        ),
    };

    let missing_recipient = recipient_email.is_empty();
    NewNotification {
        session_id: session_id.to_string(),
        contractor_id: Some(contractor.id.clone()),
        recipient_email,
        recipient_name,
        notification_type: NotificationKind::Reminder,
        form_id: Some(form),
        subject: format!(
            "Reminder: {} form awaiting completion",
            form.as_str().to_uppercase()
        ),
        body: format!(
            "This is a reminder that the {form_upper} form for {name} is still awaiting \
             completion.\n\n{link}\n\nSession ID: {session_id}\nCycle: {cycle}\n",
            form_upper = form.as_str().to_uppercase(),
            name = contractor.name,
        ),
        status: if missing_recipient {
            NotificationStatus::Failed
        } else {
            NotificationStatus::Pending
        },
        error_message: missing_recipient
            .then(|| format!("no supervisor assigned for contractor {}", contractor.id)),
    }
}

/// Enqueue a rendered notification
pub async fn enqueue(conn: &mut SqliteConnection, new: &NewNotification) -> ApiResult<String> {
    notifications::insert(conn, new).await
}
