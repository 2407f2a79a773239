//! Report delivery by email.

use tracing::{info, instrument};

use compintel_report::{attachment_filename, email_subject, render_email_html, render_html};
use compintel_shared::{
    CompintelError, EmailAttachment, EmailMessage, Notifier, Report, ReportId, ReportStore,
    Result,
};

/// Minimal shape check: `local@domain.tld`.
pub fn validate_email(address: &str) -> Result<()> {
    let address = address.trim();
    let valid = match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !address.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CompintelError::validation(format!(
            "invalid email address: {address:?}"
        )))
    }
}

/// The report email with the standalone HTML report attached.
pub fn build_email(report: &Report, to: &str) -> EmailMessage {
    EmailMessage {
        to: to.trim().to_string(),
        subject: email_subject(report),
        html: render_email_html(report),
        attachments: vec![EmailAttachment {
            filename: attachment_filename(report),
            content_type: "text/html".into(),
            content: render_html(report).into_bytes(),
        }],
    }
}

/// Send `report` to `to`, then record the delivery.
///
/// When `store` is given the stored report is marked sent as well. The
/// in-memory flag and recipient are updated only after everything succeeded.
#[instrument(skip_all, fields(report_id = %report.id, to = %to))]
pub async fn send_report(
    notifier: &dyn Notifier,
    store: Option<&dyn ReportStore>,
    report: &mut Report,
    to: &str,
) -> Result<()> {
    validate_email(to)?;

    let message = build_email(report, to);
    notifier.send(&message).await.map_err(|e| match e {
        CompintelError::Notify(_) => e,
        other => CompintelError::Notify(other.to_string()),
    })?;

    if let Some(store) = store {
        store
            .mark_sent(&report.id, to.trim())
            .await
            .map_err(|e| CompintelError::Persistence(e.to_string()))?;
    }

    report.report_sent = true;
    report.recipient_email = Some(to.trim().to_string());
    info!("report delivered");
    Ok(())
}

/// Load a stored report and send it.
pub async fn resend_stored(
    store: &dyn ReportStore,
    notifier: &dyn Notifier,
    id: &ReportId,
    to: &str,
) -> Result<Report> {
    let mut report = store
        .get(id)
        .await?
        .ok_or_else(|| CompintelError::validation(format!("report {id} not found")))?;
    send_report(notifier, Some(store), &mut report, to).await?;
    Ok(report)
}
