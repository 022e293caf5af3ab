//! Outbound email via AWS SES. Rendering is kept separate from sending
//! so the templates can be checked without a provider in the loop.

use crate::error::ApiError;
use crate::types::{RegistrationNotification, SendReceipt};
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;

fn dash_if_missing(value: &Option<String>) -> &str {
    value.as_deref().filter(|s| !s.is_empty()).unwrap_or("-")
}

/// Applicant-supplied fields go into HTML bodies; markup in them must
/// render inert.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Management notice about a fresh registration, with the two action
/// buttons.
pub fn render_pending_approval_html(
    applicant: &RegistrationNotification,
    approve_link: &str,
    decline_link: &str,
) -> String {
    format!(
        r#"<h2>New User Registration</h2>
<p><strong>Name:</strong> {}</p>
<p><strong>Email:</strong> {}</p>
<p><strong>Phone:</strong> {}</p>
<p><strong>Role:</strong> {}</p>
<p><strong>Department:</strong> {}</p>
<p>
  <a href="{}" style="padding:10px 16px;background:#16a34a;color:#fff;text-decoration:none;border-radius:6px;margin-right:8px">Approve</a>
  <a href="{}" style="padding:10px 16px;background:#dc2626;color:#fff;text-decoration:none;border-radius:6px;">Decline</a>
</p>"#,
        escape_html(dash_if_missing(&applicant.full_name)),
        escape_html(dash_if_missing(&applicant.email)),
        escape_html(dash_if_missing(&applicant.phone_number)),
        escape_html(dash_if_missing(&applicant.role)),
        escape_html(dash_if_missing(&applicant.department)),
        approve_link,
        decline_link,
    )
}

pub fn render_pending_approval_text(
    applicant: &RegistrationNotification,
    approve_link: &str,
    decline_link: &str,
) -> String {
    format!(
        "New User Registration\n\nName: {}\nEmail: {}\nPhone: {}\nRole: {}\nDepartment: {}\n\nApprove: {}\nDecline: {}\n",
        dash_if_missing(&applicant.full_name),
        dash_if_missing(&applicant.email),
        dash_if_missing(&applicant.phone_number),
        dash_if_missing(&applicant.role),
        dash_if_missing(&applicant.department),
        approve_link,
        decline_link,
    )
}

pub fn render_approved_html(full_name: &str) -> String {
    format!(
        "<p>Hello {},</p><p>Your account has been approved. You can now access the platform.</p>",
        escape_html(full_name)
    )
}

pub fn render_declined_html(full_name: &str) -> String {
    format!(
        "<p>Hello {},</p><p>We are sorry to inform you that your registration has been declined.</p>",
        escape_html(full_name)
    )
}

async fn send(
    ses_client: &SesClient,
    from: &str,
    to: &str,
    subject: &str,
    html_body: &str,
    text_body: Option<&str>,
) -> Result<SendReceipt, ApiError> {
    let destination = Destination::builder().to_addresses(to).build();

    let subject = Content::builder()
        .data(subject)
        .charset("UTF-8")
        .build()
        .map_err(|e| ApiError::upstream("Failed to build subject", e))?;

    let html_content = Content::builder()
        .data(html_body)
        .charset("UTF-8")
        .build()
        .map_err(|e| ApiError::upstream("Failed to build HTML content", e))?;

    let mut body = Body::builder().html(html_content);
    if let Some(text) = text_body {
        let text_content = Content::builder()
            .data(text)
            .charset("UTF-8")
            .build()
            .map_err(|e| ApiError::upstream("Failed to build text content", e))?;
        body = body.text(text_content);
    }

    let message = Message::builder()
        .subject(subject)
        .body(body.build())
        .build();

    let email_content = EmailContent::builder().simple(message).build();

    let output = ses_client
        .send_email()
        .from_email_address(from)
        .destination(destination)
        .content(email_content)
        .send()
        .await
        .map_err(|e| ApiError::upstream("Failed to send email", e))?;

    Ok(SendReceipt {
        message_id: output.message_id().map(|s| s.to_string()),
    })
}

pub async fn send_pending_approval_email(
    ses_client: &SesClient,
    from: &str,
    management_email: &str,
    applicant: &RegistrationNotification,
    approve_link: &str,
    decline_link: &str,
) -> Result<SendReceipt, ApiError> {
    send(
        ses_client,
        from,
        management_email,
        "New registration pending approval",
        &render_pending_approval_html(applicant, approve_link, decline_link),
        Some(&render_pending_approval_text(
            applicant,
            approve_link,
            decline_link,
        )),
    )
    .await
}

pub async fn send_approved_email(
    ses_client: &SesClient,
    from: &str,
    to: &str,
    full_name: &str,
) -> Result<SendReceipt, ApiError> {
    send(
        ses_client,
        from,
        to,
        "Your account is approved",
        &render_approved_html(full_name),
        None,
    )
    .await
}

pub async fn send_declined_email(
    ses_client: &SesClient,
    from: &str,
    to: &str,
    full_name: &str,
) -> Result<SendReceipt, ApiError> {
    send(
        ses_client,
        from,
        to,
        "Your registration was declined",
        &render_declined_html(full_name),
        None,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_notification() -> RegistrationNotification {
        serde_json::from_str(
            r#"{
                "user_id": "u1",
                "full_name": "Jane Doe",
                "email": "jane@x.com",
                "role": "member",
                "department": "IT",
                "phone_number": "+20100000000"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn pending_email_carries_applicant_details_and_both_links() {
        let approve = "https://api.example.org/registration-approval?action=approve&user_id=u1&token=t1";
        let decline = "https://api.example.org/registration-approval?action=decline&user_id=u1&token=t2";
        let html = render_pending_approval_html(&full_notification(), approve, decline);

        assert!(html.contains("Jane Doe"));
        assert!(html.contains("jane@x.com"));
        assert!(html.contains(approve));
        assert!(html.contains(decline));
        assert_eq!(html.matches("user_id=u1").count(), 2);
    }

    #[test]
    fn absent_optionals_render_as_dash() {
        let applicant: RegistrationNotification =
            serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        let html = render_pending_approval_html(&applicant, "a", "d");
        assert!(html.contains("<strong>Phone:</strong> -"));
        assert!(html.contains("<strong>Department:</strong> -"));
        assert!(html.contains("<strong>Name:</strong> -"));
    }

    #[test]
    fn applicant_markup_is_escaped_in_html_bodies() {
        let applicant: RegistrationNotification = serde_json::from_str(
            r#"{"user_id":"u1","full_name":"<script>alert(1)</script>","email":"a@x.com\" onmouseover=\"x()"}"#,
        )
        .unwrap();
        let html = render_pending_approval_html(&applicant, "a", "d");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&quot;"));

        let outcome = render_declined_html("<b>Jane</b>");
        assert!(!outcome.contains("<b>"));
        assert!(outcome.contains("&lt;b&gt;Jane&lt;/b&gt;"));
    }

    #[test]
    fn outcome_emails_greet_by_name() {
        assert!(render_approved_html("Jane Doe").contains("Hello Jane Doe,"));
        assert!(render_declined_html("Jane Doe").contains("Hello Jane Doe,"));
        assert!(render_declined_html("Jane Doe").contains("declined"));
    }
}
