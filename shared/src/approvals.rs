//! Approval records and signed decision links.
//!
//! Each pending registration gets one record (`PK = APPROVAL#<id>`,
//! `SK = METADATA`) when management is notified. The approve/decline
//! links in that email carry an HMAC token bound to the user, the
//! action, and the record's expiry. A link only works for the exact
//! decision it was issued for, and only while the record is pending.

use crate::error::ApiError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const APPROVAL_SK: &str = "METADATA";
const APPROVAL_TTL_DAYS: i64 = 7;

fn approval_pk(user_id: &str) -> String {
    format!("APPROVAL#{}", user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Approve,
    Decline,
}

impl DecisionAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(DecisionAction::Approve),
            "decline" => Some(DecisionAction::Decline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Approve => "approve",
            DecisionAction::Decline => "decline",
        }
    }

    fn decided_status(&self) -> &'static str {
        match self {
            DecisionAction::Approve => "approved",
            DecisionAction::Decline => "declined",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApprovalRecord {
    pub user_id: String,
    pub status: String, // pending | approved | declined
    pub requested_at: String,
    pub expires_at: String,
}

/// Sign a decision token for one (user, action, expiry) triple.
pub fn sign_decision_token(
    secret: &str,
    user_id: &str,
    action: DecisionAction,
    expires_at: &str,
) -> String {
    let payload = format!("{}:{}:{}", user_id, action.as_str(), expires_at);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Check a presented token against the stored record. Order matters:
/// a terminal record wins over a bad token so a double-click on an
/// already-used link reads as "already processed", not "forged".
pub fn verify_decision_token(
    record: &ApprovalRecord,
    secret: &str,
    action: DecisionAction,
    token: &str,
) -> Result<(), ApiError> {
    if record.status != "pending" {
        return Err(ApiError::Conflict(format!(
            "Registration for user {} was already {}.",
            record.user_id, record.status
        )));
    }

    let expiry = DateTime::parse_from_rfc3339(&record.expires_at)
        .map_err(|_| ApiError::Upstream("Malformed expiry on approval record".to_string()))?;
    if expiry < Utc::now() {
        return Err(ApiError::Forbidden(
            "This approval link has expired.".to_string(),
        ));
    }

    let payload = format!(
        "{}:{}:{}",
        record.user_id,
        action.as_str(),
        record.expires_at
    );
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());

    let presented = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| ApiError::Forbidden("This approval link is not valid.".to_string()))?;
    mac.verify_slice(&presented)
        .map_err(|_| ApiError::Forbidden("This approval link is not valid.".to_string()))?;

    Ok(())
}

/// Action link embedded in the management email. The user id is
/// percent-encoded; an id carrying `&` or `=` must not be able to
/// splice extra parameters into the query string. The token is base64
/// url-safe and needs no escaping.
pub fn build_decision_link(
    base_url: &str,
    user_id: &str,
    action: DecisionAction,
    token: &str,
) -> String {
    format!(
        "{}/registration-approval?action={}&user_id={}&token={}",
        base_url.trim_end_matches('/'),
        action.as_str(),
        urlencoding::encode(user_id),
        token
    )
}

/// Create (or refresh) the pending record for a user. A repeated POST
/// re-issues links with a fresh expiry; a decided record stays decided.
pub async fn create_approval(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<ApprovalRecord, ApiError> {
    let now = Utc::now();
    let expires_at = now + chrono::Duration::days(APPROVAL_TTL_DAYS);

    let record = ApprovalRecord {
        user_id: user_id.to_string(),
        status: "pending".to_string(),
        requested_at: now.to_rfc3339(),
        expires_at: expires_at.to_rfc3339(),
    };

    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(approval_pk(user_id)))
        .item("SK", AttributeValue::S(APPROVAL_SK.to_string()))
        .item("user_id", AttributeValue::S(record.user_id.clone()))
        .item("status", AttributeValue::S(record.status.clone()))
        .item(
            "requested_at",
            AttributeValue::S(record.requested_at.clone()),
        )
        .item("expires_at", AttributeValue::S(record.expires_at.clone()))
        .condition_expression("attribute_not_exists(PK) OR #status = :pending")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(":pending", AttributeValue::S("pending".to_string()))
        .send()
        .await
        .map_err(|e| {
            let msg = format!("{:?}", e);
            if msg.contains("ConditionalCheckFailedException") {
                ApiError::Conflict(format!(
                    "Registration for user {} was already decided.",
                    user_id
                ))
            } else {
                ApiError::upstream("Failed to store approval record", e)
            }
        })?;

    Ok(record)
}

pub async fn load_approval(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<ApprovalRecord>, ApiError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(approval_pk(user_id)))
        .key("SK", AttributeValue::S(APPROVAL_SK.to_string()))
        .send()
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch approval record", e))?;

    let Some(item) = result.item() else {
        return Ok(None);
    };

    let get_s = |key: &str| {
        item.get(key)
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default()
    };

    Ok(Some(ApprovalRecord {
        user_id: get_s("user_id"),
        status: get_s("status"),
        requested_at: get_s("requested_at"),
        expires_at: get_s("expires_at"),
    }))
}

/// Flip the record to its terminal state. Conditional on it still being
/// pending, so two racing clicks can only land one decision.
pub async fn mark_decided(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    action: DecisionAction,
) -> Result<(), ApiError> {
    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(approval_pk(user_id)))
        .key("SK", AttributeValue::S(APPROVAL_SK.to_string()))
        .update_expression("SET #status = :decided, decided_at = :now")
        .condition_expression("#status = :pending")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(
            ":decided",
            AttributeValue::S(action.decided_status().to_string()),
        )
        .expression_attribute_values(":pending", AttributeValue::S("pending".to_string()))
        .expression_attribute_values(":now", AttributeValue::S(Utc::now().to_rfc3339()))
        .send()
        .await
        .map_err(|e| {
            let msg = format!("{:?}", e);
            if msg.contains("ConditionalCheckFailedException") {
                ApiError::Conflict(format!(
                    "Registration for user {} was already decided.",
                    user_id
                ))
            } else {
                ApiError::upstream("Failed to update approval record", e)
            }
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    fn pending_record(expires_at: &str) -> ApprovalRecord {
        ApprovalRecord {
            user_id: "u1".to_string(),
            status: "pending".to_string(),
            requested_at: Utc::now().to_rfc3339(),
            expires_at: expires_at.to_string(),
        }
    }

    fn future_expiry() -> String {
        (Utc::now() + chrono::Duration::days(1)).to_rfc3339()
    }

    #[test]
    fn valid_token_verifies() {
        let record = pending_record(&future_expiry());
        let token =
            sign_decision_token(SECRET, "u1", DecisionAction::Approve, &record.expires_at);
        assert!(
            verify_decision_token(&record, SECRET, DecisionAction::Approve, &token).is_ok()
        );
    }

    #[test]
    fn token_is_bound_to_action() {
        let record = pending_record(&future_expiry());
        let token =
            sign_decision_token(SECRET, "u1", DecisionAction::Approve, &record.expires_at);
        let err = verify_decision_token(&record, SECRET, DecisionAction::Decline, &token)
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn token_is_bound_to_user() {
        let record = pending_record(&future_expiry());
        let token =
            sign_decision_token(SECRET, "u2", DecisionAction::Approve, &record.expires_at);
        let err = verify_decision_token(&record, SECRET, DecisionAction::Approve, &token)
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let record = pending_record(&future_expiry());
        let mut token =
            sign_decision_token(SECRET, "u1", DecisionAction::Approve, &record.expires_at);
        token.push('A');
        let err = verify_decision_token(&record, SECRET, DecisionAction::Approve, &token)
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn expired_record_is_rejected() {
        let past = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        let record = pending_record(&past);
        let token = sign_decision_token(SECRET, "u1", DecisionAction::Approve, &past);
        let err = verify_decision_token(&record, SECRET, DecisionAction::Approve, &token)
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn decided_record_reports_conflict_even_with_valid_token() {
        let mut record = pending_record(&future_expiry());
        let token =
            sign_decision_token(SECRET, "u1", DecisionAction::Decline, &record.expires_at);
        record.status = "declined".to_string();
        let err = verify_decision_token(&record, SECRET, DecisionAction::Decline, &token)
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn decision_links_carry_action_user_and_token() {
        let link = build_decision_link(
            "https://api.example.org/",
            "u1",
            DecisionAction::Approve,
            "tok123",
        );
        assert_eq!(
            link,
            "https://api.example.org/registration-approval?action=approve&user_id=u1&token=tok123"
        );
    }

    #[test]
    fn decision_link_percent_encodes_the_user_id() {
        let link = build_decision_link(
            "https://api.example.org",
            "u1&user_id=u2",
            DecisionAction::Approve,
            "tok",
        );
        assert_eq!(
            link,
            "https://api.example.org/registration-approval?action=approve&user_id=u1%26user_id%3Du2&token=tok"
        );
        // Exactly one user_id parameter must survive.
        assert_eq!(link.matches("&user_id=").count(), 1);
    }

    #[test]
    fn action_parse_rejects_unknown_values() {
        assert_eq!(DecisionAction::parse("approve"), Some(DecisionAction::Approve));
        assert_eq!(DecisionAction::parse("decline"), Some(DecisionAction::Decline));
        assert_eq!(DecisionAction::parse("Approve"), None);
        assert_eq!(DecisionAction::parse(""), None);
        assert_eq!(DecisionAction::parse("delete"), None);
    }
}
