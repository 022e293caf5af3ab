use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use orgflow_shared::{
    accounts, approvals,
    approvals::DecisionAction,
    email,
    error::ApiError,
    http::{cors_preflight, error_json, error_text, json_response, method_not_allowed, text_response},
    profiles,
    types::{NotificationResponse, RegistrationNotification},
    AppState,
};
use std::env;
use std::sync::Arc;

const DEFAULT_SENDER: &str = "noreply@orgflow.app";

/// Main Lambda handler - one endpoint, two entry modes plus preflight
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    tracing::info!(
        "Registration approval invoked - Method: {} Path: {}",
        method,
        event.uri().path()
    );

    match method {
        &Method::OPTIONS => cors_preflight(),
        &Method::POST => handle_notify(&event, &state).await,
        &Method::GET => handle_decision(&event, &state).await,
        _ => method_not_allowed(),
    }
}

/// POST: the web client reports a freshly signed-in but not-yet-active
/// user; management gets one email with approve/decline links.
async fn handle_notify(event: &Request, state: &AppState) -> Result<Response<Body>, Error> {
    let body_str = match event.body() {
        Body::Text(text) => text.as_str(),
        Body::Binary(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
        Body::Empty => "",
    };

    let applicant: RegistrationNotification = match serde_json::from_str(body_str) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse notification body: {}", e);
            return error_json(&ApiError::BadRequest(format!(
                "Invalid request body: {}",
                e
            )));
        }
    };

    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "orgflow".to_string());
    let base_url = env::var("PUBLIC_API_URL").expect("PUBLIC_API_URL must be set");
    let signing_secret =
        env::var("APPROVAL_SIGNING_SECRET").expect("APPROVAL_SIGNING_SECRET must be set");
    let management_email =
        env::var("MANAGEMENT_EMAIL").expect("MANAGEMENT_EMAIL must be set");
    let sender = env::var("SENDER_EMAIL").unwrap_or_else(|_| DEFAULT_SENDER.to_string());

    let record = match approvals::create_approval(
        &state.dynamo_client,
        &table_name,
        &applicant.user_id,
    )
    .await
    {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Failed to record pending approval: {}", e);
            return error_json(&e);
        }
    };

    let approve_token = approvals::sign_decision_token(
        &signing_secret,
        &applicant.user_id,
        DecisionAction::Approve,
        &record.expires_at,
    );
    let decline_token = approvals::sign_decision_token(
        &signing_secret,
        &applicant.user_id,
        DecisionAction::Decline,
        &record.expires_at,
    );
    let approve_link = approvals::build_decision_link(
        &base_url,
        &applicant.user_id,
        DecisionAction::Approve,
        &approve_token,
    );
    let decline_link = approvals::build_decision_link(
        &base_url,
        &applicant.user_id,
        DecisionAction::Decline,
        &decline_token,
    );

    match email::send_pending_approval_email(
        &state.ses_client,
        &sender,
        &management_email,
        &applicant,
        &approve_link,
        &decline_link,
    )
    .await
    {
        Ok(receipt) => {
            tracing::info!(
                "Approval request for {} sent to management",
                applicant.user_id
            );
            json_response(
                StatusCode::OK,
                &NotificationResponse {
                    ok: true,
                    res: receipt,
                },
            )
        }
        Err(e) => {
            tracing::error!("Failed to email management: {}", e);
            error_json(&e)
        }
    }
}

/// GET: a management board member clicked an emailed link. The signed
/// token is checked against the stored record before anything mutates.
async fn handle_decision(event: &Request, state: &AppState) -> Result<Response<Body>, Error> {
    let params = event.query_string_parameters_ref();
    let action = params
        .and_then(|p| p.first("action"))
        .and_then(DecisionAction::parse);
    let user_id = params.and_then(|p| p.first("user_id"));
    let token = params.and_then(|p| p.first("token"));

    let (Some(action), Some(user_id), Some(token)) = (action, user_id, token) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid request.");
    };

    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "orgflow".to_string());
    let signing_secret =
        env::var("APPROVAL_SIGNING_SECRET").expect("APPROVAL_SIGNING_SECRET must be set");
    let sender = env::var("SENDER_EMAIL").unwrap_or_else(|_| DEFAULT_SENDER.to_string());

    let record = match approvals::load_approval(&state.dynamo_client, &table_name, user_id).await
    {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_text(&ApiError::NotFound(format!(
                "No registration request found for user {}.",
                user_id
            )));
        }
        Err(e) => return error_text(&e),
    };

    if let Err(e) = approvals::verify_decision_token(&record, &signing_secret, action, token) {
        tracing::warn!("Rejected decision link for {}: {}", user_id, e);
        return error_text(&e);
    }

    // A replayed decline lands here: the profile is already gone and the
    // response says so instead of mailing an empty address.
    let profile = match profiles::get_profile(&state.dynamo_client, &table_name, user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            return error_text(&ApiError::NotFound(format!(
                "No profile found for user {}.",
                user_id
            )));
        }
        Err(e) => return error_text(&e),
    };

    // Claim the record first; the conditional update is what makes each
    // link single-use under concurrent clicks.
    if let Err(e) = approvals::mark_decided(&state.dynamo_client, &table_name, user_id, action).await
    {
        return error_text(&e);
    }

    match action {
        DecisionAction::Approve => {
            if let Err(e) =
                profiles::set_active(&state.dynamo_client, &table_name, user_id, true).await
            {
                tracing::error!("Approval of {} claimed but activation failed: {}", user_id, e);
                return error_text(&e);
            }

            if let Err(e) = email::send_approved_email(
                &state.ses_client,
                &sender,
                &profile.email,
                &profile.full_name,
            )
            .await
            {
                // Best-effort: the account is active either way.
                tracing::error!("Failed to send approval notice to {}: {}", profile.email, e);
            }

            text_response(StatusCode::OK, "User approved successfully.")
        }
        DecisionAction::Decline => {
            let user_pool_id =
                env::var("COGNITO_USER_POOL_ID").expect("COGNITO_USER_POOL_ID must be set");

            if let Err(e) = accounts::remove_account(
                &state.cognito_client,
                &state.dynamo_client,
                &user_pool_id,
                &table_name,
                user_id,
            )
            .await
            {
                tracing::error!("Decline of {} claimed but removal failed: {}", user_id, e);
                return error_text(&e);
            }

            if let Err(e) = email::send_declined_email(
                &state.ses_client,
                &sender,
                &profile.email,
                &profile.full_name,
            )
            .await
            {
                tracing::error!("Failed to send decline notice to {}: {}", profile.email, e);
            }

            text_response(StatusCode::OK, "User declined and removed.")
        }
    }
}
