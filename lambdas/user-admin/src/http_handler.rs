use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use orgflow_shared::{
    accounts,
    authz::{Caller, Role},
    error::ApiError,
    http::{cors_preflight, error_json, json_response, method_not_allowed},
    profiles,
    types::{AdminRequest, DeleteResponse, PurgeResponse},
    AppState,
};
use std::env;
use std::sync::Arc;

/// Main Lambda handler - single authenticated POST endpoint
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    tracing::info!(
        "User admin invoked - Method: {} Path: {}",
        method,
        event.uri().path()
    );

    match method {
        &Method::OPTIONS => cors_preflight(),
        &Method::POST => handle_admin(&event, &state).await,
        _ => method_not_allowed(),
    }
}

async fn handle_admin(event: &Request, state: &AppState) -> Result<Response<Body>, Error> {
    // Bearer token check happens before anything else touches a store.
    let Some(access_token) = bearer_token(event) else {
        return error_json(&ApiError::Unauthorized("Unauthorized".to_string()));
    };

    let caller_id = match accounts::resolve_caller_id(&state.cognito_client, access_token).await {
        Ok(id) => id,
        Err(e) => return error_json(&e),
    };

    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "orgflow".to_string());

    let caller_role = match profiles::get_profile(&state.dynamo_client, &table_name, &caller_id)
        .await
    {
        Ok(profile) => Role::parse(profile.as_ref().map(|p| p.role.as_str())),
        Err(e) => return error_json(&e),
    };
    let caller = Caller::new(caller_id, caller_role);

    // Malformed bodies fall back to an empty request, which then fails
    // the action match below.
    let body_str = match event.body() {
        Body::Text(text) => text.as_str(),
        Body::Binary(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
        Body::Empty => "",
    };
    let request: AdminRequest = serde_json::from_str(body_str).unwrap_or(AdminRequest {
        action: None,
        user_id: None,
    });

    match request.action.as_deref() {
        Some("delete_user") => {
            let target = request.user_id.as_deref().unwrap_or(&caller.user_id);
            delete_user(state, &table_name, &caller, target).await
        }
        Some("delete_all_users") => purge_users(state, &table_name, &caller).await,
        _ => error_json(&ApiError::BadRequest("Unsupported action".to_string())),
    }
}

async fn delete_user(
    state: &AppState,
    table_name: &str,
    caller: &Caller,
    target_user_id: &str,
) -> Result<Response<Body>, Error> {
    if !caller.can_delete_user(target_user_id) {
        tracing::warn!(
            "{} ({}) tried to delete {}",
            caller.user_id,
            caller.role.as_str(),
            target_user_id
        );
        return error_json(&ApiError::Forbidden("Forbidden".to_string()));
    }

    let user_pool_id =
        env::var("COGNITO_USER_POOL_ID").expect("COGNITO_USER_POOL_ID must be set");

    match accounts::remove_account(
        &state.cognito_client,
        &state.dynamo_client,
        &user_pool_id,
        table_name,
        target_user_id,
    )
    .await
    {
        Ok(()) => {
            tracing::info!("{} deleted account {}", caller.user_id, target_user_id);
            json_response(StatusCode::OK, &DeleteResponse { ok: true })
        }
        Err(e) => {
            tracing::error!("Account removal for {} failed: {}", target_user_id, e);
            error_json(&e)
        }
    }
}

async fn purge_users(
    state: &AppState,
    table_name: &str,
    caller: &Caller,
) -> Result<Response<Body>, Error> {
    if !caller.can_purge_users() {
        tracing::warn!(
            "{} ({}) tried to purge all users",
            caller.user_id,
            caller.role.as_str()
        );
        return error_json(&ApiError::Forbidden("Forbidden".to_string()));
    }

    let user_pool_id =
        env::var("COGNITO_USER_POOL_ID").expect("COGNITO_USER_POOL_ID must be set");

    match accounts::purge_accounts_except(
        &state.cognito_client,
        &state.dynamo_client,
        &user_pool_id,
        table_name,
        &caller.user_id,
    )
    .await
    {
        Ok((deleted, failed)) => {
            tracing::info!(
                "{} purged {} accounts ({} failed)",
                caller.user_id,
                deleted,
                failed
            );
            json_response(
                StatusCode::OK,
                &PurgeResponse {
                    ok: true,
                    deleted,
                    failed,
                },
            )
        }
        Err(e) => {
            tracing::error!("Bulk delete failed: {}", e);
            error_json(&e)
        }
    }
}

fn bearer_token(event: &Request) -> Option<&str> {
    event
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|header| header.split_whitespace().nth(1))
        .filter(|token| !token.is_empty())
}
