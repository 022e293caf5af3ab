//! Account-level operations that span the auth subsystem and the
//! profile table. An account is two records in two stores with no
//! transaction across them, so removal is a fixed-order routine with a
//! compensating retry rather than a pair of ad-hoc deletes.

use crate::error::ApiError;
use crate::profiles;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;

/// Resolve the caller behind a bearer access token. Any Cognito-side
/// rejection collapses to Unauthorized; the caller never learns why.
pub async fn resolve_caller_id(
    cognito_client: &CognitoClient,
    access_token: &str,
) -> Result<String, ApiError> {
    let user = cognito_client
        .get_user()
        .access_token(access_token)
        .send()
        .await
        .map_err(|_| ApiError::Unauthorized("Unauthorized".to_string()))?;

    let sub = user
        .user_attributes()
        .iter()
        .find(|attr| attr.name() == "sub")
        .and_then(|attr| attr.value())
        .map(|s| s.to_string());

    Ok(sub.unwrap_or_else(|| user.username().to_string()))
}

/// Delete the auth identity, then the profile row.
///
/// There is no transaction across the two stores. The identity goes
/// first (an identity without a profile can still sign in, a profile
/// without an identity cannot); if the profile delete then fails it is
/// retried once, and a second failure is returned so the caller reports
/// the orphaned row instead of claiming success.
pub async fn remove_account(
    cognito_client: &CognitoClient,
    dynamo_client: &DynamoClient,
    user_pool_id: &str,
    table_name: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    let delete_identity = cognito_client
        .admin_delete_user()
        .user_pool_id(user_pool_id)
        .username(user_id)
        .send()
        .await;

    if let Err(e) = delete_identity {
        let msg = format!("{:?}", e);
        // The identity may already be gone (replayed decline, or a
        // profile that never finished signup). That still leaves the
        // profile row to clean up.
        if msg.contains("UserNotFoundException") {
            tracing::warn!("Auth identity for {} already absent", user_id);
        } else {
            return Err(ApiError::upstream("Failed to delete auth identity", e));
        }
    }

    match profiles::delete_profile(dynamo_client, table_name, user_id).await {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::error!(
                "Profile delete for {} failed after identity removal, retrying: {}",
                user_id,
                first
            );
            profiles::delete_profile(dynamo_client, table_name, user_id)
                .await
                .map_err(|_| {
                    ApiError::Upstream(format!(
                        "Auth identity for {} removed but profile row could not be deleted",
                        user_id
                    ))
                })
        }
    }
}

/// Remove every account except the caller's. Per-account failures are
/// logged and counted; the sweep keeps going.
pub async fn purge_accounts_except(
    cognito_client: &CognitoClient,
    dynamo_client: &DynamoClient,
    user_pool_id: &str,
    table_name: &str,
    keep_user_id: &str,
) -> Result<(usize, usize), ApiError> {
    let all = profiles::list_profiles(dynamo_client, table_name).await?;

    let mut deleted = 0;
    let mut failed = 0;

    for profile in all {
        if profile.user_id == keep_user_id || profile.user_id.is_empty() {
            continue;
        }
        match remove_account(
            cognito_client,
            dynamo_client,
            user_pool_id,
            table_name,
            &profile.user_id,
        )
        .await
        {
            Ok(()) => deleted += 1,
            Err(e) => {
                tracing::error!("Bulk delete failed for {}: {}", profile.user_id, e);
                failed += 1;
            }
        }
    }

    Ok((deleted, failed))
}
