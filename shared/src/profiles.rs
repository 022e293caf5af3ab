//! Profile rows in DynamoDB. One item per user, `PK = USER#<id>`,
//! `SK = PROFILE`. The lambdas only ever touch single items plus one
//! scan for the bulk-delete path; nothing here is cached.

use crate::error::ApiError;
use crate::types::Profile;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;
use std::collections::HashMap;

fn profile_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

const PROFILE_SK: &str = "PROFILE";

fn item_to_profile(item: &HashMap<String, AttributeValue>) -> Profile {
    let get_s = |key: &str| {
        item.get(key)
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
    };

    Profile {
        user_id: get_s("user_id").unwrap_or_default(),
        full_name: get_s("full_name").unwrap_or_default(),
        email: get_s("email").unwrap_or_default(),
        role: get_s("role").unwrap_or_else(|| "member".to_string()),
        department: get_s("department"),
        position: get_s("position"),
        phone_number: get_s("phone_number"),
        avatar_url: get_s("avatar_url"),
        is_active: item
            .get("is_active")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        points: item
            .get("points")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
            .unwrap_or(0),
        created_at: get_s("created_at").unwrap_or_default(),
        updated_at: get_s("updated_at"),
    }
}

pub async fn get_profile(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<Profile>, ApiError> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(profile_pk(user_id)))
        .key("SK", AttributeValue::S(PROFILE_SK.to_string()))
        .send()
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch profile", e))?;

    Ok(result.item().map(item_to_profile))
}

/// Store a full profile row. Used at signup time and by test seeding;
/// the approval workflow itself never creates profiles.
pub async fn put_profile(
    client: &DynamoClient,
    table_name: &str,
    profile: &Profile,
) -> Result<(), ApiError> {
    let mut put = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(profile_pk(&profile.user_id)))
        .item("SK", AttributeValue::S(PROFILE_SK.to_string()))
        .item("user_id", AttributeValue::S(profile.user_id.clone()))
        .item("full_name", AttributeValue::S(profile.full_name.clone()))
        .item("email", AttributeValue::S(profile.email.clone()))
        .item("role", AttributeValue::S(profile.role.clone()))
        .item("is_active", AttributeValue::Bool(profile.is_active))
        .item("points", AttributeValue::N(profile.points.to_string()))
        .item("created_at", AttributeValue::S(profile.created_at.clone()));

    for (key, value) in [
        ("department", &profile.department),
        ("position", &profile.position),
        ("phone_number", &profile.phone_number),
        ("avatar_url", &profile.avatar_url),
    ] {
        if let Some(v) = value {
            put = put.item(key, AttributeValue::S(v.clone()));
        }
    }

    put.send()
        .await
        .map_err(|e| ApiError::upstream("Failed to store profile", e))?;

    Ok(())
}

/// Flip the approval flag. Condition on the row existing so approving a
/// deleted user surfaces as NotFound instead of resurrecting an item.
pub async fn set_active(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    is_active: bool,
) -> Result<(), ApiError> {
    let result = client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(profile_pk(user_id)))
        .key("SK", AttributeValue::S(PROFILE_SK.to_string()))
        .condition_expression("attribute_exists(PK)")
        .update_expression("SET is_active = :active, updated_at = :now")
        .expression_attribute_values(":active", AttributeValue::Bool(is_active))
        .expression_attribute_values(":now", AttributeValue::S(Utc::now().to_rfc3339()))
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = format!("{:?}", e);
            if msg.contains("ConditionalCheckFailedException") {
                Err(ApiError::NotFound(format!(
                    "No profile found for user {}",
                    user_id
                )))
            } else {
                Err(ApiError::upstream("Failed to update profile", e))
            }
        }
    }
}

pub async fn delete_profile(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(profile_pk(user_id)))
        .key("SK", AttributeValue::S(PROFILE_SK.to_string()))
        .send()
        .await
        .map_err(|e| ApiError::upstream("Failed to delete profile", e))?;

    Ok(())
}

/// Scan every profile row. Only the bulk-delete path uses this; the
/// member base is small enough that a paged scan is fine.
pub async fn list_profiles(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Profile>, ApiError> {
    let mut profiles = Vec::new();
    let mut start_key = None;

    loop {
        let result = client
            .scan()
            .table_name(table_name)
            .filter_expression("begins_with(PK, :prefix) AND SK = :sk")
            .expression_attribute_values(":prefix", AttributeValue::S("USER#".to_string()))
            .expression_attribute_values(":sk", AttributeValue::S(PROFILE_SK.to_string()))
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(|e| ApiError::upstream("Failed to list profiles", e))?;

        profiles.extend(result.items().iter().map(item_to_profile));

        match result.last_evaluated_key() {
            Some(key) if !key.is_empty() => start_key = Some(key.clone()),
            _ => break,
        }
    }

    Ok(profiles)
}
