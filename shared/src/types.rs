use serde::{Deserialize, Serialize};

// ========== PROFILE ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub role: String, // management_board | high_board | member
    pub department: Option<String>,
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub points: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

// ========== REGISTRATION APPROVAL ==========

// POST body sent by the client after a not-yet-active user first signs in
#[derive(Debug, Deserialize)]
pub struct RegistrationNotification {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub ok: bool,
    pub res: SendReceipt,
}

// What the email provider gave us back for the notification send
#[derive(Debug, Serialize, Clone)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

// ========== USER ADMIN ==========
#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub ok: bool,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
