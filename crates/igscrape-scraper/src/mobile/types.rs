//! Response shapes of the mobile API. Only the fields that feed the
//! normalized records are modelled.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub logged_in_user: Option<LoginUser>,
    #[serde(default)]
    pub two_factor_required: bool,
    #[serde(default)]
    pub two_factor_info: Option<TwoFactorInfo>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

impl LoginResponse {
    /// Best available description of a failed login.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        self.error_type
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "login rejected".to_owned())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    #[serde(deserialize_with = "flexible_u64")]
    pub pk: u64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorInfo {
    pub two_factor_identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct UserInfoResponse {
    pub user: MobileUser,
}

#[derive(Debug, Deserialize)]
pub struct MobileUser {
    #[serde(deserialize_with = "flexible_u64")]
    pub pk: u64,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub hd_profile_pic_url_info: Option<ImageUrl>,
    #[serde(default)]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub following_count: Option<u64>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UserFeedResponse {
    #[serde(default)]
    pub items: Vec<MobileMedia>,
    #[serde(default)]
    pub more_available: bool,
    #[serde(default)]
    pub next_max_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaInfoResponse {
    #[serde(default)]
    pub items: Vec<MobileMedia>,
}

/// `media_type` value of a video post.
pub const MEDIA_TYPE_VIDEO: u8 = 2;

#[derive(Debug, Deserialize)]
pub struct MobileMedia {
    #[serde(deserialize_with = "flexible_u64")]
    pub pk: u64,
    pub code: String,
    #[serde(default)]
    pub caption: Option<Caption>,
    #[serde(default)]
    pub taken_at: Option<i64>,
    #[serde(default)]
    pub media_type: u8,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub play_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Caption {
    #[serde(default)]
    pub text: Option<String>,
}

/// Ids arrive as JSON numbers or as decimal strings depending on endpoint.
fn flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
