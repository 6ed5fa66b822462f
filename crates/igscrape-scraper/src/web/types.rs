//! Response shapes of the web API and its GraphQL queries.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "two_factor_required")]
    pub two_factor_required: bool,
    #[serde(default, rename = "two_factor_info")]
    pub two_factor_info: Option<TwoFactorInfo>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "error_type")]
    pub error_type: Option<String>,
}

impl LoginResponse {
    #[must_use]
    pub fn failure_reason(&self) -> String {
        self.error_type
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "login rejected".to_owned())
    }
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorInfo {
    pub two_factor_identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileInfoResponse {
    pub data: ProfileData,
}

#[derive(Debug, Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub user: Option<WebUser>,
}

#[derive(Debug, Deserialize)]
pub struct WebUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub profile_pic_url_hd: Option<String>,
    #[serde(default)]
    pub edge_followed_by: Option<Count>,
    #[serde(default)]
    pub edge_follow: Option<Count>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub edge_owner_to_timeline_media: Option<MediaConnection>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Count {
    pub count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaConnection {
    #[serde(default)]
    pub page_info: PageInfo,
    #[serde(default)]
    pub edges: Vec<MediaEdge>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaEdge {
    pub node: WebMedia,
}

#[derive(Debug, Deserialize)]
pub struct WebMedia {
    pub id: String,
    pub shortcode: String,
    #[serde(default)]
    pub edge_media_to_caption: Option<CaptionConnection>,
    #[serde(default)]
    pub taken_at_timestamp: Option<i64>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub video_view_count: Option<u64>,
    #[serde(default)]
    pub edge_liked_by: Option<Count>,
    #[serde(default)]
    pub edge_media_preview_like: Option<Count>,
    #[serde(default)]
    pub edge_media_to_comment: Option<Count>,
    #[serde(default)]
    pub edge_media_to_parent_comment: Option<Count>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionConnection {
    #[serde(default)]
    pub edges: Vec<CaptionEdge>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionEdge {
    pub node: CaptionNode,
}

#[derive(Debug, Deserialize)]
pub struct CaptionNode {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TimelineQueryResponse {
    pub data: TimelineData,
}

#[derive(Debug, Deserialize)]
pub struct TimelineData {
    #[serde(default)]
    pub user: Option<TimelineUser>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineUser {
    pub edge_owner_to_timeline_media: MediaConnection,
}

#[derive(Debug, Deserialize)]
pub struct ShortcodeQueryResponse {
    pub data: ShortcodeData,
}

#[derive(Debug, Deserialize)]
pub struct ShortcodeData {
    #[serde(default)]
    pub shortcode_media: Option<WebMedia>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentUserResponse {
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}
