//! Web API shapes to normalized records.

use igscrape_core::{PostRecord, ProfileRecord};

use super::types::{WebMedia, WebUser};
use crate::normalize::{non_empty, published_at};

pub(crate) fn normalize_user(user: &WebUser) -> ProfileRecord {
    ProfileRecord {
        username: user.username.clone(),
        full_name: non_empty(user.full_name.clone()),
        bio: non_empty(user.biography.clone()),
        avatar_url: non_empty(
            user.profile_pic_url_hd
                .clone()
                .or_else(|| user.profile_pic_url.clone()),
        ),
        follower_count: user.edge_followed_by.map(|c| c.count),
        following_count: user.edge_follow.map(|c| c.count),
    }
}

/// View counts exist only for videos; for other media they stay absent.
pub(crate) fn normalize_media(media: WebMedia) -> PostRecord {
    let caption = media
        .edge_media_to_caption
        .and_then(|c| c.edges.into_iter().next())
        .map(|edge| edge.node.text);
    PostRecord {
        post_id: media.id,
        shortcode: media.shortcode,
        caption: non_empty(caption),
        published_at: published_at(media.taken_at_timestamp),
        view_count: if media.is_video {
            media.video_view_count
        } else {
            None
        },
        like_count: media
            .edge_liked_by
            .or(media.edge_media_preview_like)
            .map(|c| c.count),
        comment_count: media
            .edge_media_to_comment
            .or(media.edge_media_to_parent_comment)
            .map(|c| c.count),
    }
}
