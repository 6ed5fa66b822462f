//! Mobile API shapes to normalized records.

use igscrape_core::{PostRecord, ProfileRecord};

use super::types::{MobileMedia, MobileUser, MEDIA_TYPE_VIDEO};
use crate::normalize::{non_empty, published_at};

pub(crate) fn normalize_user(user: MobileUser) -> ProfileRecord {
    let avatar_url = user
        .hd_profile_pic_url_info
        .map(|info| info.url)
        .or(user.profile_pic_url);
    ProfileRecord {
        username: user.username,
        full_name: non_empty(user.full_name),
        bio: non_empty(user.biography),
        avatar_url: non_empty(avatar_url),
        follower_count: user.follower_count,
        following_count: user.following_count,
    }
}

/// View counts exist only for videos; for other media they stay absent.
pub(crate) fn normalize_media(media: MobileMedia) -> PostRecord {
    let view_count = if media.media_type == MEDIA_TYPE_VIDEO {
        media.view_count.or(media.play_count)
    } else {
        None
    };
    PostRecord {
        post_id: media.pk.to_string(),
        shortcode: media.code,
        caption: non_empty(media.caption.and_then(|c| c.text)),
        published_at: published_at(media.taken_at),
        view_count,
        like_count: media.like_count,
        comment_count: media.comment_count,
    }
}
