//! Lesson platform API paths
//!
//! Relative to the session's base URL; pass them to `RequestSpec`. Auth
//! endpoints live in `lesson_auth::constants` and are driven by the session.

use std::fmt::Display;

pub const VIDEOS: &str = "/api/video";

/// Chats of the signed-in user
pub const CHATS: &str = "/api/chats/my";
pub const UNREAD_COUNT: &str = "/api/chats/unread/count";

/// Watch history of a user
pub fn user_history(id: impl Display) -> String {
    format!("/api/users/{id}/history")
}

pub fn video(id: impl Display) -> String {
    format!("/api/video/{id}")
}

pub fn letters(chat_id: impl Display) -> String {
    format!("/api/chats/{chat_id}/letters")
}

pub fn letter_read(chat_id: impl Display, letter_id: impl Display) -> String {
    format!("/api/chats/{chat_id}/letters/{letter_id}/read")
}

pub fn comments(video_id: impl Display) -> String {
    format!("/api/video/{video_id}/comments")
}

pub fn create_comment(video_id: impl Display) -> String {
    format!("/api/video/{video_id}/comments/create_comment")
}

pub fn delete_comment(video_id: impl Display, comment_id: impl Display) -> String {
    format!("/api/video/{video_id}/comments/delete_comment/{comment_id}")
}
