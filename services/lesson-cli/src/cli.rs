//! Command-line arguments

use clap::{Parser, Subcommand};

/// Client for the lesson platform API
#[derive(Parser, Debug, PartialEq)]
#[command(name = "lesson-client", version, about)]
pub struct Cli {
    /// Config file (overrides CONFIG_PATH)
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config_path: Option<String>,

    /// Print Prometheus metrics to stderr when the command finishes
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Sign in (password from LESSON_PASSWORD or stdin)
    Login { email: String },
    /// Sign out and revoke the refresh token
    Logout,
    /// Check the stored session and show the profile
    Whoami,
    /// List videos
    Videos,
    /// Show one video
    Video { id: String },
    /// Watch history of a user
    History { user_id: String },
    /// Comments on a video
    Comments { video_id: String },
    /// Comment on a video
    Comment { video_id: String, text: String },
    /// Delete one of your comments
    DeleteComment { video_id: String, comment_id: String },
    /// Your chats
    Chats,
    /// Unread message count
    Unread,
    /// Letters in a chat
    Letters { chat_id: String },
    /// Send a letter to a chat
    Write { chat_id: String, text: String },
    /// Mark a letter as read
    MarkRead { chat_id: String, letter_id: String },
    /// GET an API path
    Get { path: String },
    /// DELETE an API path
    Delete { path: String },
    /// POST a JSON body
    Post {
        path: String,
        #[arg(value_parser = json_body)]
        body: serde_json::Value,
    },
    /// PUT a JSON body
    Put {
        path: String,
        #[arg(value_parser = json_body)]
        body: serde_json::Value,
    },
}

fn json_body(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(raw)
}
