//! Command execution against a `Session`

use anyhow::{Context, Result, bail};
use common::Secret;
use session::{RequestSpec, Session, SessionError, endpoints};
use tracing::info;

use crate::cli::Command;

/// Run one command and return what should be printed on stdout.
///
/// `password` is only read by `login`.
pub async fn run(
    session: &Session,
    command: Command,
    password: Option<Secret<String>>,
) -> Result<String> {
    let spec = match command {
        Command::Login { email } => {
            let password = password.ok_or(crate::error::Error::MissingPassword)?;
            let profile = session
                .login(&email, password.expose())
                .await
                .map_err(explain)
                .context("sign-in failed")?;
            return Ok(format!("signed in as {} ({})", profile.username, profile.email));
        }
        Command::Logout => {
            session.logout().await;
            return Ok("signed out".to_string());
        }
        Command::Whoami => {
            return match session.validate().await {
                Some(profile) => Ok(serde_json::to_string_pretty(&profile)?),
                None => Ok("not signed in".to_string()),
            };
        }
        Command::Videos => RequestSpec::get(endpoints::VIDEOS),
        Command::Video { id } => RequestSpec::get(endpoints::video(id)),
        Command::History { user_id } => RequestSpec::get(endpoints::user_history(user_id)),
        Command::Comments { video_id } => RequestSpec::get(endpoints::comments(video_id)),
        Command::Comment { video_id, text } => {
            RequestSpec::post(endpoints::create_comment(video_id))
                .json(&serde_json::json!({ "content": text }))?
        }
        Command::DeleteComment {
            video_id,
            comment_id,
        } => RequestSpec::delete(endpoints::delete_comment(video_id, comment_id)),
        Command::Chats => RequestSpec::get(endpoints::CHATS),
        Command::Unread => RequestSpec::get(endpoints::UNREAD_COUNT),
        Command::Letters { chat_id } => RequestSpec::get(endpoints::letters(chat_id)),
        Command::Write { chat_id, text } => RequestSpec::post(endpoints::letters(chat_id))
            .json(&serde_json::json!({ "content": text }))?,
        Command::MarkRead { chat_id, letter_id } => {
            RequestSpec::post(endpoints::letter_read(chat_id, letter_id)).json(&serde_json::json!({}))?
        }
        Command::Get { path } => RequestSpec::get(path),
        Command::Delete { path } => RequestSpec::delete(path),
        Command::Post { path, body } => RequestSpec::post(path).json(&body)?,
        Command::Put { path, body } => RequestSpec::put(path).json(&body)?,
    };

    let method = spec.method.clone();
    let path = spec.path.clone();
    let response = session.send(spec).await.map_err(explain)?;
    info!(%method, %path, status = response.status, "command completed");

    let body = render_body(&response.body);
    if !response.is_success() {
        bail!("{method} {path} returned {}: {body}", response.status);
    }
    Ok(body)
}

/// Attach a next step to errors the user can act on.
fn explain(err: SessionError) -> anyhow::Error {
    match err {
        SessionError::ReauthRequired => {
            anyhow::Error::new(err).context("not signed in: run `lesson-client login <email>`")
        }
        SessionError::Unauthorized => {
            anyhow::Error::new(err).context("the API refused these credentials")
        }
        other => anyhow::Error::new(other),
    }
}

/// Pretty-print JSON bodies, pass anything else through as text.
fn render_body(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned()),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}
