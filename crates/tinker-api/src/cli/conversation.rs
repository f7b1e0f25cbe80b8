//! Client commands: `tinker history` and `tinker send`.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use console::style;

use tinker_client::ChatClient;

use super::render::print_turn;

/// Print the turn log of a session.
pub async fn history(server: &str, session_id: &str, json: bool) -> Result<()> {
    let client = ChatClient::new(server)?;
    let turns = client
        .fetch_history(session_id)
        .await
        .with_context(|| format!("failed to fetch history for session '{session_id}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    if turns.is_empty() {
        println!();
        println!(
            "  {} No turns yet in session '{}'. Start with: {}",
            style("i").blue().bold(),
            style(session_id).cyan(),
            style(format!("tinker send --session {session_id} --text \"...\"")).yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    for turn in &turns {
        print_turn(turn);
    }
    Ok(())
}

/// Send one turn and print the reply.
pub async fn send(
    server: &str,
    session_id: &str,
    text: Option<String>,
    image: Option<&Path>,
    json: bool,
) -> Result<()> {
    let image = match image {
        Some(path) => Some(encode_image_file(path).await?),
        None => None,
    };

    let client = ChatClient::new(server)?;
    let reply = client
        .send_turn(session_id, text, image)
        .await
        .context("failed to send turn")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!();
        print_turn(&reply);
    }
    Ok(())
}

/// Read an image file as a base64 data URL.
///
/// Unknown extensions are sent as bare base64; the server sniffs the format.
pub async fn encode_image_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image {}", path.display()))?;
    let encoded = STANDARD.encode(bytes);

    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| match ext.as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            _ => None,
        });

    Ok(match mime {
        Some(mime) => format!("data:{mime};base64,{encoded}"),
        None => encoded,
    })
}
