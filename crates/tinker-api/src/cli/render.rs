//! Terminal rendering of chat turns.

use console::style;

use tinker_types::chat::{ChatTurn, StructuredPayload, TurnRole, VideoRef};

/// Watch URL for a video reference, starting at its offset when present.
pub fn video_url(video: &VideoRef) -> String {
    match video.start_offset_seconds {
        Some(start) if start > 0 => {
            format!("https://www.youtube.com/watch?v={}&t={start}s", video.id)
        }
        _ => format!("https://www.youtube.com/watch?v={}", video.id),
    }
}

/// Plain-text lines for one turn, without styling.
pub fn turn_lines(turn: &ChatTurn) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(text) = turn.text.as_deref().filter(|t| !t.is_empty()) {
        lines.push(text.to_string());
    }
    if turn.image_ref.is_some() {
        lines.push("[image attached]".to_string());
    }

    match &turn.structured {
        Some(StructuredPayload::Clarify(clarify)) => {
            if !clarify.question.is_empty() && turn.text.as_deref() != Some(clarify.question.as_str()) {
                lines.push(clarify.question.clone());
            }
            for (i, choice) in clarify.choices.iter().enumerate() {
                lines.push(format!("  {}. {choice}", i + 1));
            }
        }
        Some(StructuredPayload::Video(video)) => {
            lines.push(format!("  ▶ {} {}", video.primary.title, video_url(&video.primary)));
            if let Some(why) = &video.primary.rationale {
                lines.push(format!("    {why}"));
            }
            for alternate in &video.alternates {
                lines.push(format!("  • {} {}", alternate.title, video_url(alternate)));
            }
        }
        None => {}
    }

    lines
}

/// Print one turn with a styled role label.
pub fn print_turn(turn: &ChatTurn) {
    let label = match turn.role {
        TurnRole::User => style("you").cyan().bold(),
        TurnRole::Assistant => style("helper").green().bold(),
    };
    println!(
        "  {} {}",
        label,
        style(turn.created_at.format("%Y-%m-%d %H:%M:%S").to_string()).dim()
    );
    for line in turn_lines(turn) {
        println!("    {line}");
    }
    println!();
}
