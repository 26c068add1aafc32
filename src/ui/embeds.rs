use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{audio::player::QueueInfo, sources::Track};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Jukebox";

pub const NOT_IN_VOICE: &str = "You need to be in a voice channel to play music.";
pub const EMPTY_QUEUE: &str = "The queue is empty.";
pub const PAUSED: &str = "Paused.";
pub const RESUMED: &str = "Resumed.";
pub const STOPPED: &str = "Stopped and disconnected.";

pub fn now_playing_message(track: &Track) -> String {
    format!("Now playing: **{}**", track.title())
}

pub fn added_to_queue_message(track: &Track) -> String {
    format!("Added to queue: **{}**", track.title())
}

pub fn skipped_message(next: Option<&Track>) -> String {
    match next {
        Some(track) => format!("Skipped. Now playing: **{}**", track.title()),
        None => "Skipped. Queue is empty.".to_string(),
    }
}

/// Text body of the queue embed. `None` when there is nothing to show.
pub fn queue_description(queue_info: &QueueInfo, page_size: usize) -> Option<String> {
    if queue_info.is_empty() {
        return None;
    }

    let mut description = String::new();

    if let Some(current) = &queue_info.current {
        description.push_str(&format!(
            "**Now Playing:** {}{}\n",
            current.title(),
            duration_suffix(current)
        ));
    }

    if !queue_info.items.is_empty() {
        if !description.is_empty() {
            description.push('\n');
        }
        description.push_str("**Up Next:**\n");

        for (i, item) in queue_info.items.iter().take(page_size).enumerate() {
            description.push_str(&format!(
                "{}. {}{}\n",
                i + 1,
                item.title(),
                duration_suffix(item)
            ));
        }

        let remaining = queue_info.items.len().saturating_sub(page_size);
        if remaining > 0 {
            description.push_str(&format!("...and {} more\n", remaining));
        }
    }

    Some(description.trim_end().to_string())
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(queue_info: &QueueInfo, page_size: usize) -> Option<CreateEmbed> {
    let description = queue_description(queue_info, page_size)?;

    Some(
        CreateEmbed::default()
            .title("📋 Queue")
            .description(description)
            .color(colors::INFO_BLUE)
            .footer(CreateEmbedFooter::new(format!(
                "{} tracks queued • {}",
                queue_info.items.len(),
                STANDARD_FOOTER
            )))
            .timestamp(Timestamp::now()),
    )
}

fn duration_suffix(track: &Track) -> String {
    if track.duration_secs() == 0 {
        String::new()
    } else {
        format!(" `[{}]`", format_duration(track.duration()))
    }
}

/// Formatea una duración en formato legible
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceType;
    use pretty_assertions::assert_eq;

    fn track(title: &str, secs: u64) -> Track {
        Track::new(title, "https://youtu.be/x", "https://cdn/x", SourceType::YouTube)
            .with_duration(secs)
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(225)), "3:45");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_messages() {
        let song = track("Song", 0);
        assert_eq!(now_playing_message(&song), "Now playing: **Song**");
        assert_eq!(added_to_queue_message(&song), "Added to queue: **Song**");
        assert_eq!(skipped_message(Some(&song)), "Skipped. Now playing: **Song**");
        assert_eq!(skipped_message(None), "Skipped. Queue is empty.");
    }

    #[test]
    fn test_empty_queue_has_no_description() {
        let info = QueueInfo { current: None, items: vec![] };
        assert_eq!(queue_description(&info, 10), None);
        assert!(create_queue_embed(&info, 10).is_none());
    }

    #[test]
    fn test_queue_description() {
        let info = QueueInfo {
            current: Some(track("Current", 200)),
            items: vec![track("One", 65), track("Two", 0)],
        };

        assert_eq!(
            queue_description(&info, 10).unwrap(),
            "**Now Playing:** Current `[3:20]`\n\n**Up Next:**\n1. One `[1:05]`\n2. Two"
        );
    }

    #[test]
    fn test_queue_description_truncates() {
        let info = QueueInfo {
            current: None,
            items: (1..=13).map(|i| track(&format!("T{i}"), 0)).collect(),
        };

        let description = queue_description(&info, 10).unwrap();

        assert!(description.starts_with("**Up Next:**\n1. T1\n"));
        assert!(description.contains("10. T10"));
        assert!(!description.contains("11. T11"));
        assert!(description.ends_with("...and 3 more"));
    }
}
