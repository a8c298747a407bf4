//! Prompt and Context Builders
//!
//! Builds the context strings and prompts handed to the generation service.

use crate::core::TimeSec;

/// Coarse position of a scene within its video.
///
/// Early scenes start inside the first ten seconds regardless of total
/// length; late scenes start in the final 30% of the video.
pub fn position_label(start_sec: TimeSec, video_duration: TimeSec) -> &'static str {
    if start_sec < 10.0 {
        "early"
    } else if start_sec >= video_duration * 0.7 {
        "late"
    } else {
        "middle"
    }
}

/// Prompt for the video summary stage
pub fn summary_prompt(filename: &str, duration_sec: Option<TimeSec>, has_frames: bool) -> String {
    let duration = duration_sec
        .map(|d| format!("{:.0} seconds", d))
        .unwrap_or_else(|| "unknown".to_string());

    let basis = if has_frames {
        "The attached images are frames extracted at several points of the video. Based on the images and metadata,"
    } else {
        "Based on the filename and metadata above,"
    };

    format!(
        "Video filename: {filename}\n\
         Duration: {duration}\n\n\
         {basis} describe the content of this video in two or three sentences.\n\
         Write plain declarative prose with no preamble."
    )
}

/// Context string shared by the per-scene tagging prompts
pub fn scene_context(
    filename: &str,
    summary: Option<&str>,
    start_sec: TimeSec,
    end_sec: TimeSec,
    position: &str,
) -> String {
    format!(
        "Video filename: {filename}\n\
         Video summary: {}\n\
         Scene range: {start_sec:.1}s - {end_sec:.1}s (length: {:.1}s)\n\
         Scene position: {position} part of the video",
        summary.unwrap_or("none"),
        end_sec - start_sec,
    )
}

/// Vision prompt for scene tagging
pub fn scene_tags_vision_prompt(context: &str) -> String {
    format!(
        "The attached images are frames extracted from one scene of a video.\n\n\
         {context}\n\n\
         Analyze what is visible in this scene and generate 3-7 relevant tags.\n\
         - Tag the objects, people, actions, setting, and mood you can see\n\
         - Write one tag per line with no numbering or symbols\n\
         - Only tag what actually appears in the images\n\n\
         Tags:"
    )
}

/// Text-only fallback prompt for scene tagging when no frames were extracted
pub fn scene_tags_text_prompt(context: &str) -> String {
    format!(
        "{context}\n\n\
         Based on the scene timing and video context, generate 2-5 relevant tags\n\
         for this specific scene. Write one tag per line with no numbering or symbols.\n\n\
         Tags:"
    )
}

/// Prompt for the general video tag stage
pub fn video_tags_prompt(
    filename: &str,
    summary: Option<&str>,
    duration_sec: Option<TimeSec>,
) -> String {
    let duration = duration_sec
        .map(|d| format!("{:.0} seconds", d))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Video filename: {filename}\n\
         Summary: {}\n\
         Duration: {duration}\n\n\
         Based on the information above, generate 3-10 relevant tags for this video.\n\
         Write one tag per line with no numbering or symbols.\n\n\
         Tags:",
        summary.unwrap_or("none"),
    )
}

/// Vision prompt for a standalone scene description
pub fn scene_description_prompt(filename: &str) -> String {
    format!(
        "The attached images are frames extracted from one scene of the video '{filename}'.\n\n\
         Describe what is visible in this scene in one or two sentences.\n\
         Mention the objects, people, actions, and setting you can see.\n\n\
         Description:"
    )
}

/// Vision prompt for the image description stage
pub fn image_description_prompt(filename: &str) -> String {
    format!(
        "Analyze the attached image and describe its content in two or three sentences.\n\
         Filename: {filename}\n\n\
         - Describe the main objects, people, setting, and mood\n\
         - Write plain declarative prose with no preamble\n\n\
         Description:"
    )
}

/// Vision prompt for the image tagging stage
pub fn image_tags_prompt(filename: &str, description: Option<&str>) -> String {
    let description_line = description
        .map(|d| format!("Description: {}\n", d))
        .unwrap_or_default();

    format!(
        "Analyze the attached image and generate 5-15 relevant tags.\n\
         Filename: {filename}\n\
         {description_line}\n\
         - Tag the objects, people, actions, setting, mood, colors, and style you can see\n\
         - Write one tag per line with no numbering or symbols\n\
         - Only tag what actually appears in the image\n\n\
         Tags:"
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_label_early() {
        assert_eq!(position_label(0.0, 100.0), "early");
        assert_eq!(position_label(9.9, 100.0), "early");
        // Early wins even when the threshold overlaps the late region
        assert_eq!(position_label(9.0, 12.0), "early");
    }

    #[test]
    fn test_position_label_middle_and_late() {
        assert_eq!(position_label(30.0, 100.0), "middle");
        assert_eq!(position_label(69.9, 100.0), "middle");
        assert_eq!(position_label(70.0, 100.0), "late");
        assert_eq!(position_label(95.0, 100.0), "late");
    }

    #[test]
    fn test_scene_context_contents() {
        let context = scene_context("trip.mp4", Some("A hiking trip."), 12.0, 18.5, "middle");
        assert!(context.contains("trip.mp4"));
        assert!(context.contains("A hiking trip."));
        assert!(context.contains("12.0s - 18.5s"));
        assert!(context.contains("length: 6.5s"));
        assert!(context.contains("middle"));
    }

    #[test]
    fn test_scene_context_without_summary() {
        let context = scene_context("trip.mp4", None, 0.0, 5.0, "early");
        assert!(context.contains("Video summary: none"));
    }

    #[test]
    fn test_summary_prompt_vision_vs_text() {
        let vision = summary_prompt("trip.mp4", Some(60.0), true);
        let text = summary_prompt("trip.mp4", Some(60.0), false);
        assert!(vision.contains("attached images"));
        assert!(!text.contains("attached images"));
        assert!(text.contains("60 seconds"));
    }

    #[test]
    fn test_image_tags_prompt_optional_description() {
        let with = image_tags_prompt("cat.jpg", Some("A sleeping cat."));
        let without = image_tags_prompt("cat.jpg", None);
        assert!(with.contains("A sleeping cat."));
        assert!(!without.contains("Description:"));
    }
}
