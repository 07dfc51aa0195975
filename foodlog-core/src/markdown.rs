// Markdown note rendering
// YAML frontmatter between `---` lines, optional hashtag body, and filename builders

use chrono::{DateTime, FixedOffset};
use color_eyre::{eyre::Context, Result};
use serde::Serialize;

use crate::normalize::{sanitize_filename, DEFAULT_MAX_FILENAME_LEN, FALLBACK_FILENAME};

/// Hashtag that marks every note this tool writes
pub const FOODTRACKER_TAG: &str = "#foodtracker";

/// Render a payload as a frontmatter block, optionally followed by a tag line
pub fn render_frontmatter<T: Serialize>(payload: &T, tag: Option<&str>) -> Result<String> {
    let yaml = serde_yaml::to_string(payload).context("Failed to serialize frontmatter")?;
    let mut out = format!("---\n{}\n---\n", yaml.trim_end());

    if let Some(tag) = tag {
        out.push('\n');
        out.push_str(tag);
        out.push('\n');
    }

    Ok(out)
}

/// `2025-03-12_19-30-05_cafebabe.md`
pub fn build_log_filename(timestamp: &DateTime<FixedOffset>, short_id: &str) -> String {
    format!("{}_{}.md", timestamp.format("%Y-%m-%d_%H-%M-%S"), short_id)
}

/// `2025-03-12_condition.md`: one file per calendar day and kind
pub fn build_day_filename(timestamp: &DateTime<FixedOffset>, kind: &str) -> String {
    format!("{}_{}.md", format_date(timestamp), kind)
}

pub fn format_date(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

pub fn format_time(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format("%H:%M").to_string()
}

/// Characters that end or split a `[[...]]` link
const LINK_METACHARS: &[char] = &['[', ']', '|', '#', '^'];

/// Wiki-style link to a catalog note.
///
/// Uses the alias form `[[stem|name]]` when the note's file stem differs
/// from the display name (sanitized or collision-suffixed filenames).
/// Names containing link syntax are linked by a cleaned target alone.
pub fn backlink(name: &str, stem: Option<&str>) -> String {
    if name.contains(LINK_METACHARS) {
        let target = stem
            .map(str::to_string)
            .unwrap_or_else(|| sanitize_filename(name, DEFAULT_MAX_FILENAME_LEN));
        let target: String = target.replace(LINK_METACHARS, " ");
        let target = target.split_whitespace().collect::<Vec<_>>().join(" ");
        if target.is_empty() {
            return format!("[[{}]]", FALLBACK_FILENAME);
        }
        return format!("[[{}]]", target);
    }

    match stem {
        Some(stem) if stem != name => format!("[[{}|{}]]", stem, name),
        _ => format!("[[{}]]", name),
    }
}

/// Frontmatter line that identifies which ingredient a catalog note belongs to
pub fn original_name_line(name: &str) -> String {
    // JSON string escaping is valid YAML double-quoted scalar syntax
    let quoted = serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name));
    format!("original_name: {}", quoted)
}

/// Body of a freshly created catalog note
pub fn render_catalog_note(name: &str) -> String {
    format!(
        "---\n{}\n---\n\n# {}\n\n{}\n",
        original_name_line(name),
        name,
        FOODTRACKER_TAG
    )
}
