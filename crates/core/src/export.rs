//! Transcript export formats.

use chrono::SecondsFormat;

use crate::transcript::Entry;

/// Renders transcript entries as a markdown document.
///
/// One `##` section per entry, headed by the speaker label and the
/// commit time in RFC 3339.
pub fn to_markdown(entries: &[Entry]) -> String {
    let mut out = String::from("# Transcript\n");
    for entry in entries {
        let time = entry
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        out.push_str(&format!(
            "\n## {} ({time})\n\n{}\n",
            entry.speaker, entry.content
        ));
    }
    out
}

/// Renders transcript entries as pretty-printed JSON.
pub fn to_json(entries: &[Entry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(entries)
}
