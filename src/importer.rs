use crate::addon::{self, Addon};
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use time::macros::format_description;
use time::OffsetDateTime;

/// Parses a JSON backup into a working addon list. The file must be an
/// array of durable addon records; entries whose query-stripped URL was
/// already seen collapse to the first occurrence.
pub fn parse_backup(raw: &str) -> Result<Vec<Addon>> {
    let value: Value = serde_json::from_str(raw).context("parse backup JSON")?;
    let Value::Array(entries) = value else {
        bail!("backup must be a JSON array of addons");
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut addons: Vec<Addon> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let addon = Addon::from_value(entry)
            .with_context(|| format!("backup entry {}", index + 1))?;
        if addon.transport_url.trim().is_empty() {
            bail!("backup entry {} has no transport URL", index + 1);
        }
        if seen.insert(addon::base_url(&addon.transport_url).to_string()) {
            addons.push(addon);
        }
    }
    Ok(addons)
}

/// Full backup: durable fields only (the `Addon` serialization already
/// skips transient UI state), disabled entries included so they can be
/// restored later.
pub fn export_json(addons: &[Addon]) -> Result<String> {
    serde_json::to_string_pretty(addons).context("serialize backup")
}

/// Human-readable list export, one `Name: url` line per addon.
pub fn export_text(addons: &[Addon]) -> String {
    addons
        .iter()
        .map(|addon| format!("{}: {}", addon.display_name(), addon.transport_url))
        .collect::<Vec<String>>()
        .join("\n")
}

pub fn backup_file_name() -> String {
    format!("streamsmith-backup-{}.json", date_stamp())
}

pub fn list_file_name() -> String {
    format!("streamsmith-list-{}.txt", date_stamp())
}

fn date_stamp() -> String {
    let format = format_description!("[year]-[month]-[day]");
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| "export".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::Manifest;

    fn addon(url: &str, name: &str) -> Addon {
        let mut manifest = Manifest::default();
        manifest.id = format!("test.{name}");
        manifest.version = "1.0.0".to_string();
        manifest.name = name.to_string();
        Addon::new(url.to_string(), manifest)
    }

    #[test]
    fn rejects_non_array_backup() {
        assert!(parse_backup("{\"addons\": []}").is_err());
        assert!(parse_backup("not json").is_err());
    }

    #[test]
    fn round_trip_keeps_disabled_entries_and_flags() {
        let enabled = addon("https://a.example/manifest.json", "A");
        let mut disabled = addon("https://b.example/manifest.json", "B");
        disabled.is_enabled = false;
        disabled.disable_auto_update = true;
        disabled.selected = true;

        let raw = export_json(&[enabled, disabled]).expect("export");
        assert!(!raw.contains("selected"));

        let restored = parse_backup(&raw).expect("import");
        assert_eq!(restored.len(), 2);
        assert!(!restored[1].is_enabled);
        assert!(restored[1].disable_auto_update);
        assert!(!restored[1].selected);
    }

    #[test]
    fn import_collapses_duplicates() {
        let raw = r#"[
            { "transportUrl": "https://a.example/manifest.json?v=1",
              "manifest": { "id": "a", "version": "1.0.0", "name": "First" } },
            { "transportUrl": "https://a.example/manifest.json?v=2",
              "manifest": { "id": "a", "version": "1.0.0", "name": "Second" } }
        ]"#;
        let restored = parse_backup(raw).expect("import");
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].manifest.name, "First");
    }

    #[test]
    fn text_export_lines() {
        let list = vec![
            addon("https://a.example/manifest.json", "Alpha"),
            addon("https://b.example/manifest.json", "Beta"),
        ];
        let text = export_text(&list);
        assert_eq!(
            text,
            "Alpha: https://a.example/manifest.json\nBeta: https://b.example/manifest.json"
        );
    }
}
