use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

/// The addon's self-description document as served by the platform.
/// Unknown fields ride along in `extra` so nothing the service sent is
/// dropped when the list is written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub resources: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_prefixes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configurable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            id: String::new(),
            version: String::new(),
            name: String::new(),
            description: None,
            logo: None,
            types: Vec::new(),
            resources: Vec::new(),
            id_prefixes: None,
            configurable: None,
            behavior_hints: None,
            extra: Map::new(),
        }
    }
}

impl Manifest {
    pub fn resource_names(&self) -> String {
        if self.resources.is_empty() {
            return "None".to_string();
        }
        self.resources
            .iter()
            .map(|res| match res {
                Value::String(name) => name.clone(),
                Value::Object(map) => map
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                _ => "unknown".to_string(),
            })
            .collect::<Vec<String>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    #[default]
    Unchecked,
    Checking,
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubInfo {
    pub stars: u64,
    pub forks: u64,
    pub issues: u64,
    pub url: String,
}

/// One configured entry in the user's collection. The serialized form is
/// the durable shape (transport URL, manifest, local flags, passthrough
/// fields); everything marked `skip` is per-session UI state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub transport_url: String,
    pub manifest: Manifest,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub disable_auto_update: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub status: HealthStatus,
    #[serde(skip)]
    pub error_details: Option<String>,
    #[serde(skip)]
    pub selected: bool,
    #[serde(skip)]
    pub is_expanded: bool,
    #[serde(skip)]
    pub github_info: Option<GithubInfo>,
    #[serde(skip)]
    pub github_error: Option<String>,
    #[serde(skip)]
    pub is_loading_github: bool,
}

impl Addon {
    pub fn new(transport_url: String, manifest: Manifest) -> Self {
        let mut addon = Self {
            transport_url,
            manifest,
            is_enabled: true,
            disable_auto_update: false,
            extra: Map::new(),
            status: HealthStatus::Unchecked,
            error_details: None,
            selected: false,
            is_expanded: false,
            github_info: None,
            github_error: None,
            is_loading_github: false,
        };
        addon.reset_transient();
        addon
    }

    /// Maps a raw server/cache record into a working entry.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut addon: Addon = serde_json::from_value(value)?;
        addon.reset_transient();
        Ok(addon)
    }

    pub fn reset_transient(&mut self) {
        self.status = HealthStatus::Unchecked;
        self.error_details = None;
        self.selected = false;
        self.is_expanded = false;
        self.github_info = None;
        self.github_error = None;
        self.is_loading_github = false;
    }

    pub fn display_name(&self) -> &str {
        if self.manifest.name.is_empty() {
            "Unnamed Addon"
        } else {
            &self.manifest.name
        }
    }
}

/// Wire shape for `set-addons`: enabled entries only, with every
/// local/transient flag removed. Being in the payload at all is what
/// marks an addon enabled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddon {
    pub transport_url: String,
    pub manifest: Manifest,
    #[serde(skip_serializing_if = "is_false")]
    pub disable_auto_update: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !value
}

fn default_true() -> bool {
    true
}

pub fn save_payload(addons: &[Addon]) -> Vec<SavedAddon> {
    addons
        .iter()
        .filter(|addon| addon.is_enabled)
        .map(|addon| SavedAddon {
            transport_url: addon.transport_url.clone(),
            manifest: addon.manifest.clone(),
            disable_auto_update: addon.disable_auto_update,
            extra: addon.extra.clone(),
        })
        .collect()
}

/// Identity comparisons ignore the query string: the same addon installed
/// with different configuration parameters is still the same addon.
pub fn base_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

pub fn is_duplicate(addons: &[Addon], url: &str) -> bool {
    let base = base_url(url);
    addons
        .iter()
        .any(|addon| base_url(&addon.transport_url) == base)
}

/// Merges a freshly fetched server collection into the local list:
/// matched entries adopt the server manifest but keep the local display
/// name and both local-only flags, entries the server no longer has are
/// kept but force-disabled, and entries only the server has are appended.
pub fn reconcile(local: &[Addon], server: Vec<Addon>) -> Vec<Addon> {
    let mut server_slots: Vec<Option<Addon>> = server.into_iter().map(Some).collect();
    let mut by_url: HashMap<String, usize> = HashMap::new();
    for (index, slot) in server_slots.iter().enumerate() {
        if let Some(addon) = slot {
            by_url.entry(addon.transport_url.clone()).or_insert(index);
        }
    }

    let mut merged: Vec<Addon> = Vec::with_capacity(local.len());
    for local_addon in local {
        let taken = by_url
            .get(&local_addon.transport_url)
            .and_then(|index| server_slots[*index].take());
        match taken {
            Some(mut server_addon) => {
                server_addon.is_enabled = local_addon.is_enabled;
                server_addon.disable_auto_update = local_addon.disable_auto_update;
                server_addon.manifest.name = local_addon.manifest.name.clone();
                merged.push(server_addon);
            }
            None => {
                // Removed on another client; keep it around but never
                // silently re-submit it.
                let mut orphan = local_addon.clone();
                orphan.is_enabled = false;
                merged.push(orphan);
            }
        }
    }

    for slot in server_slots {
        if let Some(addon) = slot {
            merged.push(addon);
        }
    }

    merged
}

/// Replaces a manifest during an auto-update pass. The fresh copy wins,
/// except the local display name and any passthrough keys only the old
/// copy carries.
pub fn adopt_manifest(current: &Manifest, fresh: Manifest) -> Manifest {
    let mut merged = fresh;
    merged.name = current.name.clone();
    for (key, value) in &current.extra {
        merged
            .extra
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    merged
}

/// Canonical serialization of the fields the auto-update sweep compares.
/// Name is deliberately excluded: it is a local override.
pub fn manifest_fingerprint(manifest: &Manifest) -> String {
    serde_json::json!({
        "id": manifest.id,
        "version": manifest.version,
        "description": manifest.description,
        "logo": manifest.logo,
        "types": manifest.types,
        "resources": manifest.resources,
        "behaviorHints": manifest.behavior_hints,
        "configurable": manifest.configurable,
    })
    .to_string()
}

/// Fills the defaults the platform expects on a manually added manifest.
pub fn normalize_new_manifest(mut manifest: Manifest, url: &str) -> Manifest {
    if manifest.id.is_empty() {
        manifest.id = format!("external-{}", epoch_millis());
    }
    if manifest.version.is_empty() {
        manifest.version = "1.0.0".to_string();
    }
    if manifest.name.is_empty() {
        manifest.name = "New Addon".to_string();
    }
    if manifest.types.is_empty() {
        manifest.types = vec!["movie".to_string(), "series".to_string()];
    }
    if manifest
        .description
        .as_deref()
        .map(str::is_empty)
        .unwrap_or(true)
    {
        manifest.description = Some(format!("URL: {url}"));
    }
    manifest
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

pub fn configure_url(transport_url: &str) -> String {
    let base = transport_url
        .strip_suffix("/manifest.json")
        .unwrap_or(transport_url);
    format!("{base}/configure")
}

/// Looks for a GitHub repository behind an addon: a github.com link in
/// the manifest description or transport URL, or an owner.github.io
/// pages host.
pub fn github_repo_url(addon: &Addon) -> Option<String> {
    if let Some(description) = addon.manifest.description.as_deref() {
        if let Some(url) = extract_github_repo(description) {
            return Some(url);
        }
    }
    if let Some(url) = extract_github_repo(&addon.transport_url) {
        return Some(url);
    }
    extract_github_pages(&addon.transport_url)
}

fn extract_github_repo(text: &str) -> Option<String> {
    let start = text.find("github.com/")?;
    let rest = &text[start + "github.com/".len()..];
    let mut segments = rest.splitn(3, '/');
    let owner = take_slug(segments.next()?)?;
    let repo = take_slug(segments.next()?)?;
    Some(format!("https://github.com/{owner}/{repo}"))
}

fn extract_github_pages(url: &str) -> Option<String> {
    let host_start = url.find("://").map(|pos| pos + 3).unwrap_or(0);
    let rest = &url[host_start..];
    let mut parts = rest.splitn(2, '/');
    let host = parts.next()?;
    let owner = take_slug(host.strip_suffix(".github.io")?)?;
    let repo = take_slug(parts.next()?.split('/').next()?)?;
    Some(format!("https://github.com/{owner}/{repo}"))
}

fn take_slug(raw: &str) -> Option<String> {
    let slug: String = raw
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect();
    let slug = slug.trim_end_matches(".json").trim_end_matches('.');
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addon(url: &str, name: &str, enabled: bool) -> Addon {
        let mut manifest = Manifest::default();
        manifest.id = format!("test.{name}");
        manifest.version = "1.0.0".to_string();
        manifest.name = name.to_string();
        let mut addon = Addon::new(url.to_string(), manifest);
        addon.is_enabled = enabled;
        addon
    }

    #[test]
    fn reconcile_preserves_local_edits() {
        let mut local = addon("https://a.example/manifest.json", "X", false);
        local.disable_auto_update = true;

        let mut server = addon("https://a.example/manifest.json", "ServerName", true);
        server.manifest.version = "2.0".to_string();

        let merged = reconcile(&[local], vec![server]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].is_enabled);
        assert!(merged[0].disable_auto_update);
        assert_eq!(merged[0].manifest.name, "X");
        assert_eq!(merged[0].manifest.version, "2.0");
    }

    #[test]
    fn reconcile_disables_orphans_and_appends_new() {
        let local_a = addon("https://a.example/manifest.json", "A", true);
        let local_b = addon("https://b.example/manifest.json", "B", true);
        let server_a = addon("https://a.example/manifest.json", "A", true);
        let server_c = addon("https://c.example/manifest.json", "C", true);

        let merged = reconcile(&[local_a, local_b], vec![server_a, server_c]);
        let urls: Vec<&str> = merged
            .iter()
            .map(|entry| entry.transport_url.as_str())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://a.example/manifest.json",
                "https://b.example/manifest.json",
                "https://c.example/manifest.json",
            ]
        );
        assert!(merged[0].is_enabled);
        assert!(!merged[1].is_enabled, "orphan must survive disabled");
        assert!(merged[2].is_enabled);
    }

    #[test]
    fn duplicates_ignore_query_string() {
        let list = vec![addon("https://a.example/manifest.json?cfg=1", "A", true)];
        assert!(is_duplicate(&list, "https://a.example/manifest.json?cfg=2"));
        assert!(is_duplicate(&list, "https://a.example/manifest.json"));
        assert!(!is_duplicate(&list, "https://b.example/manifest.json"));
    }

    #[test]
    fn save_payload_is_enabled_only_and_durable_only() {
        let enabled = addon("https://a.example/manifest.json", "A", true);
        let mut disabled = addon("https://b.example/manifest.json", "B", false);
        disabled.selected = true;
        disabled.status = HealthStatus::Error;

        let payload = save_payload(&[enabled, disabled]);
        assert_eq!(payload.len(), 1);

        let value = serde_json::to_value(&payload).expect("serialize payload");
        let entry = &value[0];
        assert_eq!(entry["transportUrl"], "https://a.example/manifest.json");
        assert!(entry.get("isEnabled").is_none());
        assert!(entry.get("selected").is_none());
        assert!(entry.get("status").is_none());
        assert!(entry.get("isEditing").is_none());
        assert!(entry.get("errorDetails").is_none());
    }

    #[test]
    fn serialized_addon_has_no_transient_fields() {
        let mut entry = addon("https://a.example/manifest.json", "A", false);
        entry.selected = true;
        entry.is_expanded = true;
        entry.error_details = Some("boom".to_string());

        let value = serde_json::to_value(&entry).expect("serialize addon");
        assert_eq!(value["isEnabled"], false);
        assert!(value.get("selected").is_none());
        assert!(value.get("isExpanded").is_none());
        assert!(value.get("errorDetails").is_none());
        assert!(value.get("newLocalName").is_none());
    }

    #[test]
    fn adopt_manifest_keeps_local_name_and_extras() {
        let mut current = Manifest::default();
        current.name = "My Name".to_string();
        current.version = "1.0.0".to_string();
        current
            .extra
            .insert("localNote".to_string(), Value::String("keep".to_string()));

        let mut fresh = Manifest::default();
        fresh.name = "Upstream Name".to_string();
        fresh.version = "2.0.0".to_string();
        fresh
            .extra
            .insert("upstream".to_string(), Value::Bool(true));

        let merged = adopt_manifest(&current, fresh);
        assert_eq!(merged.name, "My Name");
        assert_eq!(merged.version, "2.0.0");
        assert_eq!(merged.extra["localNote"], "keep");
        assert_eq!(merged.extra["upstream"], true);
    }

    #[test]
    fn github_url_extraction() {
        let mut entry = addon("https://a.example/manifest.json", "A", true);
        entry.manifest.description =
            Some("Source: https://github.com/someone/addon-repo readme".to_string());
        assert_eq!(
            github_repo_url(&entry).as_deref(),
            Some("https://github.com/someone/addon-repo")
        );

        let pages = addon("https://someone.github.io/my-addon/manifest.json", "B", true);
        assert_eq!(
            github_repo_url(&pages).as_deref(),
            Some("https://github.com/someone/my-addon")
        );

        let plain = addon("https://a.example/manifest.json", "C", true);
        assert_eq!(github_repo_url(&plain), None);
    }

    #[test]
    fn manifest_passthrough_survives_round_trip() {
        let raw = serde_json::json!({
            "transportUrl": "https://a.example/manifest.json",
            "manifest": {
                "id": "test.a",
                "version": "1.0.0",
                "name": "A",
                "stremioAddonsConfig": { "issuer": "x" }
            },
            "flags": { "official": true }
        });
        let entry = Addon::from_value(raw).expect("map addon");
        assert!(entry.is_enabled, "missing isEnabled defaults to true");
        let back = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(back["flags"]["official"], true);
        assert_eq!(back["manifest"]["stremioAddonsConfig"]["issuer"], "x");
    }
}
