use crate::{
    addon::{self, Addon, Manifest},
    api::{ApiError, Client},
};
use std::{sync::mpsc, thread};

/// What the sweep needs to know about one addon; snapshotted before the
/// workers start so the sweep never touches live list state.
#[derive(Debug, Clone)]
pub struct SweepTarget {
    pub transport_url: String,
    pub name: String,
    pub locked: bool,
    pub fingerprint: String,
}

impl SweepTarget {
    pub fn from_addon(entry: &Addon) -> Self {
        Self {
            transport_url: entry.transport_url.clone(),
            name: entry.display_name().to_string(),
            locked: entry.disable_auto_update,
            fingerprint: addon::manifest_fingerprint(&entry.manifest),
        }
    }
}

#[derive(Debug)]
pub struct SweepChange {
    pub transport_url: String,
    pub manifest: Manifest,
}

#[derive(Debug)]
pub struct SweepFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub changes: Vec<SweepChange>,
    pub failures: Vec<SweepFailure>,
    pub unchanged: usize,
    pub skipped: usize,
}

enum SweepReply {
    Changed(SweepChange),
    Unchanged,
    Failed(SweepFailure),
}

/// Addons the sweep never touches: the user locked them, the platform's
/// own catalog addon, or plain-http transports the service refuses.
pub fn should_skip(target: &SweepTarget) -> bool {
    let url = target.transport_url.as_str();
    target.locked
        || url.is_empty()
        || url.contains("cinemeta.strem.io")
        || (url.starts_with("http://") && !url.starts_with("https://"))
}

/// Fans out one manifest fetch per eligible addon and collects the
/// results. A single addon failing (or timing out) never aborts the
/// sweep for the others.
pub fn run_sweep(client: &Client, targets: Vec<SweepTarget>) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();
    let (tx, rx) = mpsc::channel::<SweepReply>();

    let mut in_flight = 0usize;
    for target in targets {
        if should_skip(&target) {
            outcome.skipped += 1;
            continue;
        }
        in_flight += 1;
        let tx = tx.clone();
        let client = client.clone();
        thread::spawn(move || {
            let reply = fetch_one(&client, &target);
            let _ = tx.send(reply);
        });
    }
    drop(tx);

    for _ in 0..in_flight {
        match rx.recv() {
            Ok(SweepReply::Changed(change)) => outcome.changes.push(change),
            Ok(SweepReply::Unchanged) => outcome.unchanged += 1,
            Ok(SweepReply::Failed(failure)) => outcome.failures.push(failure),
            Err(_) => break,
        }
    }

    outcome
}

fn fetch_one(client: &Client, target: &SweepTarget) -> SweepReply {
    match client.fetch_manifest(&target.transport_url) {
        Ok(manifest) => {
            if addon::manifest_fingerprint(&manifest) == target.fingerprint {
                SweepReply::Unchanged
            } else {
                SweepReply::Changed(SweepChange {
                    transport_url: target.transport_url.clone(),
                    manifest,
                })
            }
        }
        Err(ApiError::Timeout) => SweepReply::Failed(SweepFailure {
            name: target.name.clone(),
            error: "manifest fetch timed out".to_string(),
        }),
        Err(err) => SweepReply::Failed(SweepFailure {
            name: target.name.clone(),
            error: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str, locked: bool) -> SweepTarget {
        SweepTarget {
            transport_url: url.to_string(),
            name: "t".to_string(),
            locked,
            fingerprint: String::new(),
        }
    }

    #[test]
    fn skip_rules() {
        assert!(should_skip(&target("https://a.example/manifest.json", true)));
        assert!(should_skip(&target(
            "https://v3-cinemeta.strem.io/manifest.json",
            false
        )));
        assert!(should_skip(&target("http://plain.example/manifest.json", false)));
        assert!(should_skip(&target("", false)));
        assert!(!should_skip(&target(
            "https://a.example/manifest.json",
            false
        )));
    }
}
