mod addon;
mod api;
mod app;
mod config;
mod history;
mod importer;
mod ui;
mod update;
mod view;

use anyhow::{bail, Context, Result};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1).peekable();
    let mut export_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--export-backup" | "-e" => {
                if let Some(path) = args.next() {
                    export_path = Some(path);
                } else {
                    eprintln!("--export-backup requires a path");
                }
            }
            "--version" | "-V" => {
                println!("streamsmith {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("StreamSmith");
                println!("  --export-backup <path>   Write the cached addon list as JSON without the TUI");
                println!("  --version                Print the version");
                return Ok(());
            }
            _ => {}
        }
    }

    if let Some(path) = export_path {
        let Some(session) = config::SessionCache::load()? else {
            bail!("no cached session; log in through the TUI first");
        };
        let raw = importer::export_json(&session.addons)?;
        std::fs::write(&path, raw).with_context(|| format!("write {path}"))?;
        println!(
            "Exported {} addon(s) for {} to {path}",
            session.addons.len(),
            session.email
        );
        return Ok(());
    }

    let mut app = app::App::initialize()?;
    ui::run(&mut app)
}
