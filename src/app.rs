use crate::{
    addon::{self, Addon, GithubInfo, HealthStatus, Manifest},
    api::{ApiError, Client, Credentials, HealthReport, LoginData},
    config::{self, AppConfig, SessionCache},
    history::History,
    importer,
    update::{self, SweepOutcome, SweepTarget},
    view::{self, ListCounts, StatusFilter},
};
use anyhow::{Context, Result};
use arboard::Clipboard;
use std::{
    fs,
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
    time::{Duration, Instant},
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const SEARCH_DEBOUNCE_MS: u64 = 300;
const LOG_CAPACITY: usize = 200;
const TOAST_SECS: u64 = 3;
const AUTO_UPDATE_HOUR: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Password,
    Token,
    Monitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Email,
    Password,
    AuthKey,
    AdminKey,
    TargetEmail,
}

/// Buffered credentials on the login screen. Which fields are active
/// depends on the login mode; focus cycles through them.
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub mode: LoginMode,
    pub focus: LoginField,
    pub email: String,
    pub password: String,
    pub auth_key: String,
    pub admin_key: String,
    pub target_email: String,
}

impl LoginForm {
    fn new() -> Self {
        Self {
            mode: LoginMode::Password,
            focus: LoginField::Email,
            email: String::new(),
            password: String::new(),
            auth_key: String::new(),
            admin_key: String::new(),
            target_email: String::new(),
        }
    }

    pub fn fields(&self) -> &'static [LoginField] {
        match self.mode {
            LoginMode::Password => &[LoginField::Email, LoginField::Password],
            LoginMode::Token => &[LoginField::Email, LoginField::AuthKey],
            LoginMode::Monitor => &[LoginField::AdminKey, LoginField::TargetEmail],
        }
    }

    pub fn cycle_focus(&mut self) {
        let fields = self.fields();
        let position = fields
            .iter()
            .position(|field| *field == self.focus)
            .unwrap_or(0);
        self.focus = fields[(position + 1) % fields.len()];
    }

    pub fn cycle_mode(&mut self) {
        self.mode = match self.mode {
            LoginMode::Password => LoginMode::Token,
            LoginMode::Token => LoginMode::Monitor,
            LoginMode::Monitor => LoginMode::Password,
        };
        self.focus = self.fields()[0];
        self.password.clear();
        self.auth_key.clear();
        self.admin_key.clear();
    }

    pub fn buffer_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
            LoginField::AuthKey => &mut self.auth_key,
            LoginField::AdminKey => &mut self.admin_key,
            LoginField::TargetEmail => &mut self.target_email,
        }
    }

    pub fn field_value(&self, field: LoginField) -> &str {
        match field {
            LoginField::Email => &self.email,
            LoginField::Password => &self.password,
            LoginField::AuthKey => &self.auth_key,
            LoginField::AdminKey => &self.admin_key,
            LoginField::TargetEmail => &self.target_email,
        }
    }
}

pub fn login_field_label(field: LoginField) -> &'static str {
    match field {
        LoginField::Email => "Email",
        LoginField::Password => "Password",
        LoginField::AuthKey => "Auth key",
        LoginField::AdminKey => "Admin key",
        LoginField::TargetEmail => "Target email",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    AddAddonUrl,
    RenameAddon { url: String },
    EditTransportUrl { url: String },
    ImportPath,
    ExportBackupPath,
    ExportListPath,
    SearchAddons,
    ApiBaseUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing {
        prompt: String,
        buffer: String,
        purpose: InputPurpose,
        last_edit_at: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogChoice {
    Yes,
    No,
}

#[derive(Debug, Clone)]
pub enum DialogKind {
    RemoveAddon { url: String },
    RemoveSelected,
    Logout,
}

#[derive(Debug, Clone)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub yes_label: String,
    pub no_label: String,
    pub choice: DialogChoice,
    pub kind: DialogKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub expires_at: Instant,
}

#[derive(Debug, Clone)]
enum ManifestPurpose {
    AddAddon { url: String },
    EditUrl { original_url: String, new_url: String },
}

enum TaskMessage {
    LoginDone {
        result: Result<LoginData, ApiError>,
        email: String,
        monitoring: bool,
    },
    RefreshDone(Result<Vec<Addon>, ApiError>),
    SaveDone(Result<(), ApiError>),
    ManifestFetched {
        purpose: ManifestPurpose,
        result: Result<Manifest, ApiError>,
    },
    HealthResult {
        transport_url: String,
        result: Result<HealthReport, ApiError>,
    },
    GithubDone {
        transport_url: String,
        result: Result<GithubInfo, ApiError>,
    },
    SpeedDone {
        name: String,
        result: Result<u128, ApiError>,
    },
    SweepDone(SweepOutcome),
    LogoutDone(Result<(), ApiError>),
}

pub struct App {
    pub config: AppConfig,
    client: Client,
    pub screen: Screen,
    pub login_form: LoginForm,
    credentials: Option<Credentials>,
    pub email: String,
    pub monitoring: bool,
    pub addons: Vec<Addon>,
    pub history: History,
    pub filter: StatusFilter,
    pub search_query: String,
    pub input_mode: InputMode,
    pub selected: usize,
    pub move_mode: bool,
    move_origin: Option<Vec<Addon>>,
    pub dialog: Option<Dialog>,
    pub logs: Vec<LogEntry>,
    pub log_scroll: usize,
    pub toast: Option<Toast>,
    pub status: String,
    pub help_open: bool,
    pub should_quit: bool,
    busy: bool,
    health_remaining: usize,
    health_errors: usize,
    next_auto_update_at: Option<Instant>,
    clipboard: Option<Clipboard>,
    log_path: PathBuf,
    task_tx: Sender<TaskMessage>,
    task_rx: Receiver<TaskMessage>,
}

impl App {
    pub fn initialize() -> Result<App> {
        let config = AppConfig::load_or_create()?;
        let client = Client::new(&config.api_base_url);
        let log_path = config::log_file_path()?;
        let (task_tx, task_rx) = mpsc::channel();

        let mut app = App {
            config,
            client,
            screen: Screen::Login,
            login_form: LoginForm::new(),
            credentials: None,
            email: String::new(),
            monitoring: false,
            addons: Vec::new(),
            history: History::new(),
            filter: StatusFilter::All,
            search_query: String::new(),
            input_mode: InputMode::Normal,
            selected: 0,
            move_mode: false,
            move_origin: None,
            dialog: None,
            logs: Vec::new(),
            log_scroll: 0,
            toast: None,
            status: "Not logged in".to_string(),
            help_open: false,
            should_quit: false,
            busy: false,
            health_remaining: 0,
            health_errors: 0,
            next_auto_update_at: None,
            clipboard: None,
            log_path,
            task_tx,
            task_rx,
        };

        match SessionCache::load() {
            Ok(Some(session)) => {
                app.credentials = Some(Credentials {
                    auth_key: session.auth_key,
                    email: session.email.clone(),
                });
                app.email = session.email;
                app.monitoring = session.monitoring;
                app.addons = session.addons;
                app.screen = Screen::Main;
                app.status = format!("Session restored for {}", app.email);
                app.log_info(format!("Restored session for {}", app.email));
            }
            Ok(None) => {}
            Err(err) => {
                app.log_warn(format!("Session cache unreadable: {err:#}"));
            }
        }

        app.schedule_auto_update();
        Ok(app)
    }

    // --- view helpers ---

    pub fn visible_indices(&self) -> Vec<usize> {
        view::visible_indices(&self.addons, self.filter, &self.search_query)
    }

    pub fn selected_addon_index(&self) -> Option<usize> {
        self.visible_indices().get(self.selected).copied()
    }

    pub fn selected_addon(&self) -> Option<&Addon> {
        self.selected_addon_index()
            .and_then(|index| self.addons.get(index))
    }

    pub fn counts(&self) -> ListCounts {
        view::counts(&self.addons)
    }

    pub fn clamp_selection(&mut self) {
        let visible = self.visible_indices().len();
        if visible == 0 {
            self.selected = 0;
        } else if self.selected >= visible {
            self.selected = visible - 1;
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_logged_in(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.history.is_dirty()
    }

    fn can_mutate(&mut self) -> bool {
        if self.monitoring {
            // Monitoring is a capability gate, not an error: mutations
            // silently do nothing.
            return false;
        }
        if self.busy {
            self.set_toast("Another operation is in progress", ToastLevel::Warn);
            return false;
        }
        true
    }

    // --- tick / background plumbing ---

    pub fn tick(&mut self) {
        if let Some(toast) = &self.toast {
            if toast.expires_at <= Instant::now() {
                self.toast = None;
            }
        }

        self.apply_search_debounce();
        self.maybe_run_scheduled_update();
        self.poll_tasks();
    }

    fn apply_search_debounce(&mut self) {
        let pending = match &self.input_mode {
            InputMode::Editing {
                purpose: InputPurpose::SearchAddons,
                buffer,
                last_edit_at,
                ..
            } if last_edit_at.elapsed() >= Duration::from_millis(SEARCH_DEBOUNCE_MS)
                && *buffer != self.search_query =>
            {
                Some(buffer.clone())
            }
            _ => None,
        };
        if let Some(query) = pending {
            self.search_query = query;
            self.clamp_selection();
        }
    }

    fn maybe_run_scheduled_update(&mut self) {
        let due = self
            .next_auto_update_at
            .map(|at| at <= Instant::now())
            .unwrap_or(false);
        if !due {
            return;
        }
        self.schedule_auto_update();
        if self.config.auto_update_enabled
            && self.is_logged_in()
            && !self.monitoring
            && !self.busy
        {
            self.log_info("Running scheduled auto-update".to_string());
            self.run_auto_update(false);
        }
    }

    fn schedule_auto_update(&mut self) {
        if !self.config.auto_update_enabled {
            self.next_auto_update_at = None;
            return;
        }
        let now = OffsetDateTime::now_utc();
        let today_run = now.replace_time(time::Time::from_hms(AUTO_UPDATE_HOUR, 0, 0).unwrap_or(time::Time::MIDNIGHT));
        let next = if today_run > now {
            today_run
        } else {
            today_run + time::Duration::days(1)
        };
        let wait: Duration = (next - now)
            .try_into()
            .unwrap_or(Duration::from_secs(60 * 60));
        self.next_auto_update_at = Some(Instant::now() + wait);
    }

    fn poll_tasks(&mut self) {
        loop {
            match self.task_rx.try_recv() {
                Ok(message) => self.handle_task(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn handle_task(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::LoginDone {
                result,
                email,
                monitoring,
            } => self.finish_login(result, email, monitoring),
            TaskMessage::RefreshDone(result) => self.finish_refresh(result),
            TaskMessage::SaveDone(result) => self.finish_save(result),
            TaskMessage::ManifestFetched { purpose, result } => {
                self.finish_manifest_fetch(purpose, result)
            }
            TaskMessage::HealthResult {
                transport_url,
                result,
            } => self.finish_health_result(transport_url, result),
            TaskMessage::GithubDone {
                transport_url,
                result,
            } => self.finish_github(transport_url, result),
            TaskMessage::SpeedDone { name, result } => self.finish_speed(name, result),
            TaskMessage::SweepDone(outcome) => self.finish_sweep(outcome),
            TaskMessage::LogoutDone(result) => {
                if let Err(err) = result {
                    self.log_warn(format!("Server logout failed: {err}"));
                }
            }
        }
    }

    // --- login / session ---

    pub fn start_login(&mut self) {
        if self.busy {
            return;
        }
        let form = self.login_form.clone();
        let (email, monitoring) = match form.mode {
            LoginMode::Password | LoginMode::Token => {
                if form.mode == LoginMode::Password
                    && (form.email.trim().is_empty() || form.password.is_empty())
                {
                    self.set_toast("Email and password are required", ToastLevel::Error);
                    return;
                }
                if form.mode == LoginMode::Token && form.auth_key.trim().is_empty() {
                    self.set_toast("Auth key is required", ToastLevel::Error);
                    return;
                }
                let email = if form.email.trim().is_empty() {
                    "TokenAccessUser".to_string()
                } else {
                    form.email.trim().to_string()
                };
                (email, false)
            }
            LoginMode::Monitor => {
                if form.admin_key.trim().is_empty() || form.target_email.trim().is_empty() {
                    self.set_toast("Admin key and target email are required", ToastLevel::Error);
                    return;
                }
                (form.target_email.trim().to_string(), true)
            }
        };

        self.busy = true;
        self.status = "Logging in...".to_string();
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        thread::spawn(move || {
            let result = match form.mode {
                LoginMode::Password => client.login(form.email.trim(), &form.password),
                LoginMode::Token => client.login_with_key(form.auth_key.trim(), form.email.trim()),
                LoginMode::Monitor => {
                    client.monitor_login(form.admin_key.trim(), form.target_email.trim())
                }
            };
            let _ = tx.send(TaskMessage::LoginDone {
                result,
                email,
                monitoring,
            });
        });
    }

    fn finish_login(
        &mut self,
        result: Result<LoginData, ApiError>,
        email: String,
        monitoring: bool,
    ) {
        self.busy = false;
        match result {
            Ok(data) => {
                self.credentials = Some(Credentials {
                    auth_key: data.auth_key,
                    email: email.clone(),
                });
                self.email = email.clone();
                self.monitoring = monitoring;
                self.addons = data.addons;
                self.history.reset();
                self.screen = Screen::Main;
                self.selected = 0;
                self.filter = StatusFilter::All;
                self.search_query.clear();
                self.login_form.password.clear();
                self.login_form.admin_key.clear();
                self.persist_session();
                if monitoring {
                    self.status = format!("Monitoring {email} (read-only)");
                    self.set_toast(&format!("Monitoring {email}"), ToastLevel::Info);
                    self.log_info(format!("Monitoring session for {email}"));
                } else {
                    self.status = format!("Logged in as {email}");
                    self.set_toast("Login successful", ToastLevel::Success);
                    self.log_info(format!("Logged in as {email}"));
                }
            }
            Err(err) => {
                self.status = "Login failed".to_string();
                self.set_toast(&format!("Login failed: {err}"), ToastLevel::Error);
                self.log_error(format!("Login failed: {err}"));
            }
        }
    }

    pub fn request_logout(&mut self) {
        if self.dialog.is_some() {
            return;
        }
        self.dialog = Some(Dialog {
            title: "Log out".to_string(),
            message: if self.has_unsaved_changes() {
                "You have unsaved changes. Log out anyway?".to_string()
            } else {
                "Log out and clear the cached session?".to_string()
            },
            yes_label: "Log out".to_string(),
            no_label: "Stay".to_string(),
            choice: DialogChoice::No,
            kind: DialogKind::Logout,
        });
    }

    fn do_logout(&mut self) {
        if let Some(credentials) = self.credentials.take() {
            let client = self.client.clone();
            let tx = self.task_tx.clone();
            thread::spawn(move || {
                let _ = tx.send(TaskMessage::LogoutDone(client.logout(&credentials)));
            });
        }
        if let Err(err) = SessionCache::clear() {
            self.log_warn(format!("Could not clear session cache: {err:#}"));
        }
        self.email.clear();
        self.monitoring = false;
        self.addons.clear();
        self.history.reset();
        self.search_query.clear();
        self.filter = StatusFilter::All;
        self.selected = 0;
        self.move_mode = false;
        self.move_origin = None;
        self.screen = Screen::Login;
        self.status = "Not logged in".to_string();
        self.set_toast("Logged out", ToastLevel::Info);
        self.log_info("Logged out".to_string());
    }

    fn persist_session(&mut self) {
        let Some(credentials) = &self.credentials else {
            return;
        };
        let session = SessionCache {
            auth_key: credentials.auth_key.clone(),
            email: credentials.email.clone(),
            monitoring: self.monitoring,
            addons: self.addons.clone(),
        };
        if let Err(err) = session.save() {
            self.log_warn(format!("Could not write session cache: {err:#}"));
        }
    }

    // --- refresh / reconcile ---

    pub fn refresh_addons(&mut self) {
        if self.monitoring || self.busy {
            return;
        }
        let Some(credentials) = self.credentials.clone() else {
            return;
        };
        self.busy = true;
        self.status = "Refreshing addon list...".to_string();
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(TaskMessage::RefreshDone(client.get_addons(&credentials)));
        });
    }

    fn finish_refresh(&mut self, result: Result<Vec<Addon>, ApiError>) {
        self.busy = false;
        match result {
            Ok(server) => {
                self.addons = addon::reconcile(&self.addons, server);
                self.history.reset();
                self.deselect_all();
                self.persist_session();
                self.clamp_selection();
                self.status = "Addon list refreshed".to_string();
                self.set_toast("Addon list refreshed", ToastLevel::Success);
                self.log_info("Reconciled addon list with server".to_string());
            }
            Err(err) => {
                // Local list stays untouched; a failed reconciliation
                // must never half-apply.
                self.status = "Refresh failed".to_string();
                self.set_toast(&format!("Refresh failed: {err}"), ToastLevel::Error);
                self.log_error(format!("Refresh failed: {err}"));
            }
        }
    }

    // --- save ---

    pub fn save_order(&mut self) {
        if self.monitoring {
            return;
        }
        if self.busy {
            self.set_toast("Another operation is in progress", ToastLevel::Warn);
            return;
        }
        let Some(credentials) = self.credentials.clone() else {
            return;
        };
        let payload = addon::save_payload(&self.addons);
        self.busy = true;
        self.status = "Saving addon collection...".to_string();
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(TaskMessage::SaveDone(client.set_addons(&credentials, &payload)));
        });
    }

    fn finish_save(&mut self, result: Result<(), ApiError>) {
        self.busy = false;
        match result {
            Ok(()) => {
                self.history.reset();
                self.deselect_all();
                self.persist_session();
                self.status = "Saved".to_string();
                self.set_toast("Addon collection saved", ToastLevel::Success);
                self.log_info("Saved addon collection to server".to_string());
            }
            Err(err) => {
                // Pending edits stay undoable on failure.
                self.status = "Save failed".to_string();
                self.set_toast(&format!("Save failed: {err}"), ToastLevel::Error);
                self.log_error(format!("Save failed: {err}"));
            }
        }
    }

    // --- add / edit ---

    pub fn enter_add_addon(&mut self) {
        if self.monitoring {
            return;
        }
        self.open_input("Addon manifest URL", "", InputPurpose::AddAddonUrl);
    }

    fn add_addon(&mut self, url: String) {
        let url = url.trim().to_string();
        if !url.starts_with("http") {
            self.set_toast("Invalid URL", ToastLevel::Error);
            return;
        }
        if addon::is_duplicate(&self.addons, &url) {
            self.set_toast("Addon already exists", ToastLevel::Error);
            return;
        }
        if !self.can_mutate() {
            return;
        }
        self.busy = true;
        self.status = "Fetching manifest...".to_string();
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        let fetch_url = url.clone();
        thread::spawn(move || {
            let _ = tx.send(TaskMessage::ManifestFetched {
                purpose: ManifestPurpose::AddAddon { url: fetch_url },
                result: client.fetch_manifest(&url),
            });
        });
    }

    pub fn start_rename(&mut self) {
        if self.monitoring {
            return;
        }
        let Some(current) = self.selected_addon() else {
            return;
        };
        let url = current.transport_url.clone();
        let name = current.manifest.name.clone();
        self.open_input("New name", &name, InputPurpose::RenameAddon { url });
    }

    fn finish_rename(&mut self, url: String, new_name: String) {
        if !self.can_mutate() {
            return;
        }
        let new_name = new_name.trim().to_string();
        let Some(index) = self.addons.iter().position(|a| a.transport_url == url) else {
            return;
        };
        let old_name = self.addons[index].manifest.name.clone();
        if new_name.is_empty() || new_name == old_name {
            return;
        }
        self.history
            .record(&self.addons, format!("Renamed {old_name} to {new_name}"));
        self.addons[index].manifest.name = new_name;
        self.set_toast("Addon renamed", ToastLevel::Info);
    }

    pub fn start_edit_url(&mut self) {
        if self.monitoring {
            return;
        }
        let Some(current) = self.selected_addon() else {
            return;
        };
        let url = current.transport_url.clone();
        self.open_input(
            "New transport URL",
            &url.clone(),
            InputPurpose::EditTransportUrl { url },
        );
    }

    fn edit_transport_url(&mut self, original_url: String, new_url: String) {
        let new_url = new_url.trim().to_string();
        if new_url.is_empty() || new_url == original_url {
            return;
        }
        if !new_url.starts_with("http") {
            self.set_toast("Invalid URL", ToastLevel::Error);
            return;
        }
        let clashes = self.addons.iter().any(|a| {
            a.transport_url != original_url
                && addon::base_url(&a.transport_url) == addon::base_url(&new_url)
        });
        if clashes {
            self.set_toast("Addon already exists", ToastLevel::Error);
            return;
        }
        if !self.can_mutate() {
            return;
        }
        self.busy = true;
        self.status = "Validating new URL...".to_string();
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        let fetch_url = new_url.clone();
        thread::spawn(move || {
            let _ = tx.send(TaskMessage::ManifestFetched {
                purpose: ManifestPurpose::EditUrl {
                    original_url,
                    new_url: fetch_url.clone(),
                },
                result: client.fetch_manifest(&fetch_url),
            });
        });
    }

    fn finish_manifest_fetch(
        &mut self,
        purpose: ManifestPurpose,
        result: Result<Manifest, ApiError>,
    ) {
        self.busy = false;
        match purpose {
            ManifestPurpose::AddAddon { url } => match result {
                Ok(manifest) => {
                    // The list may have changed while the fetch ran.
                    if addon::is_duplicate(&self.addons, &url) {
                        self.set_toast("Addon already exists", ToastLevel::Error);
                        return;
                    }
                    let manifest = addon::normalize_new_manifest(manifest, &url);
                    let name = manifest.name.clone();
                    self.history.record(&self.addons, format!("Added {name}"));
                    self.addons.push(Addon::new(url, manifest));
                    self.status = format!("Added {name}");
                    self.set_toast(&format!("Added {name}"), ToastLevel::Success);
                    self.log_info(format!("Added addon {name}"));
                }
                Err(err) => {
                    self.status = "Add failed".to_string();
                    self.set_toast(&format!("Could not add addon: {err}"), ToastLevel::Error);
                    self.log_error(format!("Add addon failed: {err}"));
                }
            },
            ManifestPurpose::EditUrl {
                original_url,
                new_url,
            } => match result {
                Ok(manifest) => {
                    let Some(index) = self
                        .addons
                        .iter()
                        .position(|a| a.transport_url == original_url)
                    else {
                        return;
                    };
                    let name = self.addons[index].manifest.name.clone();
                    self.history
                        .record(&self.addons, format!("Updated URL for {name}"));
                    let entry = &mut self.addons[index];
                    entry.manifest = addon::adopt_manifest(&entry.manifest, manifest);
                    entry.transport_url = new_url;
                    entry.status = HealthStatus::Ok;
                    entry.error_details = None;
                    self.set_toast(&format!("Updated URL for {name}"), ToastLevel::Success);
                }
                Err(err) => {
                    self.status = "URL update failed".to_string();
                    self.set_toast(
                        &format!("New URL unreachable: {err}"),
                        ToastLevel::Error,
                    );
                    self.log_error(format!("Transport URL update failed: {err}"));
                }
            },
        }
    }

    // --- toggles / selection ---

    pub fn toggle_enabled(&mut self) {
        if !self.can_mutate() {
            return;
        }
        let Some(index) = self.selected_addon_index() else {
            return;
        };
        let name = self.addons[index].display_name().to_string();
        let description = if self.addons[index].is_enabled {
            format!("Disabled {name}")
        } else {
            format!("Enabled {name}")
        };
        self.history.record(&self.addons, description);
        let entry = &mut self.addons[index];
        entry.is_enabled = !entry.is_enabled;
        self.clamp_selection();
    }

    pub fn toggle_update_lock(&mut self) {
        if !self.can_mutate() {
            return;
        }
        let Some(index) = self.selected_addon_index() else {
            return;
        };
        let name = self.addons[index].display_name().to_string();
        let description = if self.addons[index].disable_auto_update {
            format!("Included {name} in auto-update")
        } else {
            format!("Excluded {name} from auto-update")
        };
        self.history.record(&self.addons, description);
        let entry = &mut self.addons[index];
        entry.disable_auto_update = !entry.disable_auto_update;
    }

    pub fn toggle_selected_mark(&mut self) {
        let Some(index) = self.selected_addon_index() else {
            return;
        };
        let entry = &mut self.addons[index];
        entry.selected = !entry.selected;
    }

    pub fn toggle_select_all(&mut self) {
        let visible = self.visible_indices();
        if visible.is_empty() {
            return;
        }
        let target = !visible.iter().all(|&index| self.addons[index].selected);
        for index in visible {
            self.addons[index].selected = target;
        }
    }

    pub fn deselect_all(&mut self) {
        for entry in &mut self.addons {
            entry.selected = false;
        }
    }

    pub fn enable_selected(&mut self) {
        self.bulk_set_enabled(true);
    }

    pub fn disable_selected(&mut self) {
        self.bulk_set_enabled(false);
    }

    fn bulk_set_enabled(&mut self, enabled: bool) {
        if !self.can_mutate() {
            return;
        }
        let changing: Vec<usize> = self
            .addons
            .iter()
            .enumerate()
            .filter(|(_, a)| a.selected && a.is_enabled != enabled)
            .map(|(index, _)| index)
            .collect();
        if changing.is_empty() {
            self.deselect_all();
            let message = if enabled {
                "Nothing to enable"
            } else {
                "Nothing to disable"
            };
            self.set_toast(message, ToastLevel::Info);
            return;
        }
        let description = if enabled {
            format!("Enabled {} addons", changing.len())
        } else {
            format!("Disabled {} addons", changing.len())
        };
        self.history.record(&self.addons, description);
        for index in changing.iter() {
            self.addons[*index].is_enabled = enabled;
        }
        self.deselect_all();
        let message = if enabled {
            format!("Enabled {} addons", changing.len())
        } else {
            format!("Disabled {} addons", changing.len())
        };
        self.set_toast(&message, ToastLevel::Success);
        self.clamp_selection();
    }

    // --- remove ---

    pub fn request_remove_selected_entry(&mut self) {
        if self.monitoring || self.dialog.is_some() {
            return;
        }
        let Some(current) = self.selected_addon() else {
            return;
        };
        let url = current.transport_url.clone();
        let name = current.display_name().to_string();
        if !self.config.confirm_remove {
            self.remove_addon(&url);
            return;
        }
        self.dialog = Some(Dialog {
            title: "Remove addon".to_string(),
            message: format!("Remove \"{name}\" from the list?"),
            yes_label: "Remove".to_string(),
            no_label: "Keep".to_string(),
            choice: DialogChoice::No,
            kind: DialogKind::RemoveAddon { url },
        });
    }

    fn remove_addon(&mut self, url: &str) {
        if !self.can_mutate() {
            return;
        }
        let Some(index) = self.addons.iter().position(|a| a.transport_url == url) else {
            return;
        };
        let name = self.addons[index].display_name().to_string();
        self.history.record(&self.addons, format!("Removed {name}"));
        self.addons.remove(index);
        self.clamp_selection();
        self.set_toast(&format!("Removed {name}"), ToastLevel::Info);
        self.log_info(format!("Removed addon {name}"));
    }

    pub fn request_remove_marked(&mut self) {
        if self.monitoring || self.dialog.is_some() {
            return;
        }
        let marked = self.addons.iter().filter(|a| a.selected).count();
        if marked == 0 {
            return;
        }
        self.dialog = Some(Dialog {
            title: "Remove addons".to_string(),
            message: format!("Remove {marked} selected addon(s)?"),
            yes_label: "Remove".to_string(),
            no_label: "Keep".to_string(),
            choice: DialogChoice::No,
            kind: DialogKind::RemoveSelected,
        });
    }

    fn remove_marked(&mut self) {
        if !self.can_mutate() {
            return;
        }
        let removed = self.addons.iter().filter(|a| a.selected).count();
        if removed == 0 {
            return;
        }
        self.history
            .record(&self.addons, format!("Removed {removed} addons"));
        self.addons.retain(|a| !a.selected);
        self.clamp_selection();
        self.set_toast(&format!("Removed {removed} addons"), ToastLevel::Success);
        self.log_info(format!("Removed {removed} addons"));
    }

    // --- undo / redo ---

    pub fn undo(&mut self) {
        if self.monitoring || self.busy {
            return;
        }
        match self.history.undo(&mut self.addons) {
            Ok(Some(description)) => {
                self.deselect_all();
                self.clamp_selection();
                self.set_toast(&format!("Undid: {description}"), ToastLevel::Info);
            }
            Ok(None) => {}
            Err(err) => {
                self.log_error(format!("Internal consistency error: {err}"));
            }
        }
    }

    pub fn redo(&mut self) {
        if self.monitoring || self.busy {
            return;
        }
        match self.history.redo(&mut self.addons) {
            Ok(Some(description)) => {
                self.deselect_all();
                self.clamp_selection();
                self.set_toast(&format!("Redid: {description}"), ToastLevel::Info);
            }
            Ok(None) => {}
            Err(err) => {
                self.log_error(format!("Internal consistency error: {err}"));
            }
        }
    }

    // --- reorder (move mode) ---

    pub fn enter_move_mode(&mut self) {
        if self.move_mode || !self.can_mutate() {
            return;
        }
        if self.selected_addon_index().is_none() {
            return;
        }
        self.move_mode = true;
        self.move_origin = Some(self.addons.clone());
        self.status = "Move mode: j/k move, g/G top/bottom, Enter apply, Esc cancel".to_string();
    }

    pub fn move_selected(&mut self, delta: isize) {
        if !self.move_mode {
            return;
        }
        let visible_len = self.visible_indices().len();
        if visible_len == 0 {
            return;
        }
        let from = self.selected.min(visible_len - 1);
        let to = if delta.is_negative() {
            from.saturating_sub(delta.unsigned_abs())
        } else {
            (from + delta as usize).min(visible_len - 1)
        };
        if view::reorder_visible(&mut self.addons, self.filter, &self.search_query, from, to) {
            self.selected = to;
        }
    }

    pub fn move_selected_top(&mut self) {
        if !self.move_mode {
            return;
        }
        let from = self.selected;
        if view::reorder_visible(&mut self.addons, self.filter, &self.search_query, from, 0) {
            self.selected = 0;
        }
    }

    pub fn move_selected_bottom(&mut self) {
        if !self.move_mode {
            return;
        }
        let visible_len = self.visible_indices().len();
        if visible_len == 0 {
            return;
        }
        let from = self.selected;
        let to = visible_len - 1;
        if view::reorder_visible(&mut self.addons, self.filter, &self.search_query, from, to) {
            self.selected = to;
        }
    }

    /// Ends a move session. One "Reordered" history entry is recorded
    /// for the whole session, and only when the full-list order actually
    /// changed; a drag that lands where it started leaves history and
    /// the dirty flag untouched.
    pub fn exit_move_mode(&mut self, commit: bool) {
        if !self.move_mode {
            return;
        }
        self.move_mode = false;
        let Some(origin) = self.move_origin.take() else {
            return;
        };
        let changed = origin.len() != self.addons.len()
            || origin
                .iter()
                .zip(self.addons.iter())
                .any(|(before, after)| before.transport_url != after.transport_url);
        if !commit {
            if changed {
                self.addons = origin;
                self.clamp_selection();
            }
            self.status = "Move canceled".to_string();
            return;
        }
        if changed {
            self.history.record_snapshot(origin, "Reordered addons");
            self.set_toast("Order updated", ToastLevel::Info);
        }
        self.status = "Ready".to_string();
    }

    // --- filters / search ---

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.selected = 0;
        self.status = format!("Filter: {}", self.filter.label());
    }

    pub fn enter_search(&mut self) {
        let query = self.search_query.clone();
        self.open_input("Search addons", &query, InputPurpose::SearchAddons);
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
        self.clamp_selection();
    }

    // --- health / speed / github ---

    pub fn check_all_status(&mut self) {
        if self.busy {
            self.set_toast("Another operation is in progress", ToastLevel::Warn);
            return;
        }
        if self.addons.is_empty() {
            return;
        }
        self.busy = true;
        self.health_remaining = self.addons.len();
        self.health_errors = 0;
        self.status = "Checking addon health...".to_string();
        self.set_toast("Checking addon health", ToastLevel::Info);

        let targets: Vec<String> = self
            .addons
            .iter_mut()
            .map(|entry| {
                entry.status = HealthStatus::Checking;
                entry.error_details = None;
                entry.transport_url.clone()
            })
            .collect();

        for transport_url in targets {
            let client = self.client.clone();
            let tx = self.task_tx.clone();
            thread::spawn(move || {
                let result = client.check_health(&transport_url);
                let _ = tx.send(TaskMessage::HealthResult {
                    transport_url,
                    result,
                });
            });
        }
    }

    fn finish_health_result(&mut self, transport_url: String, result: Result<HealthReport, ApiError>) {
        if let Some(entry) = self
            .addons
            .iter_mut()
            .find(|a| a.transport_url == transport_url)
        {
            match result {
                Ok(report) if report.ok => {
                    entry.status = HealthStatus::Ok;
                    entry.error_details = None;
                }
                Ok(report) => {
                    entry.status = HealthStatus::Error;
                    entry.error_details =
                        Some(report.details.unwrap_or_else(|| "Check failed".to_string()));
                    self.health_errors += 1;
                }
                Err(err) => {
                    entry.status = HealthStatus::Error;
                    entry.error_details = Some(err.to_string());
                    self.health_errors += 1;
                }
            }
        }

        self.health_remaining = self.health_remaining.saturating_sub(1);
        if self.health_remaining == 0 {
            self.busy = false;
            let errors = self.health_errors;
            let level = if errors > 0 {
                ToastLevel::Error
            } else {
                ToastLevel::Success
            };
            self.status = format!("Health check complete: {errors} error(s)");
            self.set_toast(&format!("Health check complete: {errors} error(s)"), level);
            self.log_info(format!("Health check finished with {errors} error(s)"));
        }
    }

    pub fn speed_test(&mut self) {
        if self.busy {
            return;
        }
        let Some(current) = self.selected_addon() else {
            return;
        };
        let url = current.transport_url.clone();
        let name = current.display_name().to_string();
        self.busy = true;
        self.status = format!("Speed testing {name}...");
        self.set_toast(&format!("Speed testing {name}"), ToastLevel::Info);
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        thread::spawn(move || {
            let result = client.probe(&url);
            let _ = tx.send(TaskMessage::SpeedDone { name, result });
        });
    }

    fn finish_speed(&mut self, name: String, result: Result<u128, ApiError>) {
        self.busy = false;
        match result {
            Ok(millis) => {
                self.status = format!("{name} responded in {millis} ms");
                self.set_toast(&format!("{name} responded in {millis} ms"), ToastLevel::Success);
            }
            Err(ApiError::Timeout) => {
                self.status = format!("Speed test timed out for {name}");
                self.set_toast(&format!("Speed test timed out for {name}"), ToastLevel::Error);
            }
            Err(err) => {
                self.status = "Speed test failed".to_string();
                self.set_toast(&format!("Speed test failed: {err}"), ToastLevel::Error);
            }
        }
    }

    pub fn toggle_details(&mut self) {
        let Some(index) = self.selected_addon_index() else {
            return;
        };
        let expanded = {
            let entry = &mut self.addons[index];
            entry.is_expanded = !entry.is_expanded;
            entry.is_expanded
        };
        if expanded {
            self.fetch_github_info(index);
        }
    }

    fn fetch_github_info(&mut self, index: usize) {
        let entry = &self.addons[index];
        if entry.github_info.is_some() || entry.is_loading_github {
            return;
        }
        let Some(repo_url) = addon::github_repo_url(entry) else {
            return;
        };
        let transport_url = entry.transport_url.clone();
        self.addons[index].is_loading_github = true;
        self.addons[index].github_error = None;
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        thread::spawn(move || {
            let result = client.github_info(&repo_url);
            let _ = tx.send(TaskMessage::GithubDone {
                transport_url,
                result,
            });
        });
    }

    fn finish_github(&mut self, transport_url: String, result: Result<GithubInfo, ApiError>) {
        let Some(entry) = self
            .addons
            .iter_mut()
            .find(|a| a.transport_url == transport_url)
        else {
            return;
        };
        entry.is_loading_github = false;
        match result {
            Ok(info) => entry.github_info = Some(info),
            Err(err) => entry.github_error = Some(err.to_string()),
        }
    }

    // --- auto-update sweep ---

    pub fn toggle_auto_update_enabled(&mut self) {
        self.config.auto_update_enabled = !self.config.auto_update_enabled;
        if let Err(err) = self.config.save() {
            self.log_warn(format!("Could not save config: {err:#}"));
        }
        self.schedule_auto_update();
        let message = if self.config.auto_update_enabled {
            "Auto-update enabled"
        } else {
            "Auto-update disabled"
        };
        self.set_toast(message, ToastLevel::Info);
    }

    pub fn run_auto_update(&mut self, manual: bool) {
        if self.monitoring {
            if manual {
                self.set_toast("Monitoring mode is read-only", ToastLevel::Error);
            }
            return;
        }
        if self.busy || !self.is_logged_in() {
            if manual {
                self.set_toast("Operation already in progress or not logged in", ToastLevel::Error);
            }
            return;
        }
        self.busy = true;
        self.status = "Checking for addon updates...".to_string();
        self.set_toast("Checking for addon updates", ToastLevel::Info);
        let targets: Vec<SweepTarget> = self.addons.iter().map(SweepTarget::from_addon).collect();
        let client = self.client.clone();
        let tx = self.task_tx.clone();
        thread::spawn(move || {
            let outcome = update::run_sweep(&client, targets);
            let _ = tx.send(TaskMessage::SweepDone(outcome));
        });
    }

    fn finish_sweep(&mut self, outcome: SweepOutcome) {
        for failure in &outcome.failures {
            self.log_warn(format!(
                "Auto-update failed for {}: {}",
                failure.name, failure.error
            ));
        }

        self.config.last_auto_update = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        if let Err(err) = self.config.save() {
            self.log_warn(format!("Could not save config: {err:#}"));
        }

        if outcome.changes.is_empty() {
            self.busy = false;
            let failed = outcome.failures.len();
            let level = if failed > 0 {
                ToastLevel::Error
            } else {
                ToastLevel::Success
            };
            self.status = "Addons are up to date".to_string();
            self.set_toast(&format!("No manifest changes ({failed} failed)"), level);
            self.log_info(format!(
                "Update sweep: {} unchanged, {} skipped, {failed} failed",
                outcome.unchanged, outcome.skipped
            ));
            return;
        }

        let mut adopted = 0;
        for change in outcome.changes {
            if let Some(entry) = self
                .addons
                .iter_mut()
                .find(|a| a.transport_url == change.transport_url)
            {
                entry.manifest = addon::adopt_manifest(&entry.manifest, change.manifest);
                adopted += 1;
            }
        }
        self.history.mark_dirty();
        self.log_info(format!(
            "Auto-update adopted {adopted} manifest(s), {} failed",
            outcome.failures.len()
        ));
        self.set_toast(&format!("Updated {adopted} addon(s), saving"), ToastLevel::Info);
        self.busy = false;
        self.save_order();
    }

    // --- import / export ---

    pub fn enter_import_mode(&mut self) {
        if self.monitoring {
            return;
        }
        self.open_input("Import backup from path", "", InputPurpose::ImportPath);
    }

    pub fn enter_export_backup(&mut self) {
        let default = default_export_path(&importer::backup_file_name());
        self.open_input("Export backup to path", &default, InputPurpose::ExportBackupPath);
    }

    pub fn enter_export_list(&mut self) {
        let default = default_export_path(&importer::list_file_name());
        self.open_input("Export list to path", &default, InputPurpose::ExportListPath);
    }

    fn import_backup(&mut self, path: String) {
        if !self.can_mutate() {
            return;
        }
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        let result = fs::read_to_string(path)
            .with_context(|| format!("read {path}"))
            .and_then(|raw| importer::parse_backup(&raw));
        match result {
            Ok(imported) => {
                let count = imported.len();
                self.history
                    .record(&self.addons, format!("Imported {count} addons"));
                self.addons = imported;
                self.deselect_all();
                self.clamp_selection();
                self.persist_session();
                self.status = format!("Imported {count} addons");
                self.set_toast(&format!("Imported {count} addons"), ToastLevel::Success);
                self.log_info(format!("Imported {count} addons from {path}"));
            }
            Err(err) => {
                self.set_toast(&format!("Import failed: {err:#}"), ToastLevel::Error);
                self.log_error(format!("Import failed: {err:#}"));
            }
        }
    }

    fn export_backup(&mut self, path: String) {
        if self.addons.is_empty() {
            self.set_toast("No addons to export", ToastLevel::Error);
            return;
        }
        let result = importer::export_json(&self.addons)
            .and_then(|raw| fs::write(path.trim(), raw).with_context(|| format!("write {path}")));
        match result {
            Ok(()) => {
                self.set_toast("Backup exported", ToastLevel::Success);
                self.log_info(format!("Exported backup to {}", path.trim()));
            }
            Err(err) => {
                self.set_toast(&format!("Export failed: {err:#}"), ToastLevel::Error);
                self.log_error(format!("Export failed: {err:#}"));
            }
        }
    }

    fn export_list(&mut self, path: String) {
        if self.addons.is_empty() {
            self.set_toast("No addons to export", ToastLevel::Error);
            return;
        }
        let raw = importer::export_text(&self.addons);
        match fs::write(path.trim(), raw).with_context(|| format!("write {path}")) {
            Ok(()) => {
                self.set_toast("List exported", ToastLevel::Success);
                self.log_info(format!("Exported list to {}", path.trim()));
            }
            Err(err) => {
                self.set_toast(&format!("Export failed: {err:#}"), ToastLevel::Error);
                self.log_error(format!("Export failed: {err:#}"));
            }
        }
    }

    // --- clipboard / external ---

    pub fn copy_manifest_url(&mut self) {
        let Some(current) = self.selected_addon() else {
            return;
        };
        let url = current.transport_url.clone();
        if self.copy_to_clipboard(&url) {
            self.set_toast("Manifest URL copied", ToastLevel::Success);
        } else {
            self.set_toast("Could not copy URL", ToastLevel::Error);
        }
    }

    pub fn open_configure(&mut self) {
        let Some(current) = self.selected_addon() else {
            return;
        };
        let url = addon::configure_url(&current.transport_url);
        self.open_external(&url);
    }

    fn copy_to_clipboard(&mut self, text: &str) -> bool {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(err) => {
                    self.log_warn(format!("Clipboard unavailable: {err}"));
                    return false;
                }
            }
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return false;
        };
        if let Err(err) = clipboard.set_text(text.to_string()) {
            self.log_warn(format!("Clipboard copy failed: {err}"));
            return false;
        }
        true
    }

    fn open_external(&mut self, target: &str) {
        let candidates = [
            ("xdg-open", vec![target]),
            ("gio", vec!["open", target]),
            ("kde-open5", vec![target]),
        ];
        for (command, args) in candidates {
            let launched = Command::new(command)
                .args(&args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false);
            if launched {
                self.status = "Opened configure page".to_string();
                return;
            }
        }
        self.set_toast("Could not open a browser", ToastLevel::Warn);
    }

    // --- input mode / dialogs ---

    fn open_input(&mut self, prompt: &str, initial: &str, purpose: InputPurpose) {
        self.input_mode = InputMode::Editing {
            prompt: prompt.to_string(),
            buffer: initial.to_string(),
            purpose,
            last_edit_at: Instant::now(),
        };
    }

    pub fn handle_submit(&mut self, purpose: InputPurpose, value: String) -> Result<()> {
        match purpose {
            InputPurpose::AddAddonUrl => self.add_addon(value),
            InputPurpose::RenameAddon { url } => self.finish_rename(url, value),
            InputPurpose::EditTransportUrl { url } => self.edit_transport_url(url, value),
            InputPurpose::ImportPath => self.import_backup(value),
            InputPurpose::ExportBackupPath => self.export_backup(value),
            InputPurpose::ExportListPath => self.export_list(value),
            InputPurpose::SearchAddons => {
                self.search_query = value.trim().to_string();
                self.clamp_selection();
            }
            InputPurpose::ApiBaseUrl => {
                let value = value.trim().trim_end_matches('/').to_string();
                if value.is_empty() {
                    return Ok(());
                }
                self.config.api_base_url = value;
                self.config.save()?;
                self.client = Client::new(&self.config.api_base_url);
                self.set_toast("API base URL updated", ToastLevel::Info);
            }
        }
        Ok(())
    }

    pub fn enter_api_base_url(&mut self) {
        let current = self.config.api_base_url.clone();
        self.open_input("API base URL", &current, InputPurpose::ApiBaseUrl);
    }

    pub fn dialog_toggle_choice(&mut self) {
        if let Some(dialog) = &mut self.dialog {
            dialog.choice = match dialog.choice {
                DialogChoice::Yes => DialogChoice::No,
                DialogChoice::No => DialogChoice::Yes,
            };
        }
    }

    pub fn dialog_set_choice(&mut self, choice: DialogChoice) {
        if let Some(dialog) = &mut self.dialog {
            dialog.choice = choice;
        }
    }

    pub fn dialog_confirm(&mut self) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };
        if dialog.choice == DialogChoice::No {
            return;
        }
        match dialog.kind {
            DialogKind::RemoveAddon { url } => self.remove_addon(&url),
            DialogKind::RemoveSelected => self.remove_marked(),
            DialogKind::Logout => self.do_logout(),
        }
    }

    // --- toasts / logs ---

    pub fn set_toast(&mut self, message: &str, level: ToastLevel) {
        self.toast = Some(Toast {
            message: message.to_string(),
            level,
            expires_at: Instant::now() + Duration::from_secs(TOAST_SECS),
        });
    }

    pub fn log_info(&mut self, message: String) {
        self.push_log(LogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: String) {
        self.push_log(LogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: String) {
        self.push_log(LogLevel::Error, message);
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        if self.log_scroll > 0 {
            self.log_scroll = self.log_scroll.saturating_add(1);
        }
        self.logs.push(LogEntry {
            level,
            message: message.clone(),
        });
        if self.logs.len() > LOG_CAPACITY {
            let overflow = self.logs.len() - LOG_CAPACITY;
            self.logs.drain(0..overflow);
            self.log_scroll = self.log_scroll.saturating_sub(overflow);
        }
        let _ = append_log_file(&self.log_path, level, &message);
    }

    pub fn scroll_log_up(&mut self, lines: usize) {
        self.log_scroll = self
            .log_scroll
            .saturating_add(lines)
            .min(self.logs.len().saturating_sub(1));
    }

    pub fn scroll_log_down(&mut self, lines: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    pub fn hint(&self) -> &'static str {
        if self.monitoring {
            "read-only | f filter  / search  Enter details  q quit"
        } else if self.move_mode {
            "j/k move  g/G top/bottom  Enter apply  Esc cancel"
        } else {
            "space toggle  m move  a add  r rename  d remove  u/U undo/redo  s save  R refresh  ? help"
        }
    }
}

pub fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &PathBuf, level: LogLevel, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "[{}] {}", log_level_label(level), message)
}

fn default_export_path(file_name: &str) -> String {
    std::env::current_dir()
        .map(|dir| dir.join(file_name).display().to_string())
        .unwrap_or_else(|_| file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_focus_cycles_within_mode() {
        let mut form = LoginForm::new();
        assert_eq!(form.focus, LoginField::Email);
        form.cycle_focus();
        assert_eq!(form.focus, LoginField::Password);
        form.cycle_focus();
        assert_eq!(form.focus, LoginField::Email);
    }

    #[test]
    fn mode_switch_resets_focus_and_clears_secrets() {
        let mut form = LoginForm::new();
        form.password = "hunter2".to_string();
        form.cycle_mode();
        assert_eq!(form.mode, LoginMode::Token);
        assert_eq!(form.focus, LoginField::Email);
        assert!(form.password.is_empty());

        form.cycle_mode();
        assert_eq!(form.mode, LoginMode::Monitor);
        assert_eq!(form.focus, LoginField::AdminKey);

        form.cycle_mode();
        assert_eq!(form.mode, LoginMode::Password);
    }

    #[test]
    fn buffer_follows_focus() {
        let mut form = LoginForm::new();
        form.buffer_mut().push_str("a@b.c");
        assert_eq!(form.email, "a@b.c");
        form.cycle_focus();
        form.buffer_mut().push_str("pw");
        assert_eq!(form.password, "pw");
        assert_eq!(form.field_value(LoginField::Email), "a@b.c");
    }

    fn sample_addon(url: &str, name: &str) -> Addon {
        let manifest = Manifest {
            id: format!("org.example.{}", name.to_lowercase()),
            version: "1.0.0".to_string(),
            name: name.to_string(),
            ..Manifest::default()
        };
        Addon::new(url.to_string(), manifest)
    }

    fn test_app() -> App {
        let (task_tx, task_rx) = mpsc::channel();
        App {
            config: AppConfig {
                api_base_url: "http://localhost:3000".to_string(),
                auto_update_enabled: false,
                last_auto_update: None,
                confirm_remove: true,
            },
            client: Client::new("http://localhost:3000"),
            screen: Screen::Main,
            login_form: LoginForm::new(),
            credentials: Some(Credentials {
                auth_key: "key".to_string(),
                email: "a@b.c".to_string(),
            }),
            email: "a@b.c".to_string(),
            monitoring: false,
            addons: Vec::new(),
            history: History::new(),
            filter: StatusFilter::All,
            search_query: String::new(),
            input_mode: InputMode::Normal,
            selected: 0,
            move_mode: false,
            move_origin: None,
            dialog: None,
            logs: Vec::new(),
            log_scroll: 0,
            toast: None,
            status: "Ready".to_string(),
            help_open: false,
            should_quit: false,
            busy: false,
            health_remaining: 0,
            health_errors: 0,
            next_auto_update_at: None,
            clipboard: None,
            log_path: std::env::temp_dir().join("streamsmith-test.log"),
            task_tx,
            task_rx,
        }
    }

    #[test]
    fn save_is_blocked_while_another_operation_runs() {
        let mut app = test_app();
        app.addons
            .push(sample_addon("https://a.example.com/manifest.json", "Alpha"));
        app.busy = true;

        app.save_order();
        assert_ne!(app.status, "Saving addon collection...");
        assert!(app.toast.is_some());
    }

    #[test]
    fn quick_mutations_are_blocked_while_busy() {
        let mut app = test_app();
        app.addons
            .push(sample_addon("https://a.example.com/manifest.json", "Alpha"));
        app.busy = true;

        app.toggle_enabled();
        assert!(app.addons[0].is_enabled);

        app.finish_rename(
            "https://a.example.com/manifest.json".to_string(),
            "Beta".to_string(),
        );
        assert_eq!(app.addons[0].manifest.name, "Alpha");

        app.remove_addon("https://a.example.com/manifest.json");
        assert_eq!(app.addons.len(), 1);

        assert!(!app.history.can_undo());
        assert!(!app.has_unsaved_changes());
    }

    #[test]
    fn noop_move_session_records_nothing() {
        let mut app = test_app();
        app.addons
            .push(sample_addon("https://a.example.com/manifest.json", "Alpha"));
        app.addons
            .push(sample_addon("https://b.example.com/manifest.json", "Beta"));

        app.enter_move_mode();
        assert!(app.move_mode);
        app.move_selected(1);
        app.move_selected(-1);
        app.exit_move_mode(true);

        assert!(!app.history.can_undo());
        assert!(!app.has_unsaved_changes());
        assert_eq!(app.addons[0].manifest.name, "Alpha");
    }

    #[test]
    fn move_session_records_one_entry_on_net_change() {
        let mut app = test_app();
        app.addons
            .push(sample_addon("https://a.example.com/manifest.json", "Alpha"));
        app.addons
            .push(sample_addon("https://b.example.com/manifest.json", "Beta"));
        app.addons
            .push(sample_addon("https://c.example.com/manifest.json", "Gamma"));

        app.enter_move_mode();
        app.move_selected(1);
        app.move_selected(1);
        app.exit_move_mode(true);

        assert_eq!(app.history.undo_depth(), 1);
        assert!(app.has_unsaved_changes());
        assert_eq!(app.addons[2].manifest.name, "Alpha");
    }
}
