//! egui shell: button panel, rules list, output pane, password dialog.
//!
//! Presentation only. Every operation lives in the library modules and
//! runs synchronously on the UI thread; the deferred device search is
//! the single scheduling primitive, used so the "searching" message
//! paints before the blocking scan starts.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, RichText, Stroke};
use zeroize::Zeroizing;

use crate::cache::CredentialCache;
use crate::device::{self, SearchOutcome, SearchReport};
use crate::group::{self, GroupError, GroupStatus, Membership};
use crate::runner::{PrivilegedRunner, RunOutcome};
use crate::udev;

/// Delay between arming the device search and running it, long enough
/// for one repaint of the "searching" message.
const SEARCH_DELAY: Duration = Duration::from_millis(100);

const CANCELLED_MESSAGE: &str = "Operation cancelled.";

const INSTRUCTIONS: &str = "\
1. List Rules: display all Octavi-related udev rules.
2. Reload Rules: reload udev rules (requires sudo).
3. Trigger Rules: trigger udev rules (requires sudo).
4. Show Permissions: display permissions for hidraw devices.
5. View Logs: show hidraw-related kernel messages (requires sudo).
6. Create Rule: create a new udev rule for the Octavi (requires sudo).
7. Find Device: search for Octavi devices and set permissions (requires sudo).
8. Check Group: check and add the current user to plugdev (requires sudo).

Actions marked (requires sudo) prompt for your password. The password
stays cached in memory for ten minutes; the status dot turns red while
it is.";

/// Actions wired to the button panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ListRules,
    ReloadRules,
    TriggerRules,
    ShowPermissions,
    ViewLogs,
    CreateRule,
    FindDevice,
    CheckGroup,
}

impl Action {
    const ALL: [Self; 8] = [
        Self::ListRules,
        Self::ReloadRules,
        Self::TriggerRules,
        Self::ShowPermissions,
        Self::ViewLogs,
        Self::CreateRule,
        Self::FindDevice,
        Self::CheckGroup,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::ListRules => "List Rules",
            Self::ReloadRules => "Reload Rules",
            Self::TriggerRules => "Trigger Rules",
            Self::ShowPermissions => "Show Permissions",
            Self::ViewLogs => "View Logs",
            Self::CreateRule => "Create Rule",
            Self::FindDevice => "Find Device",
            Self::CheckGroup => "Check Group",
        }
    }

    fn needs_sudo(self) -> bool {
        !matches!(self, Self::ListRules | Self::ShowPermissions)
    }
}

/// Modal password dialog state.
struct PasswordDialog {
    action: Action,
    input: String,
}

/// Armed single-shot device search.
struct DeferredSearch {
    armed_at: Instant,
    password: Option<Zeroizing<String>>,
}

/// Top-level application state.
pub struct ManagerApp {
    runner: PrivilegedRunner,
    sudo_active: Rc<Cell<bool>>,
    rules: Vec<String>,
    selected_rule: Option<String>,
    output: String,
    highlight_log: bool,
    password_dialog: Option<PasswordDialog>,
    deferred: Option<DeferredSearch>,
}

impl ManagerApp {
    /// Build the app: fresh credential cache with the status observer
    /// wired to the indicator flag, then an initial rules listing.
    pub fn new() -> Self {
        let mut cache = CredentialCache::new();
        let sudo_active = Rc::new(Cell::new(false));
        let flag = Rc::clone(&sudo_active);
        cache.set_status_observer(Box::new(move |active| flag.set(active)));

        let mut app = Self {
            runner: PrivilegedRunner::new(cache),
            sudo_active,
            rules: Vec::new(),
            selected_rule: None,
            output: String::new(),
            highlight_log: false,
            password_dialog: None,
            deferred: None,
        };
        app.refresh_rules();
        app
    }

    fn refresh_rules(&mut self) {
        self.selected_rule = None;
        match udev::list_rule_files(Path::new(udev::RULES_DIR), udev::RULE_FILTER) {
            Ok(rules) => {
                self.output = if rules.is_empty() {
                    "No Octavi rules found.".to_owned()
                } else {
                    format!("Found {} Octavi rule(s).", rules.len())
                };
                self.rules = rules;
            }
            Err(err) => {
                self.rules.clear();
                self.output = format!("Error listing rules: {err}");
            }
        }
    }

    fn view_rule(&mut self, name: &str) {
        self.highlight_log = false;
        match udev::read_rule_file(Path::new(udev::RULES_DIR), name) {
            Ok(contents) => self.output = contents,
            Err(err) => self.output = format!("Error reading file: {err}"),
        }
        self.selected_rule = Some(name.to_owned());
    }

    /// Route a button press: sudo actions with no valid cached password
    /// go through the password dialog first.
    fn request_action(&mut self, ctx: &egui::Context, action: Action) {
        if action.needs_sudo() && !self.runner.cache().is_active() {
            self.password_dialog = Some(PasswordDialog {
                action,
                input: String::new(),
            });
        } else {
            self.perform(ctx, action, None);
        }
    }

    fn perform(&mut self, ctx: &egui::Context, action: Action, fresh: Option<Zeroizing<String>>) {
        self.highlight_log = false;
        let mut supplied = fresh;

        match action {
            Action::ListRules => self.refresh_rules(),
            Action::ShowPermissions => {
                self.output = match device::hidraw_permissions(Path::new(device::DEV_DIR)) {
                    Ok(text) => text,
                    Err(err) => format!("Error retrieving hidraw permissions: {err}"),
                };
            }
            Action::ReloadRules => {
                let mut prompt = move || supplied.take();
                let outcome = udev::reload_rules(&mut self.runner, &mut prompt);
                self.show_outcome(outcome);
            }
            Action::TriggerRules => {
                let mut prompt = move || supplied.take();
                let outcome = udev::trigger_rules(&mut self.runner, &mut prompt);
                self.show_outcome(outcome);
            }
            Action::ViewLogs => {
                let mut prompt = move || supplied.take();
                let outcome = device::kernel_log(&mut self.runner, &mut prompt);
                self.highlight_log = matches!(outcome, RunOutcome::Success(_));
                self.show_outcome(outcome);
            }
            Action::CreateRule => {
                let mut prompt = move || supplied.take();
                match udev::create_default_rule(&mut self.runner, &mut prompt) {
                    RunOutcome::Success(_) => {
                        self.output = "Udev rule created. Reload rules and trigger udev \
                                       for the change to take effect."
                            .to_owned();
                    }
                    RunOutcome::Cancelled => self.output = CANCELLED_MESSAGE.to_owned(),
                    RunOutcome::Failed(err) => {
                        self.output = format!("Error executing command: {err}");
                    }
                }
            }
            Action::FindDevice => {
                self.output = "Searching for Octavi IFR1 devices...".to_owned();
                self.deferred = Some(DeferredSearch {
                    armed_at: Instant::now(),
                    password: supplied,
                });
                ctx.request_repaint_after(SEARCH_DELAY);
            }
            Action::CheckGroup => {
                let user = whoami::username();
                let mut prompt = move || supplied.take();
                let result = group::ensure_plugdev_membership(&mut self.runner, &mut prompt, &user);
                self.output = match result {
                    Ok(status) => render_group_status(&status),
                    Err(GroupError::Cancelled) => CANCELLED_MESSAGE.to_owned(),
                    Err(err) => format!("Error checking group membership: {err}"),
                };
            }
        }
    }

    fn show_outcome(&mut self, outcome: RunOutcome) {
        self.output = match outcome {
            RunOutcome::Success(text) => text,
            RunOutcome::Cancelled => CANCELLED_MESSAGE.to_owned(),
            RunOutcome::Failed(err) => format!("Error executing command: {err}"),
        };
    }

    fn run_deferred_search(&mut self) {
        let Some(search) = self.deferred.take() else {
            return;
        };
        let mut supplied = search.password;
        let mut prompt = move || supplied.take();
        let result = device::find_and_grant(
            &mut self.runner,
            &mut prompt,
            Path::new(device::DEV_DIR),
            device::VENDOR_ID,
            device::PRODUCT_ID,
        );
        self.output = match result {
            Ok(SearchOutcome::Cancelled) => CANCELLED_MESSAGE.to_owned(),
            Ok(SearchOutcome::Report(report)) => render_search_report(&report),
            Err(err) => format!("Error searching for devices: {err}"),
        };
    }

    fn password_dialog_window(&mut self, ctx: &egui::Context) {
        if self.password_dialog.is_none() {
            return;
        }

        let mut submitted = false;
        let mut cancelled = false;
        if let Some(dialog) = self.password_dialog.as_mut() {
            egui::Window::new("Sudo Password")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.label("Enter sudo password:");
                    let response =
                        ui.add(egui::TextEdit::singleline(&mut dialog.input).password(true));
                    if !response.has_focus() {
                        response.request_focus();
                    }
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        submitted = true;
                    }
                    if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                        cancelled = true;
                    }
                    ui.horizontal(|ui| {
                        if ui.button("OK").clicked() {
                            submitted = true;
                        }
                        if ui.button("Cancel").clicked() {
                            cancelled = true;
                        }
                    });
                });
        }

        if submitted {
            if let Some(PasswordDialog { action, input }) = self.password_dialog.take() {
                self.perform(ctx, action, Some(Zeroizing::new(input)));
            }
        } else if cancelled {
            self.password_dialog = None;
            self.output = CANCELLED_MESSAGE.to_owned();
        }
    }
}

impl Default for ManagerApp {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ManagerApp {
    fn drop(&mut self) {
        // Shutdown path: the password must not outlive the window.
        self.runner.cache_mut().clear();
    }
}

impl eframe::App for ManagerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let search_due = self
            .deferred
            .as_ref()
            .is_some_and(|search| search.armed_at.elapsed() >= SEARCH_DELAY);
        if search_due {
            self.run_deferred_search();
        } else if self.deferred.is_some() {
            ctx.request_repaint_after(SEARCH_DELAY);
        }

        self.password_dialog_window(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.heading("Octavi IFR1 Manager");
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("Ver:{}", env!("CARGO_PKG_VERSION")));
                status_icon(ui, self.sudo_active.get());
            });
        });

        let mut clicked_action = None;
        let mut clicked_rule = None;
        egui::SidePanel::left("controls")
            .default_width(320.0)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                egui::Grid::new("actions")
                    .num_columns(2)
                    .spacing([8.0, 8.0])
                    .show(ui, |ui| {
                        for (i, action) in Action::ALL.into_iter().enumerate() {
                            let label = if action.needs_sudo() {
                                format!("{} \u{1F512}", action.label())
                            } else {
                                action.label().to_owned()
                            };
                            if ui
                                .add_sized([145.0, 32.0], egui::Button::new(label))
                                .clicked()
                            {
                                clicked_action = Some(action);
                            }
                            if i % 2 == 1 {
                                ui.end_row();
                            }
                        }
                    });

                ui.separator();
                ui.label(RichText::new("Octavi Rules").strong());
                egui::ScrollArea::vertical().id_salt("rules").show(ui, |ui| {
                    for name in &self.rules {
                        let selected = self.selected_rule.as_deref() == Some(name.as_str());
                        if ui.selectable_label(selected, name).clicked() {
                            clicked_rule = Some(name.clone());
                        }
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.label(RichText::new("Output").strong());
            let output_height = ui.available_height() * 0.6;
            egui::ScrollArea::vertical()
                .id_salt("output")
                .max_height(output_height)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    render_output(ui, &self.output, self.highlight_log);
                });
            ui.separator();
            ui.label(RichText::new("Instructions").strong());
            egui::ScrollArea::vertical()
                .id_salt("instructions")
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    ui.label(INSTRUCTIONS);
                });
        });

        if let Some(action) = clicked_action {
            self.request_action(ctx, action);
        }
        if let Some(name) = clicked_rule {
            self.view_rule(&name);
        }
    }
}

/// Red/gray dot showing whether a sudo password is cached.
fn status_icon(ui: &mut egui::Ui, active: bool) {
    let (rect, response) = ui.allocate_exact_size(egui::vec2(16.0, 16.0), egui::Sense::hover());
    let center = rect.center();
    let fill = if active {
        Color32::from_rgb(220, 50, 47)
    } else {
        Color32::from_rgb(128, 128, 128)
    };
    let painter = ui.painter();
    painter.circle_filled(center, 7.0, fill);
    let stroke = Stroke::new(1.5, Color32::WHITE);
    painter.line_segment(
        [center + egui::vec2(0.0, -4.0), center + egui::vec2(0.0, 1.0)],
        stroke,
    );
    painter.circle_filled(center + egui::vec2(0.0, 3.5), 1.0, Color32::WHITE);

    response.on_hover_text(if active {
        "Sudo password cached"
    } else {
        "Sudo password not cached"
    });
}

fn render_output(ui: &mut egui::Ui, output: &str, highlight: bool) {
    if highlight {
        for line in output.lines() {
            if line.to_lowercase().contains("octavi ifr1") {
                ui.label(RichText::new(line).monospace().strong());
            } else {
                ui.label(RichText::new(line).monospace());
            }
        }
    } else {
        ui.label(RichText::new(output).monospace());
    }
}

fn render_group_status(status: &GroupStatus) -> String {
    let mut out = String::new();
    if status.group_created {
        out.push_str("Created plugdev group.\n");
    }
    match status.membership {
        Membership::Added => {
            out.push_str(&format!(
                "Added user {} to the plugdev group.\nLog out and back in for the change to take effect.",
                status.user
            ));
        }
        Membership::AlreadyMember => {
            out.push_str(&format!(
                "User {} is already in the plugdev group.",
                status.user
            ));
        }
    }
    out
}

fn render_search_report(report: &SearchReport) -> String {
    if report.fixes.is_empty() {
        return "No Octavi IFR1 devices found.".to_owned();
    }
    let mut out = String::from("Found Octavi IFR1 device(s):\n");
    for fix in &report.fixes {
        out.push_str(&format!("{}\n{}\n", fix.device.display(), fix.detail));
    }
    out
}
