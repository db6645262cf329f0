use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

use eframe::egui::{Color32, DragValue, ProgressBar, RichText, TextEdit};
use rfd::FileDialog;

use libfermi_phased::config::{AnalysisMode, RunConfig};
use libfermi_phased::connection::ConnectionConfig;
use libfermi_phased::error::ProcessorError;
use libfermi_phased::process::{generate_run, job_targets, submit_jobs};
use libfermi_phased::settings::{
    Settings, EVENT_FILE, LOCAL_DIRECTORY, MODE, OPTIONAL_FIELDS,
    REMOTE_DIRECTORY, SPACECRAFT_FILE,
};
use libfermi_phased::worker_status::{TransferStage, TransferStatus};

const MAX_STATUS_LINES: usize = 200;

fn render_error_dialog(show: &mut bool, ctx: &eframe::egui::Context) {
    eframe::egui::Window::new("Error")
        .open(show)
        .show(ctx, |ui| {
            ui.label(
                "There was an error! Check the log file fermi_phased.log for more information.",
            )
        });
}

fn start_directory() -> PathBuf {
    std::env::current_dir().unwrap_or_default()
}

/// The UI app which inherits the eframe::App trait.
///
/// Generation runs on the UI thread; the upload runs on a single worker thread.
#[derive(Debug)]
pub struct PhasedApp {
    settings: Settings,
    mode: AnalysisMode,
    connection: ConnectionConfig,
    send_to_cluster: bool,
    status_log: Vec<String>,
    worker: Option<JoinHandle<Result<(), ProcessorError>>>, //transfer thread
    transfer_status: TransferStatus,
    show_error_window: bool,
    worker_rx: mpsc::Receiver<TransferStatus>,
    worker_tx: mpsc::Sender<TransferStatus>,
}

impl PhasedApp {
    /// Create the application
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut visuals = eframe::egui::Visuals::dark();
        visuals.override_text_color = Some(Color32::LIGHT_GRAY);
        cc.egui_ctx.set_visuals(visuals);
        cc.egui_ctx.set_theme(eframe::egui::Theme::Dark);
        let (tx, rx) = mpsc::channel::<TransferStatus>();
        PhasedApp {
            settings: Settings::template(),
            mode: AnalysisMode::default(),
            connection: ConnectionConfig::default(),
            send_to_cluster: false,
            status_log: vec![],
            worker: None,
            transfer_status: TransferStatus::default(),
            show_error_window: false,
            worker_rx: rx,
            worker_tx: tx,
        }
    }

    fn push_status(&mut self, message: String) {
        if self.status_log.len() == MAX_STATUS_LINES {
            self.status_log.remove(0);
        }
        self.status_log.push(message);
    }

    fn report_error(&mut self, message: String) {
        spdlog::error!("{}", message);
        self.push_status(format!("Error: {message}"));
        self.show_error_window = true;
    }

    /// Generate the scripts, then start the upload if requested
    fn generate(&mut self) {
        let config = match RunConfig::from_settings(&self.settings, self.mode) {
            Ok(c) => c,
            Err(e) => {
                self.report_error(e.to_string());
                return;
            }
        };
        if self.send_to_cluster {
            if let Err(e) = self.connection.validate() {
                self.report_error(e.to_string());
                return;
            }
        }
        match generate_run(&config, None) {
            Ok(jobs) => {
                let n_scripts: usize = jobs.iter().map(|j| j.n_scripts).sum();
                self.push_status(format!(
                    "Generated {n_scripts} scripts in {}",
                    config.common.local_directory.display()
                ));
                if self.send_to_cluster {
                    self.start_worker(job_targets(&jobs));
                }
            }
            Err(e) if e.is_warning() => {
                spdlog::warn!("{}", e);
                self.push_status(format!("Warning: {e}"));
            }
            Err(e) => self.report_error(e.to_string()),
        }
    }

    /// Start the transfer worker
    fn start_worker(&mut self, targets: Vec<(PathBuf, String)>) {
        // Safety first
        if self.worker.is_none() {
            let connection = self.connection.clone();
            let tx = self.worker_tx.clone();
            self.transfer_status = TransferStatus::default();
            self.push_status(format!("Connecting to {}...", connection.host));
            self.worker = Some(std::thread::spawn(move || {
                submit_jobs(connection, targets, tx)
            }));
        }
    }

    /// Join the worker once it is done
    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(res) => match res {
                    Ok(_) => {
                        spdlog::info!("Transfer complete");
                        self.push_status(String::from("All jobs submitted."));
                    }
                    Err(e) => self.report_error(format!("Transfer failed: {e}")),
                },
                Err(_) => self.report_error(String::from(
                    "An error occured joining the transfer worker!",
                )),
            }
        }
    }

    fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    fn poll_messages(&mut self) {
        // Check messages
        loop {
            match self.worker_rx.try_recv() {
                Ok(status) => {
                    match status.stage {
                        TransferStage::Uploading if !status.message.is_empty() => {
                            self.push_status(format!("Uploaded {}", status.message))
                        }
                        TransferStage::Submitting => {
                            self.push_status(format!("Submitting jobs in {}", status.message))
                        }
                        _ => (),
                    }
                    self.transfer_status = status;
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    spdlog::error!("Channels became disconnected!");
                    self.show_error_window = true;
                    break;
                }
            }
        }
    }

    /// Write the current Settings to a file
    fn write_settings(&mut self, path: &Path) {
        self.settings.set(MODE, self.mode.key());
        match self.settings.write_settings_file(path) {
            Ok(()) => self.push_status(format!("Settings saved to {}", path.display())),
            Err(e) => self.report_error(e.to_string()),
        }
    }

    /// Read the Settings from a file
    fn read_settings(&mut self, path: &Path) {
        match Settings::read_settings_file(path) {
            Ok(settings) => {
                match AnalysisMode::from_settings(&settings) {
                    Ok(mode) => self.mode = mode,
                    Err(e) => spdlog::warn!("{}", e),
                }
                self.settings = settings;
                self.push_status(format!("Settings loaded from {}", path.display()));
            }
            Err(e) => self.report_error(e.to_string()),
        }
    }

    fn write_connection(&mut self, path: &Path) {
        if let Err(e) = self.connection.write_config_file(path) {
            self.report_error(e.to_string());
        }
    }

    fn read_connection(&mut self, path: &Path) {
        match ConnectionConfig::read_config_file(path) {
            Ok(conn) => self.connection = conn,
            Err(e) => self.report_error(e.to_string()),
        }
    }

    fn render_menu(&mut self, ui: &mut eframe::egui::Ui) {
        ui.menu_button("File", |ui| {
            if ui.button("Open...").clicked() {
                if let Some(path) = FileDialog::new()
                    .set_directory(start_directory())
                    .add_filter("Settings file", &["yaml", "yml", "json"])
                    .pick_file()
                {
                    self.read_settings(&path);
                }
            }
            if ui.button("Save...").clicked() {
                if let Some(path) = FileDialog::new()
                    .set_directory(start_directory())
                    .add_filter("YAML file", &["yaml", "yml"])
                    .save_file()
                {
                    self.write_settings(&path);
                }
            }
            ui.separator();
            if ui.button("Open Connection...").clicked() {
                if let Some(path) = FileDialog::new()
                    .set_directory(start_directory())
                    .add_filter("YAML file", &["yaml", "yml"])
                    .pick_file()
                {
                    self.read_connection(&path);
                }
            }
            if ui.button("Save Connection...").clicked() {
                if let Some(path) = FileDialog::new()
                    .set_directory(start_directory())
                    .add_filter("YAML file", &["yaml", "yml"])
                    .save_file()
                {
                    self.write_connection(&path);
                }
            }
        });
    }

    fn render_settings(&mut self, ui: &mut eframe::egui::Ui) {
        eframe::egui::ComboBox::from_label("Mode")
            .selected_text(self.mode.to_string())
            .show_ui(ui, |ui| {
                for mode in AnalysisMode::ALL {
                    ui.selectable_value(&mut self.mode, mode, mode.to_string());
                }
            });

        let fields = self.mode.form_fields();
        let takes_lists = self.mode.takes_lists();

        eframe::egui::Grid::new("SettingsGrid")
            .num_columns(3)
            .show(ui, |ui| {
                for key in fields {
                    ui.label(key);
                    let edit = TextEdit::singleline(self.settings.entry_mut(key));
                    if takes_lists && libfermi_phased::config::is_list_field(key) {
                        ui.add(edit.hint_text("comma-separated, one per epoch"));
                    } else {
                        ui.add(edit);
                    }
                    ui.end_row();
                }

                //Remote directory
                ui.label(REMOTE_DIRECTORY);
                ui.text_edit_singleline(self.settings.entry_mut(REMOTE_DIRECTORY));
                ui.end_row();

                //Local directory
                ui.label(LOCAL_DIRECTORY);
                ui.text_edit_singleline(self.settings.entry_mut(LOCAL_DIRECTORY));
                if ui.button("Browse...").clicked() {
                    if let Some(path) = FileDialog::new()
                        .set_directory(start_directory())
                        .pick_folder()
                    {
                        self.settings
                            .set(LOCAL_DIRECTORY, &path.to_string_lossy());
                    }
                }
                ui.end_row();

                //FITS inputs
                for key in [SPACECRAFT_FILE, EVENT_FILE] {
                    ui.label(key);
                    ui.text_edit_singleline(self.settings.entry_mut(key));
                    if ui.button("Browse...").clicked() {
                        if let Some(path) = FileDialog::new()
                            .set_directory(start_directory())
                            .add_filter("FITS file", &["fits", "fit", "fits.gz"])
                            .pick_file()
                        {
                            self.settings.set(key, &path.to_string_lossy());
                        }
                    }
                    ui.end_row();
                }
            });

        eframe::egui::CollapsingHeader::new("Optional Settings").show(ui, |ui| {
            eframe::egui::Grid::new("OptionalGrid")
                .num_columns(2)
                .show(ui, |ui| {
                    for key in OPTIONAL_FIELDS {
                        ui.label(key);
                        ui.text_edit_singleline(self.settings.entry_mut(key));
                        ui.end_row();
                    }
                });
        });
    }

    fn render_connection(&mut self, ui: &mut eframe::egui::Ui) {
        ui.checkbox(&mut self.send_to_cluster, "Send to cluster");
        ui.add_enabled_ui(self.send_to_cluster, |ui| {
            eframe::egui::Grid::new("ConnectionGrid")
                .num_columns(3)
                .show(ui, |ui| {
                    ui.label("Host");
                    ui.text_edit_singleline(&mut self.connection.host);
                    ui.end_row();

                    ui.label("Port");
                    ui.add(DragValue::new(&mut self.connection.port).range(1..=65535));
                    ui.end_row();

                    ui.label("Username");
                    ui.text_edit_singleline(&mut self.connection.username);
                    ui.end_row();

                    ui.label(format!(
                        "Private key: {}",
                        self.connection.key_path.display()
                    ));
                    if ui.button("Browse...").clicked() {
                        if let Some(path) = FileDialog::new()
                            .set_directory(start_directory())
                            .pick_file()
                        {
                            self.connection.key_path = path;
                        }
                    }
                    ui.end_row();
                });
        });
    }
}

impl eframe::App for PhasedApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        self.poll_messages();
        render_error_dialog(&mut self.show_error_window, ctx);
        eframe::egui::CentralPanel::default().show(ctx, |ui| {
            //Menus
            self.render_menu(ui);

            eframe::egui::ScrollArea::vertical()
                .id_salt("FormScroll")
                .max_height(ui.available_height() * 0.7)
                .show(ui, |ui| {
                    //Settings
                    ui.separator();
                    ui.label(RichText::new("Settings").color(Color32::LIGHT_BLUE).size(18.0));
                    self.render_settings(ui);

                    //Connection
                    ui.separator();
                    ui.label(
                        RichText::new("Cluster")
                            .color(Color32::LIGHT_BLUE)
                            .size(18.0),
                    );
                    self.render_connection(ui);
                });

            //Controls
            ui.separator();
            ui.horizontal(|ui| {
                // You can only generate if there isn't already an upload going
                if ui
                    .add_enabled(
                        self.worker.is_none(),
                        eframe::egui::Button::new("Generate"),
                    )
                    .clicked()
                {
                    spdlog::info!("Generating {} scripts...", self.mode);
                    self.generate();
                }
                if ui
                    .add_enabled(self.worker.is_none(), eframe::egui::Button::new("Reset"))
                    .clicked()
                {
                    self.settings.reset();
                }
            });
            if self.worker.is_some() && !self.is_worker_alive() {
                self.poll_messages();
                self.stop_worker();
            }

            if self.worker.is_some() {
                ui.add(
                    ProgressBar::new(self.transfer_status.progress)
                        .text(format!(
                            "{} {} - {}%",
                            self.transfer_status.stage,
                            self.transfer_status.message,
                            (self.transfer_status.progress * 100.0) as i32
                        ))
                        .fill(Color32::DARK_GREEN),
                );
            }

            //Status log
            ui.separator();
            ui.label(RichText::new("Status").color(Color32::LIGHT_BLUE).size(18.0));
            eframe::egui::ScrollArea::vertical()
                .id_salt("StatusScroll")
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in self.status_log.iter() {
                        ui.label(line);
                    }
                });

            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        });
    }
}
