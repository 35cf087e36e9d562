mod altitude;
mod bridge;
mod compass;
mod config;
mod geo;
mod geocode;
mod map;
mod observer;
mod orchestrator;
mod status;
mod traffic;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use eframe::egui;
use log::{info, warn};
use tokio_util::sync::CancellationToken;
use tracker_link::{Client, LinkConfig};

use altitude::AltitudePane;
use bridge::GraphSample;
use compass::CompassPane;
use config::AppConfig;
use map::MapPane;
use orchestrator::PositionPoller;
use status::{DiagnosticLevel, SharedSystemStatus, SystemStatus};
use traffic::{SharedTrafficRegistry, SharedViewport, TrafficFeedConfig, TrafficRegistry};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const ACTIVE_GREEN: egui::Color32 = egui::Color32::from_rgb(76, 175, 80);
const IDLE_GREY: egui::Color32 = egui::Color32::from_rgb(70, 75, 80);

/// Ground-station dashboard for high-altitude balloon tracking
#[derive(Parser, Debug)]
#[command(name = "habtrack-desktop", version)]
struct Args {
    /// Telemetry backend address (host:port), overrides the config file
    #[arg(long)]
    backend: Option<String>,
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();
    let args = Args::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(backend) = args.backend {
        config.backend_address = backend;
    }

    info!("Starting HabTrack Desktop, backend at {}", config.backend_address);
    if let Ok(path) = AppConfig::get_config_path() {
        info!("Config file: {}", path.display());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("HabTrack Desktop"),
        ..Default::default()
    };

    eframe::run_native(
        "HabTrack Desktop",
        options,
        Box::new(|_cc| Ok(Box::new(StationApp::new(config)))),
    )
}

struct StationApp {
    status: SharedSystemStatus,
    map: MapPane,
    compass: CompassPane,
    altitude: AltitudePane,
    graph_rx: tokio::sync::mpsc::UnboundedReceiver<GraphSample>,
    cancel_token: CancellationToken,
}

impl StationApp {
    fn new(config: AppConfig) -> Self {
        let status = SystemStatus::shared();
        let viewport: SharedViewport = Arc::new(Mutex::new(None));
        let traffic_registry: SharedTrafficRegistry =
            Arc::new(Mutex::new(TrafficRegistry::new()));

        let (host_bridge, map_endpoint) = bridge::channel();
        let (graph_tx, graph_rx) = bridge::graph_channel();

        // One token cancels every recurring poll at shutdown
        let cancel_token = CancellationToken::new();

        let map = MapPane::new(
            map_endpoint,
            viewport.clone(),
            traffic_registry.clone(),
            config.default_zoom,
        );

        // All polling runs on a background runtime thread; the UI thread
        // only reads shared state and drains channels
        let task_status = status.clone();
        let task_cancel = cancel_token.clone();
        std::thread::spawn(move || {
            // Resolve the observer before the pollers start; bearing
            // updates are skipped entirely if this fails
            let observer = observer::resolve(&config);

            let rt = tokio::runtime::Runtime::new().expect("Failed to start tokio runtime");
            rt.block_on(async move {
                let client = Arc::new(Client::spawn(LinkConfig {
                    address: config.backend_address.clone(),
                    ..Default::default()
                }));

                let poller = PositionPoller::new(
                    client.clone(),
                    task_status.clone(),
                    host_bridge,
                    graph_tx,
                    observer,
                );
                tokio::spawn(poller.run(
                    Duration::from_secs(config.position_poll_secs.max(1)),
                    task_cancel.clone(),
                ));

                tokio::spawn(orchestrator::run_status_poll(
                    client.clone(),
                    task_status.clone(),
                    Duration::from_secs(config.status_poll_secs.max(1)),
                    task_cancel.clone(),
                ));

                if config.traffic_enabled {
                    let feed_config = TrafficFeedConfig {
                        endpoint: config
                            .traffic_endpoint
                            .clone()
                            .unwrap_or_else(|| TrafficFeedConfig::default().endpoint),
                        interval: Duration::from_secs(config.traffic_interval_secs.max(1)),
                    };
                    tokio::spawn(traffic::run_traffic_feed(
                        feed_config,
                        viewport,
                        traffic_registry,
                        task_cancel.clone(),
                    ));
                }

                task_status.lock().expect("status lock poisoned").add_diagnostic(
                    DiagnosticLevel::Info,
                    format!("Polling backend at {}", config.backend_address),
                );

                // Keep the runtime alive until shutdown; dropping the
                // client closes the backend link
                task_cancel.cancelled().await;
                client.shutdown();
            });
        });

        Self {
            status,
            map,
            compass: CompassPane::new(),
            altitude: AltitudePane::new(),
            graph_rx,
            cancel_token,
        }
    }

    fn draw_dashboard(&mut self, ui: &mut egui::Ui) {
        let now = chrono::Utc::now();
        ui.label(
            egui::RichText::new(format!("UTC {}", now.format("%H:%M:%S")))
                .size(18.0)
                .monospace()
                .strong(),
        );
        ui.label(
            egui::RichText::new(format!("Date: {}", now.format("%Y-%m-%d")))
                .size(11.0)
                .monospace(),
        );

        ui.add_space(8.0);

        let (lat, lng, alt, age, city, region, bearing) = {
            let status = self.status.lock().expect("status lock poisoned");
            (
                SystemStatus::coordinate_text(status.latitude),
                SystemStatus::coordinate_text(status.longitude),
                match status.altitude {
                    Some(alt) => format!("{:.0}m", alt),
                    None => "--".to_string(),
                },
                status.seconds_since_update(),
                status.city.clone(),
                status.region.clone(),
                status.bearing,
            )
        };

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("POSITION").size(10.0).monospace());
            if let Some(age) = age {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(format!("Last update: {}s ago", age))
                            .size(9.0)
                            .monospace()
                            .color(egui::Color32::from_rgb(140, 140, 140)),
                    );
                });
            }
        });
        ui.label(
            egui::RichText::new(format!("{}, {}  {}", lat, lng, alt))
                .size(14.0)
                .monospace(),
        );
        if !city.is_empty() || !region.is_empty() {
            ui.label(egui::RichText::new(format!("{}, {}", city, region)).size(11.0));
        }

        ui.add_space(8.0);
        ui.separator();

        // Link indicators
        let (aprs_active, iridium_active, aprs_validity, iridium_validity) = {
            let status = self.status.lock().expect("status lock poisoned");
            (
                status.aprs_active,
                status.iridium_active,
                status.aprs_validity.clone(),
                status.iridium_validity.clone(),
            )
        };
        draw_link_indicator(ui, "APRS", aprs_active, &aprs_validity);
        draw_link_indicator(ui, "IRIDIUM", iridium_active, &iridium_validity);

        ui.add_space(8.0);
        ui.separator();

        ui.label(egui::RichText::new("BEARING").size(10.0).monospace());
        if let Some(bearing) = bearing {
            self.compass.set_angle(bearing);
        }
        self.compass.show(ui);

        ui.add_space(8.0);
        ui.separator();

        ui.label(egui::RichText::new("ALTITUDE").size(10.0).monospace());
        self.altitude.show(ui);

        ui.add_space(8.0);
        if ui
            .add_enabled(self.map.has_position(), egui::Button::new("Recenter on balloon"))
            .clicked()
        {
            self.map.recenter_on_marker();
        }

        ui.add_space(8.0);
        ui.separator();

        // Console area: most recent diagnostics, newest last
        ui.label(egui::RichText::new("CONSOLE").size(10.0).monospace());
        egui::ScrollArea::vertical()
            .max_height(120.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                let status = self.status.lock().expect("status lock poisoned");
                for diagnostic in &status.diagnostics {
                    let color = match diagnostic.level {
                        DiagnosticLevel::Info => egui::Color32::from_rgb(160, 160, 160),
                        DiagnosticLevel::Warning => egui::Color32::from_rgb(255, 200, 50),
                        DiagnosticLevel::Error => egui::Color32::from_rgb(255, 90, 80),
                    };
                    ui.label(
                        egui::RichText::new(format!(
                            "{} {}",
                            diagnostic.timestamp.format("%H:%M:%S"),
                            diagnostic.message
                        ))
                        .size(9.0)
                        .monospace()
                        .color(color),
                    );
                }
            });
    }
}

fn draw_link_indicator(ui: &mut egui::Ui, name: &str, active: bool, validity: &[bool]) {
    ui.horizontal(|ui| {
        let fill = if active { ACTIVE_GREEN } else { IDLE_GREY };
        ui.add(egui::Button::new(egui::RichText::new(name).size(11.0).strong()).fill(fill));

        // One dot per link instance, in backend order
        for &valid in validity {
            let color = if valid {
                ACTIVE_GREEN
            } else {
                egui::Color32::from_rgb(220, 60, 50)
            };
            ui.label(egui::RichText::new("●").size(11.0).color(color));
        }
    });
}

impl eframe::App for StationApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Clock and poll results refresh without input events
        ctx.request_repaint_after(Duration::from_millis(100));

        self.map.process_messages();
        while let Ok(sample) = self.graph_rx.try_recv() {
            self.altitude.push_sample(sample);
        }

        egui::SidePanel::right("dashboard")
            .min_width(320.0)
            .show(ctx, |ui| {
                self.draw_dashboard(ui);
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.map.draw(ui);
            });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Page unload: every recurring poll goes down with this one token
        self.cancel_token.cancel();
    }
}
