// UI module for the emotion overlay application

use crate::models::Emotion;
use crate::poller::Poller;
use crate::render::{Canvas, LABEL_FONT_SIZE};
use std::time::{Duration, Instant};
use tracing::warn;

const LEGEND_TILE: f32 = 72.0;

/// Main application UI
pub struct EmotionOverlayApp {
    poller: Poller,
    endpoint: String,
    canvas_texture: Option<egui::TextureHandle>,
    canvas_revision: Option<u64>,
    alert: Option<&'static str>,
}

impl EmotionOverlayApp {
    /// Creates a new EmotionOverlayApp
    pub fn new(poller: Poller, endpoint: String) -> Self {
        Self {
            poller,
            endpoint,
            canvas_texture: None,
            canvas_revision: None,
            alert: None,
        }
    }

    fn toggle_detection(&mut self) {
        if self.poller.is_running() {
            self.poller.stop();
        } else if let Err(e) = self.poller.start(self.endpoint.trim()) {
            warn!("Detection not started: {}", e);
        }
    }

    /// Re-uploads the canvas texture when its contents changed
    fn update_canvas_texture(&mut self, ctx: &egui::Context) {
        let canvas = self.poller.canvas();
        if self.canvas_revision == Some(canvas.revision()) {
            return;
        }
        let (width, height) = canvas.dimensions();
        let color_image =
            egui::ColorImage::from_rgb([width as usize, height as usize], canvas.image().as_raw());
        self.canvas_texture =
            Some(ctx.load_texture("canvas", color_image, egui::TextureOptions::LINEAR));
        self.canvas_revision = Some(canvas.revision());
    }

    fn render_controls(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let label = if self.poller.is_running() {
                    "Stop Detection"
                } else {
                    "Start Detection"
                };
                // Toggling is locked while a frame is out
                let button = egui::Button::new(label).min_size(egui::vec2(160.0, 28.0));
                if ui.add_enabled(!self.poller.is_processing(), button).clicked() {
                    self.toggle_detection();
                }

                if self.poller.is_processing() {
                    ui.add(egui::Spinner::new());
                    ui.colored_label(egui::Color32::from_rgb(59, 130, 246), "Processing...");
                }
            });

            ui.add_space(4.0);
            ui.label("API URL");
            ui.add_enabled(
                !self.poller.is_running(),
                egui::TextEdit::singleline(&mut self.endpoint)
                    .hint_text("Enter the detection endpoint URL")
                    .desired_width(f32::INFINITY),
            );
            ui.add_space(6.0);
        });
    }

    fn render_indicator_and_legend(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("legend").show(ctx, |ui| {
            ui.add_space(6.0);
            if let Some(emotion) = self.poller.current_emotion() {
                let [r, g, b] = emotion.descriptor().color;
                egui::Frame::none()
                    .fill(egui::Color32::from_rgb(r, g, b))
                    .rounding(8.0)
                    .inner_margin(12.0)
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        ui.vertical_centered(|ui| {
                            ui.label(
                                egui::RichText::new(format!("{}  {}", emotion.emoji(), emotion.name()))
                                    .size(28.0)
                                    .color(egui::Color32::BLACK),
                            );
                        });
                    });
                ui.add_space(6.0);
            }

            ui.horizontal_wrapped(|ui| {
                for emotion in Emotion::ALL {
                    let [r, g, b] = emotion.descriptor().color;
                    egui::Frame::none()
                        .fill(egui::Color32::from_rgb(r, g, b))
                        .rounding(6.0)
                        .inner_margin(6.0)
                        .show(ui, |ui| {
                            ui.set_width(LEGEND_TILE);
                            ui.vertical_centered(|ui| {
                                ui.label(egui::RichText::new(emotion.emoji()).size(22.0));
                                ui.label(egui::RichText::new(emotion.name()).color(egui::Color32::BLACK));
                            });
                        });
                }
            });
            ui.add_space(6.0);
        });
    }

    /// Renders the canvas scaled to fit, with the overlay label painted on top
    fn render_canvas(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(texture) = &self.canvas_texture else {
                return;
            };
            let available = ui.available_rect_before_wrap();
            let canvas = self.poller.canvas();
            let rect = fit_rect(available, canvas);

            ui.painter().image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );

            if let Some(label) = canvas.label() {
                let scale = rect.width() / canvas.dimensions().0 as f32;
                ui.painter().text(
                    rect.min + egui::vec2(label.x, label.y) * scale,
                    egui::Align2::LEFT_BOTTOM,
                    &label.text,
                    egui::FontId::proportional(LABEL_FONT_SIZE * scale),
                    egui::Color32::WHITE,
                );
            }
        });
    }

    fn render_alert(&mut self, ctx: &egui::Context) {
        if let Some(fresh) = self.poller.take_alert() {
            self.alert = Some(fresh);
        }
        let Some(message) = self.alert else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new("Alert")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.alert = None;
        }
    }
}

/// Largest rect with the canvas aspect ratio centered inside `available`
fn fit_rect(available: egui::Rect, canvas: &Canvas) -> egui::Rect {
    let (width, height) = canvas.dimensions();
    let aspect_ratio = width as f32 / height as f32;

    let mut display_width = available.width();
    let mut display_height = display_width / aspect_ratio;
    if display_height > available.height() {
        display_height = available.height();
        display_width = display_height * aspect_ratio;
    }

    egui::Rect::from_center_size(available.center(), egui::vec2(display_width, display_height))
}

impl eframe::App for EmotionOverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poller.pump(Instant::now());

        if self.poller.is_running() || self.poller.is_processing() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        self.update_canvas_texture(ctx);

        self.render_controls(ctx);
        self.render_indicator_and_legend(ctx);
        self.render_canvas(ctx);
        self.render_alert(ctx);
    }
}
