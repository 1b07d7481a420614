//! Main crop dialog application.
//!
//! This module contains the `CropDialogApp` struct which implements the
//! `eframe::App` trait for the interactive crop window.

use super::rendering::{crop_to_screen, draw_crop_border, draw_crop_overlay, to_color_image};
use super::selection::{process_drag_event, DragMode};
use super::settings::Settings;
use super::state::{Banner, DialogResult, UploadEvent};
use crate::aspect::PRESETS;
use crate::config::Config;
use crate::dialog::{
    crop_and_upload, reduce, Action, DialogState, Notice, Phase, FAILURE_MESSAGE, SUCCESS_MESSAGE,
};
use crate::error::{AppError, Result};
use crate::geometry::{ImageDimensions, SourceRect};
use crate::preview::{render_preview, HeaderOverlay, PREVIEW_HEIGHT, PREVIEW_WIDTH};
use crate::source::{display_size, SourceImage};
use crate::transform::{MAX_ROTATION, MAX_SCALE, MIN_SCALE};
use crate::upload::HttpImageStore;
use eframe::egui;
use image::DynamicImage;
use log::{error, info, warn};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Largest area the image is displayed in.
const MAX_DISPLAY_WIDTH: f32 = 800.0;
const MAX_DISPLAY_HEIGHT: f32 = 500.0;
/// Longest side of the downscaled copy the live preview samples from.
const PREVIEW_SOURCE_SIDE: u32 = 1200;
const PINNED_HINT: &str = "Ingesteld via omgeving of opdrachtregel";

/// The interactive crop dialog.
///
/// Shows the image with the crop box, the preset and transform controls, a
/// live preview, and uploads the result on confirm.
pub struct CropDialogApp {
    // Image state
    image_texture: Option<egui::TextureHandle>,
    /// Pre-converted image data for fast texture upload
    color_image: Option<egui::ColorImage>,
    source: SourceImage,
    /// Downscaled copy for the live preview
    preview_image: DynamicImage,
    preview_texture: Option<egui::TextureHandle>,
    preview_dirty: bool,
    overlay: HeaderOverlay,

    // Dialog state
    state: DialogState,
    drag: DragMode,
    pub result: Arc<Mutex<DialogResult>>,

    // Upload state
    config: Config,
    store: HttpImageStore,
    rx: Receiver<UploadEvent>,
    tx: Sender<UploadEvent>,
    banner: Option<Banner>,

    // Settings
    settings: Settings,
    show_settings: bool,
}

impl CropDialogApp {
    /// Creates a new crop dialog.
    ///
    /// # Arguments
    /// * `source` - The loaded source image
    /// * `result` - Shared result container for returning the stored path
    /// * `config` - Application configuration
    pub fn new(source: SourceImage, result: Arc<Mutex<DialogResult>>, config: Config) -> Result<Self> {
        let (tx, rx) = channel();
        let settings = Settings::load(&config);
        let effective = settings.apply_to(&config);
        let store = HttpImageStore::new(&effective)?;
        let overlay = HeaderOverlay::from_config(&effective);

        // Pre-convert image to ColorImage for fast texture upload
        let image_buffer = source.image.to_rgba8();
        let size = [source.image.width() as usize, source.image.height() as usize];
        let pixels = image_buffer.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());

        let preview_image = source.image.thumbnail(PREVIEW_SOURCE_SIDE, PREVIEW_SOURCE_SIDE);

        let natural = (source.image.width(), source.image.height());
        let displayed = display_size(natural, MAX_DISPLAY_WIDTH, MAX_DISPLAY_HEIGHT);
        let state = [
            Action::PresetSelected(settings.preset_index()),
            Action::ImageLoaded(ImageDimensions::new(natural, displayed)),
        ]
        .into_iter()
        .fold(DialogState::default(), |state, action| reduce(&state, action));

        Ok(Self {
            image_texture: None,
            color_image: Some(color_image),
            source,
            preview_image,
            preview_texture: None,
            preview_dirty: true,
            overlay,
            state,
            drag: DragMode::Idle,
            result,
            config,
            store,
            rx,
            tx,
            banner: None,
            settings,
            show_settings: false,
        })
    }

    fn dispatch(&mut self, action: Action) {
        let next = reduce(&self.state, action);
        if next != self.state {
            self.preview_dirty = true;
            self.state = next;
        }
    }

    fn show_notice(&mut self, ctx: &egui::Context, notice: Notice) {
        let shown_at = ctx.input(|i| i.time);
        self.banner = Some(Banner { notice, shown_at });
    }

    /// Starts export and upload of the completed crop.
    ///
    /// Spawns a background thread with its own runtime; the outcome comes
    /// back through the channel.
    fn submit(&mut self) {
        let Some(source) = self.state.source_rect() else {
            return;
        };
        if !self.state.can_confirm() {
            return;
        }

        // Save settings before uploading
        if let Err(e) = self.settings.save() {
            warn!("Failed to save settings: {}", e);
        }

        self.dispatch(Action::ConfirmStarted);

        let tx = self.tx.clone();
        let image = self.source.image.clone();
        let name = self.source.name.clone();
        let params = self.state.params;
        let destination = self.settings.apply_to(&self.config).destination;
        let store = self.store.clone();

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();

            let event = match runtime {
                Ok(rt) => {
                    let result = rt.block_on(crop_and_upload(
                        &store,
                        &image,
                        source,
                        &params,
                        &destination,
                        &name,
                    ));
                    match result {
                        Ok(path) => UploadEvent::Stored(path),
                        Err(e) => UploadEvent::Failed(format!("{:?}", e)),
                    }
                }
                Err(e) => UploadEvent::Failed(format!("Failed to create async runtime: {}", e)),
            };
            let _ = tx.send(event);
        });
    }

    /// Processes upload events from the background thread.
    fn process_upload_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                UploadEvent::Stored(path) => {
                    info!("Crop stored at {}", path);
                    self.dispatch(Action::ConfirmSucceeded);
                    if let Ok(mut result) = self.result.lock() {
                        result.stored_path = Some(path);
                    }
                    self.show_notice(ctx, Notice::Success(SUCCESS_MESSAGE.to_string()));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                UploadEvent::Failed(err) => {
                    error!("Crop failed: {}", err);
                    self.dispatch(Action::ConfirmFailed);
                    self.show_notice(ctx, Notice::Failure(FAILURE_MESSAGE.to_string()));
                }
            }
        }
    }

    /// Re-renders the live preview if anything changed since the last frame.
    fn refresh_preview(&mut self, ctx: &egui::Context) {
        if !self.preview_dirty {
            return;
        }
        self.preview_dirty = false;

        let Some(source) = self.state.live_source_rect() else {
            return;
        };

        // the preview samples from the downscaled copy
        let factor = self.preview_image.width() as f32 / self.source.image.width() as f32;
        let scaled = SourceRect {
            x: source.x * factor,
            y: source.y * factor,
            width: source.width * factor,
            height: source.height * factor,
        };

        match render_preview(&self.preview_image, scaled, &self.state.params, Some(&self.overlay)) {
            Ok(bitmap) => {
                let color_image = to_color_image(&bitmap);
                match &mut self.preview_texture {
                    Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
                    None => {
                        self.preview_texture =
                            Some(ctx.load_texture("preview", color_image, egui::TextureOptions::LINEAR));
                    }
                }
            }
            Err(e) => warn!("Preview failed: {}", e),
        }
    }

    /// Renders the image with the crop box and handles dragging.
    fn render_image_area(&mut self, ui: &mut egui::Ui) {
        let Some(dims) = self.state.dimensions else {
            return;
        };
        let (image_rect, response) = ui.allocate_exact_size(
            egui::vec2(dims.displayed_width, dims.displayed_height),
            egui::Sense::drag(),
        );

        if let Some(texture) = &self.image_texture {
            ui.painter().image(
                texture.id(),
                image_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        if self.state.phase == Phase::Editing {
            let actions = process_drag_event(&response, image_rect, &self.state, &mut self.drag);
            for action in actions {
                self.dispatch(action);
            }
        }

        let crop_rect = crop_to_screen(&self.state.crop, image_rect);
        let painter = ui.painter_at(image_rect);
        draw_crop_overlay(&painter, image_rect, crop_rect, 150);
        let border = if self.state.completed.is_some() {
            egui::Color32::WHITE
        } else {
            egui::Color32::LIGHT_YELLOW
        };
        draw_crop_border(&painter, crop_rect, border);
    }

    /// Renders preset, zoom and rotation controls.
    fn render_controls(&mut self, ui: &mut egui::Ui) {
        let editing = self.state.phase == Phase::Editing;

        ui.add_enabled_ui(editing, |ui| {
            let mut selected = self.state.preset;
            egui::ComboBox::from_label("Verhouding")
                .selected_text(self.state.preset().name)
                .show_ui(ui, |ui| {
                    for (index, preset) in PRESETS.iter().enumerate() {
                        ui.selectable_value(&mut selected, index, preset.name);
                    }
                });
            if selected != self.state.preset {
                self.settings.preset = PRESETS[selected].key.to_string();
                self.dispatch(Action::PresetSelected(selected));
            }

            let mut scale = self.state.params.scale;
            if ui
                .add(egui::Slider::new(&mut scale, MIN_SCALE..=MAX_SCALE).text("Zoom").step_by(0.01))
                .changed()
            {
                self.dispatch(Action::ScaleChanged(scale));
            }

            let mut rotate = self.state.params.rotate_degrees;
            if ui
                .add(
                    egui::Slider::new(&mut rotate, -MAX_ROTATION..=MAX_ROTATION)
                        .text("Rotatie")
                        .suffix("°"),
                )
                .changed()
            {
                self.dispatch(Action::RotateChanged(rotate));
            }
        });
    }

    /// Renders the settings panel.
    fn render_settings_ui(&mut self, ui: &mut egui::Ui) {
        ui.separator();
        ui.label("Instellingen");

        let pinned = self.config.pinned;
        ui.horizontal(|ui| {
            ui.label("Map:");
            if pinned.destination {
                ui.label(&self.config.destination).on_hover_text(PINNED_HINT);
            } else {
                ui.add(egui::TextEdit::singleline(&mut self.settings.destination).hint_text("headers"));
            }
        });

        let mut texts_changed = false;
        ui.horizontal(|ui| {
            ui.label("Titel:");
            if pinned.preview_title {
                ui.label(&self.config.preview_title).on_hover_text(PINNED_HINT);
            } else {
                texts_changed |= ui
                    .add(egui::TextEdit::singleline(&mut self.settings.preview_title))
                    .changed();
            }
        });
        ui.horizontal(|ui| {
            ui.label("Ondertitel:");
            if pinned.preview_subtitle {
                ui.label(&self.config.preview_subtitle).on_hover_text(PINNED_HINT);
            } else {
                texts_changed |= ui
                    .add(egui::TextEdit::singleline(&mut self.settings.preview_subtitle))
                    .changed();
            }
        });

        if texts_changed {
            let effective = self.settings.apply_to(&self.config);
            self.overlay
                .set_texts(effective.preview_title, effective.preview_subtitle);
            self.preview_dirty = true;
        }
    }

    /// Renders the preview, buttons and notice banner.
    fn render_side_panel(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.label("Voorbeeld");
        match &self.preview_texture {
            Some(texture) => {
                ui.image((
                    texture.id(),
                    egui::vec2(PREVIEW_WIDTH as f32, PREVIEW_HEIGHT as f32),
                ));
            }
            None => {
                ui.allocate_space(egui::vec2(PREVIEW_WIDTH as f32, PREVIEW_HEIGHT as f32));
            }
        }
        ui.add_space(8.0);

        self.render_controls(ui);
        ui.add_space(8.0);

        let mut should_submit = false;
        let mut should_reset = false;
        ui.horizontal(|ui| {
            if ui.button("Annuleren").clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            if ui
                .add_enabled(self.state.phase == Phase::Editing, egui::Button::new("Reset"))
                .clicked()
            {
                should_reset = true;
            }
            if ui
                .add_enabled(self.state.can_confirm(), egui::Button::new("Crop & Opslaan"))
                .clicked()
            {
                should_submit = true;
            }
            if ui.button("⚙").clicked() {
                self.show_settings = !self.show_settings;
            }
        });

        if should_reset {
            self.dispatch(Action::Reset);
        }
        if should_submit {
            self.submit();
        }

        if self.state.phase == Phase::Processing {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Bezig met verwerken...");
            });
        } else if self.state.completed.is_none() {
            ui.label(
                egui::RichText::new("Sleep over de afbeelding om de uitsnede te bevestigen")
                    .small()
                    .color(egui::Color32::GRAY),
            );
        }

        if self.show_settings {
            self.render_settings_ui(ui);
        }

        let now = ctx.input(|i| i.time);
        if self.banner.as_ref().is_some_and(|b| b.is_expired(now)) {
            self.banner = None;
        }
        if let Some(banner) = &self.banner {
            ui.separator();
            let (text, color) = match &banner.notice {
                Notice::Success(msg) => (msg.as_str(), egui::Color32::LIGHT_GREEN),
                Notice::Failure(msg) => (msg.as_str(), egui::Color32::RED),
            };
            ui.label(egui::RichText::new(text).color(color));
        }
    }
}

impl eframe::App for CropDialogApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        // Process any pending upload events
        self.process_upload_events(ctx);

        // Upload texture on first frame using pre-converted data
        if self.image_texture.is_none() {
            if let Some(color_image) = self.color_image.take() {
                self.image_texture = Some(ctx.load_texture(
                    "source",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }

        self.refresh_preview(ctx);

        egui::SidePanel::right("controls")
            .resizable(false)
            .exact_width(PREVIEW_WIDTH as f32 + 40.0)
            .show(ctx, |ui| {
                self.render_side_panel(ui, ctx);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Afbeelding bijsnijden");
            self.render_image_area(ui);
        });

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        // Keep polling while an upload is in flight or a banner is visible
        if self.state.phase == Phase::Processing || self.banner.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// Launches the crop dialog and returns when the user closes the window.
///
/// # Arguments
/// * `source` - The loaded source image
/// * `config` - Application configuration
///
/// # Returns
/// The stored path, or `None` if the dialog was closed without storing.
pub fn run(source: SourceImage, config: Config) -> Result<Option<String>> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Header bijsnijden")
            .with_inner_size([MAX_DISPLAY_WIDTH + PREVIEW_WIDTH as f32 + 80.0, MAX_DISPLAY_HEIGHT + 80.0]),
        ..Default::default()
    };

    let result = Arc::new(Mutex::new(DialogResult::default()));
    let app = CropDialogApp::new(source, result.clone(), config)?;

    eframe::run_native(
        "Header bijsnijden",
        options,
        Box::new(move |_cc| Ok(Box::new(app) as Box<dyn eframe::App>)),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))?;

    // Extract result from shared state
    let lock = result
        .lock()
        .map_err(|_| AppError::ui("Failed to acquire result lock"))?;

    Ok(lock.stored_path.clone())
}
