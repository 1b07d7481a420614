//! Crop dialog state and the confirm flow.
//!
//! All user interaction is expressed as [`Action`]s folded into a
//! [`DialogState`] by the pure [`reduce`] function. The state is plain data
//! (and serializable), so every rule of the dialog can be tested without a
//! window. [`CropDialog`] wraps the state together with the loaded image,
//! an [`ImageStore`] and a [`Notifier`] and runs the asynchronous
//! export-then-upload step.
//!
//! # Phases
//!
//! `Editing` -> `Processing` (confirm) -> `Closed` (stored)
//!                                  \-> `Editing` (failed, state kept)

use crate::aspect::{apply_aspect_ratio, percent_ratio, AspectRatioPreset, DEFAULT_PRESET, PRESETS};
use crate::error::{AppError, Result};
use crate::geometry::{CropRect, ImageDimensions, PixelCrop, SourceRect};
use crate::preview::{render_preview, Decorator};
use crate::transform::{export_jpeg, render_header, TransformParams};
use crate::upload::{file_name_stem, ImageStore, UploadRequest};
use chrono::Utc;
use image::{DynamicImage, RgbImage};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

/// Shown to the user whenever a crop could not be stored.
pub const FAILURE_MESSAGE: &str = "Iets ging mis bij het croppen";
/// Shown to the user after a successful crop.
pub const SUCCESS_MESSAGE: &str = "Afbeelding succesvol gecropt";

/// Lifecycle of one dialog instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Editing,
    Processing,
    Closed,
}

/// Everything the dialog knows, independent of any UI toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogState {
    /// `None` until the image has reported its size.
    pub dimensions: Option<ImageDimensions>,
    pub crop: CropRect,
    /// The crop realized on the last drag release.
    pub completed: Option<PixelCrop>,
    /// Index into [`PRESETS`].
    pub preset: usize,
    pub params: TransformParams,
    pub phase: Phase,
}

impl Default for DialogState {
    fn default() -> Self {
        Self {
            dimensions: None,
            crop: CropRect::default(),
            completed: None,
            preset: DEFAULT_PRESET,
            params: TransformParams::default(),
            phase: Phase::Editing,
        }
    }
}

/// User and lifecycle events the dialog reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    ImageLoaded(ImageDimensions),
    CropChanged(CropRect),
    CropCompleted(PixelCrop),
    PresetSelected(usize),
    ScaleChanged(f32),
    RotateChanged(f32),
    Reset,
    ConfirmStarted,
    ConfirmFailed,
    ConfirmSucceeded,
}

impl DialogState {
    pub fn preset(&self) -> &'static AspectRatioPreset {
        PRESETS.get(self.preset).unwrap_or(&PRESETS[DEFAULT_PRESET])
    }

    /// Whether the confirm button is enabled.
    pub fn can_confirm(&self) -> bool {
        self.phase == Phase::Editing
            && self.dimensions.is_some_and(|d| d.is_loaded())
            && self.completed.is_some_and(|c| !c.is_empty())
    }

    /// The completed crop in source pixels, if there is one.
    pub fn source_rect(&self) -> Option<SourceRect> {
        let dims = self.dimensions.filter(|d| d.is_loaded())?;
        let completed = self.completed.filter(|c| !c.is_empty())?;
        Some(SourceRect::from_completed(&completed, &dims))
    }

    /// The current crop box in source pixels, completed or not. Drives the
    /// live preview while a drag is still in progress.
    pub fn live_source_rect(&self) -> Option<SourceRect> {
        let dims = self.dimensions.filter(|d| d.is_loaded())?;
        let pixels = self.realized_crop()?;
        let rect = SourceRect::from_completed(&pixels, &dims);
        (!rect.is_empty()).then_some(rect)
    }

    /// The crop box in displayed pixels, as a drag release would report it.
    pub fn realized_crop(&self) -> Option<PixelCrop> {
        let dims = self.dimensions?;
        Some(self.crop.to_pixels(dims.displayed_width, dims.displayed_height))
    }

    /// Width/height lock for drags in percent units; `None` for freeform.
    pub fn locked_ratio(&self) -> Option<f32> {
        let dims = self.dimensions?;
        percent_ratio(self.preset().value, dims.displayed_width, dims.displayed_height)
    }

    fn recomputed_crop(&self) -> CropRect {
        let ratio = self.preset().value;
        match self.dimensions {
            Some(dims) if dims.is_loaded() => {
                apply_aspect_ratio(ratio, dims.displayed_width, dims.displayed_height)
            }
            _ => self.crop,
        }
    }
}

/// Folds one action into the state.
///
/// Edits are ignored unless the dialog is editing, so nothing moves under an
/// upload in flight and a failed attempt returns to exactly the state it
/// started from.
pub fn reduce(state: &DialogState, action: Action) -> DialogState {
    let mut next = state.clone();
    let editing = state.phase == Phase::Editing;

    match action {
        Action::ImageLoaded(dims) if editing => {
            next.dimensions = Some(dims);
            if PRESETS.get(next.preset).is_none() {
                warn!("Unknown preset index {}, using the default", next.preset);
                next.preset = DEFAULT_PRESET;
            }
            next.crop = next.recomputed_crop();
            next.completed = None;
        }
        Action::CropChanged(rect) if editing => {
            next.crop = rect.clamped();
        }
        Action::CropCompleted(pixels) if editing => {
            next.completed = (!pixels.is_empty()).then_some(pixels);
        }
        Action::PresetSelected(index) if editing => {
            if index < PRESETS.len() {
                next.preset = index;
                next.crop = next.recomputed_crop();
                next.completed = None;
            } else {
                warn!("Ignoring unknown preset index {}", index);
            }
        }
        Action::ScaleChanged(scale) if editing => {
            next.params = next.params.with_scale(scale);
        }
        Action::RotateChanged(degrees) if editing => {
            next.params = next.params.with_rotation(degrees);
        }
        Action::Reset if editing => {
            next = DialogState {
                dimensions: state.dimensions,
                ..DialogState::default()
            };
            next.crop = next.recomputed_crop();
        }
        Action::ConfirmStarted if state.can_confirm() => {
            next.phase = Phase::Processing;
        }
        Action::ConfirmFailed if state.phase == Phase::Processing => {
            next.phase = Phase::Editing;
        }
        Action::ConfirmSucceeded if state.phase == Phase::Processing => {
            next.phase = Phase::Closed;
        }
        ignored => {
            debug!("Ignoring {:?} in phase {:?}", ignored, state.phase);
        }
    }

    next
}

/// User-visible outcome of a confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

/// Receives the notices the dialog raises.
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Notifier that writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(msg) => info!("{}", msg),
            Notice::Failure(msg) => error!("{}", msg),
        }
    }
}

/// Renders, exports and uploads one crop. Export completes before the
/// upload starts.
pub async fn crop_and_upload<S: ImageStore>(
    store: &S,
    image: &DynamicImage,
    source: SourceRect,
    params: &TransformParams,
    destination: &str,
    original_name: &str,
) -> Result<String> {
    let bitmap = render_header(image, source, params)?;
    let jpeg = export_jpeg(&bitmap)?;

    let request = UploadRequest {
        image: jpeg,
        destination: destination.to_string(),
        file_name: file_name_stem(original_name, Utc::now()),
    };
    store.upload(request).await
}

/// One open crop dialog: state, image and collaborators.
pub struct CropDialog<S, N> {
    state: DialogState,
    image: DynamicImage,
    store: S,
    notifier: N,
    destination: String,
}

impl<S: ImageStore, N: Notifier> CropDialog<S, N> {
    /// Opens a dialog on an image shown at `displayed` size.
    pub fn new(
        image: DynamicImage,
        displayed: (f32, f32),
        store: S,
        notifier: N,
        destination: impl Into<String>,
    ) -> Self {
        let dims = ImageDimensions::new((image.width(), image.height()), displayed);
        let state = reduce(&DialogState::default(), Action::ImageLoaded(dims));
        Self {
            state,
            image,
            store,
            notifier,
            destination: destination.into(),
        }
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn is_open(&self) -> bool {
        self.state.phase != Phase::Closed
    }

    pub fn dispatch(&mut self, action: Action) {
        self.state = reduce(&self.state, action);
    }

    /// Live preview of the current crop box.
    pub fn preview(&self, decorator: Option<&dyn Decorator>) -> Result<RgbImage> {
        let source = self.state.live_source_rect().ok_or(AppError::EmptyCrop)?;
        render_preview(&self.image, source, &self.state.params, decorator)
    }

    /// The final header bitmap for the completed crop, without uploading.
    pub fn render_output(&self) -> Result<RgbImage> {
        let source = self.state.source_rect().ok_or(AppError::EmptyCrop)?;
        render_header(&self.image, source, &self.state.params)
    }

    /// Crops, exports and uploads, then hands the stored path to
    /// `on_cropped` and closes the dialog.
    ///
    /// # Errors
    ///
    /// [`AppError::EmptyCrop`] without a completed crop; nothing is notified
    /// and the state is untouched. Any other failure is logged, reported once
    /// through the notifier, and leaves the dialog open with crop, scale and
    /// rotation as they were.
    pub async fn confirm<F>(&mut self, original_name: &str, on_cropped: F) -> Result<String>
    where
        F: FnOnce(&str),
    {
        let source = match self.state.source_rect() {
            Some(source) if self.state.can_confirm() => source,
            _ => return Err(AppError::EmptyCrop),
        };

        self.dispatch(Action::ConfirmStarted);
        let result = crop_and_upload(
            &self.store,
            &self.image,
            source,
            &self.state.params,
            &self.destination,
            original_name,
        )
        .await;

        match result {
            Ok(path) => {
                self.dispatch(Action::ConfirmSucceeded);
                self.notifier.notify(Notice::Success(SUCCESS_MESSAGE.to_string()));
                on_cropped(&path);
                Ok(path)
            }
            Err(e) => {
                error!("Crop of '{}' failed: {:?}", original_name, e);
                self.dispatch(Action::ConfirmFailed);
                self.notifier.notify(Notice::Failure(FAILURE_MESSAGE.to_string()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(width: f32, height: f32) -> DialogState {
        reduce(
            &DialogState::default(),
            Action::ImageLoaded(ImageDimensions::new((3000, 2000), (width, height))),
        )
    }

    #[test]
    fn image_load_recomputes_crop_for_default_preset() {
        let state = loaded(600.0, 400.0);

        assert_eq!(state.preset, DEFAULT_PRESET);
        assert_eq!(state.crop.width, 90.0);
        assert!((state.crop.height - 61.36).abs() < 0.01);
        assert!((state.crop.y - 19.32).abs() < 0.01);
        assert!(!state.can_confirm());
    }

    #[test]
    fn confirm_requires_a_completed_crop() {
        let state = loaded(600.0, 400.0);
        let started = reduce(&state, Action::ConfirmStarted);
        assert_eq!(started.phase, Phase::Editing);

        let pixels = state.realized_crop().unwrap();
        let state = reduce(&state, Action::CropCompleted(pixels));
        assert!(state.can_confirm());
        assert_eq!(reduce(&state, Action::ConfirmStarted).phase, Phase::Processing);
    }

    #[test]
    fn empty_release_does_not_complete() {
        let state = reduce(
            &loaded(600.0, 400.0),
            Action::CropCompleted(PixelCrop { x: 10.0, y: 10.0, width: 0.0, height: 0.0 }),
        );
        assert_eq!(state.completed, None);
    }

    #[test]
    fn preset_switch_is_idempotent_and_drops_completed_crop() {
        let state = loaded(600.0, 400.0);
        let pixels = state.realized_crop().unwrap();
        let state = reduce(&state, Action::CropCompleted(pixels));

        let square = reduce(&state, Action::PresetSelected(3));
        assert_eq!(square.completed, None);

        let back = reduce(&square, Action::PresetSelected(0));
        assert_eq!(back.crop, state.crop);
    }

    #[test]
    fn freeform_always_resets_to_center() {
        let state = reduce(
            &loaded(600.0, 400.0),
            Action::CropChanged(CropRect::new(1.0, 2.0, 30.0, 40.0)),
        );
        let free = reduce(&state, Action::PresetSelected(4));
        assert_eq!(free.crop, CropRect::new(25.0, 25.0, 50.0, 50.0));
        assert_eq!(free.locked_ratio(), None);
    }

    #[test]
    fn unknown_preset_is_ignored() {
        let state = loaded(600.0, 400.0);
        assert_eq!(reduce(&state, Action::PresetSelected(99)), state);
    }

    #[test]
    fn edits_are_clamped() {
        let state = loaded(600.0, 400.0);
        let state = reduce(&state, Action::CropChanged(CropRect::new(90.0, 0.0, 20.0, 20.0)));
        assert_eq!(state.crop.x, 80.0);

        let state = reduce(&state, Action::ScaleChanged(9.0));
        let state = reduce(&state, Action::RotateChanged(-270.0));
        assert_eq!(state.params, TransformParams { scale: 2.0, rotate_degrees: -180.0 });
    }

    #[test]
    fn edits_are_ignored_while_processing() {
        let state = loaded(600.0, 400.0);
        let pixels = state.realized_crop().unwrap();
        let state = reduce(&state, Action::CropCompleted(pixels));
        let processing = reduce(&state, Action::ConfirmStarted);

        let poked = reduce(&processing, Action::ScaleChanged(1.5));
        assert_eq!(poked, processing);

        let failed = reduce(&processing, Action::ConfirmFailed);
        assert_eq!(failed, state);
    }

    #[test]
    fn reset_restores_defaults_for_loaded_image() {
        let state = loaded(600.0, 400.0);
        let edited = reduce(&reduce(&state, Action::PresetSelected(3)), Action::RotateChanged(45.0));
        assert_eq!(reduce(&edited, Action::Reset), state);
    }

    #[test]
    fn locked_ratio_is_expressed_in_percent_units() {
        let state = loaded(600.0, 400.0);
        let ratio = state.locked_ratio().unwrap();
        // 2.2 on a 3:2 display
        assert!((ratio - 2.2 * 400.0 / 600.0).abs() < 1e-5);
        assert!((state.crop.width / state.crop.height - ratio).abs() < 1e-3);
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = loaded(600.0, 400.0);
        let json = serde_json::to_string(&state).unwrap();
        let back: DialogState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn restored_state_with_unknown_preset_loads_default() {
        let mut json = serde_json::to_value(DialogState::default()).unwrap();
        json["preset"] = serde_json::json!(99);
        let restored: DialogState = serde_json::from_value(json).unwrap();
        assert_eq!(restored.preset, 99);
        assert_eq!(restored.preset().key, "header");

        let state = reduce(
            &restored,
            Action::ImageLoaded(ImageDimensions::new((3000, 2000), (600.0, 400.0))),
        );
        assert_eq!(state.preset, DEFAULT_PRESET);
        assert_eq!(state, loaded(600.0, 400.0));
    }
}
