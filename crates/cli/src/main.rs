use header_crop_core::{
    aspect::{find_preset, PRESETS},
    dialog::{Action, CropDialog, LogNotifier},
    geometry::CropRect,
    init,
    preview::{preview_data_url, HeaderOverlay},
    transform::export_jpeg,
    Config, HeaderCropper,
};
use anyhow::{anyhow, Context, Result};
use arboard::Clipboard;
use clap::Parser;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Crop an image into the site header format", long_about = None)]
struct Args {
    /// Local file, URL or CMS path (e.g. /uploads/destinations/bali.jpg)
    image: Option<String>,

    /// Folder on the CMS to store the crop in
    #[arg(short, long)]
    destination: Option<String>,

    /// Aspect-ratio preset key or name, see --list-presets (headless)
    #[arg(short, long, requires = "headless")]
    preset: Option<String>,

    /// Zoom factor between 0.5 and 2.0 (headless)
    #[arg(long, requires = "headless")]
    scale: Option<f32>,

    /// Rotation in degrees between -180 and 180 (headless)
    #[arg(long, allow_hyphen_values = true, requires = "headless")]
    rotate: Option<f32>,

    /// Crop box in percent of the image: X,Y,WIDTH,HEIGHT (headless)
    #[arg(long, value_parser = parse_crop, requires = "headless")]
    crop: Option<CropRect>,

    /// Apply the arguments without opening the dialog
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Write the header JPEG to this file instead of uploading (headless)
    #[arg(short, long, requires = "headless")]
    output: Option<PathBuf>,

    /// Write the live preview as PNG to this file (headless)
    #[arg(long, requires = "headless")]
    preview: Option<PathBuf>,

    /// Print the live preview as a data URL (headless)
    #[arg(long, default_value_t = false, requires = "headless")]
    preview_data_url: bool,

    /// Copy the stored path to clipboard
    #[arg(short, long, default_value_t = false)]
    copy: bool,

    /// List aspect-ratio presets and exit
    #[arg(long)]
    list_presets: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Handle --list-presets
    if args.list_presets {
        println!("Available presets:");
        for preset in PRESETS {
            println!("  {:<10} {}", preset.key, preset.name);
        }
        return Ok(());
    }

    let reference = args
        .image
        .clone()
        .ok_or_else(|| anyhow!("No image given. Pass a file, URL or CMS path"))?;

    // Load config and override destination if specified via CLI
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(d) = &args.destination {
        config.pin_destination(d);
    }

    let cropper = HeaderCropper::with_config(config).context("Failed to initialize")?;
    let source = cropper
        .load(&reference)
        .await
        .with_context(|| format!("Failed to load image '{}'", reference))?;
    info!(
        "Loaded {} ({}x{})",
        source.name,
        source.image.width(),
        source.image.height()
    );

    let stored = if args.headless {
        run_headless(&args, &cropper, source).await?
    } else {
        cropper.run_interactive(source).context("Crop dialog failed")?
    };

    match stored {
        Some(path) => {
            println!("{}", path);
            if args.copy {
                copy_to_clipboard(&path);
            }
        }
        None => {
            if args.output.is_none() {
                println!("Crop cancelled");
            }
        }
    }

    Ok(())
}

/// Applies the arguments to a dialog without a window, then exports or
/// uploads the completed crop.
async fn run_headless(
    args: &Args,
    cropper: &HeaderCropper,
    source: header_crop_core::SourceImage,
) -> Result<Option<String>> {
    let displayed = (source.image.width() as f32, source.image.height() as f32);
    let mut dialog = CropDialog::new(
        source.image,
        displayed,
        cropper.store().clone(),
        LogNotifier,
        cropper.config().destination.clone(),
    );

    if let Some(query) = &args.preset {
        let index = find_preset(query).ok_or_else(|| {
            anyhow!("Unknown preset '{}'. Use --list-presets to see the options", query)
        })?;
        dialog.dispatch(Action::PresetSelected(index));
    }
    if let Some(crop) = args.crop {
        dialog.dispatch(Action::CropChanged(crop));
    }
    if let Some(scale) = args.scale {
        dialog.dispatch(Action::ScaleChanged(scale));
    }
    if let Some(rotate) = args.rotate {
        dialog.dispatch(Action::RotateChanged(rotate));
    }

    // A headless run releases the box where the arguments put it
    let released = dialog
        .state()
        .realized_crop()
        .context("Image has no dimensions")?;
    dialog.dispatch(Action::CropCompleted(released));

    if args.preview.is_some() || args.preview_data_url {
        let overlay = HeaderOverlay::from_config(cropper.config());
        if !overlay.has_font() {
            warn!("No font found for the preview, set HEADER_FONT_PATH to render text");
        }
        let preview = dialog
            .preview(Some(&overlay))
            .context("Failed to render preview")?;
        if let Some(path) = &args.preview {
            preview
                .save(path)
                .with_context(|| format!("Failed to write preview to {}", path.display()))?;
            info!("Preview written to {}", path.display());
        }
        if args.preview_data_url {
            println!("{}", preview_data_url(&preview)?);
        }
    }

    if let Some(path) = &args.output {
        let bitmap = dialog.render_output().context("Failed to render header")?;
        let jpeg = export_jpeg(&bitmap).context("Failed to encode header")?;
        fs::write(path, jpeg).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Header written to {}", path.display());
        return Ok(None);
    }

    info!(
        "Uploading to {} in folder '{}'",
        cropper.store().endpoint(),
        dialog.destination()
    );
    let path = dialog
        .confirm(&source.name, |path| info!("Cropped image stored at {}", path))
        .await
        .context("Upload failed")?;
    Ok(Some(path))
}

/// Parses `X,Y,WIDTH,HEIGHT` in percent.
fn parse_crop(value: &str) -> std::result::Result<CropRect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("Invalid number in crop '{}': {}", value, e))?;

    match parts.as_slice() {
        [x, y, width, height] if *width > 0.0 && *height > 0.0 => {
            Ok(CropRect::new(*x, *y, *width, *height))
        }
        [_, _, _, _] => Err("Crop width and height must be positive".to_string()),
        _ => Err(format!("Expected X,Y,WIDTH,HEIGHT, got '{}'", value)),
    }
}

/// Helper to copy the stored path
fn copy_to_clipboard(text: &str) {
    match Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text.to_string()) {
                eprintln!("Warning: Failed to copy to clipboard: {}", e);
            } else {
                println!("(Copied to clipboard)");
            }
        }
        Err(e) => eprintln!("Warning: Could not access clipboard: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_argument_parses_percent_box() {
        let crop = parse_crop("5, 20.5,90,41").unwrap();
        assert_eq!(crop, CropRect::new(5.0, 20.5, 90.0, 41.0));
    }

    #[test]
    fn malformed_crop_arguments_are_rejected() {
        assert!(parse_crop("5,20,90").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
        assert!(parse_crop("5,20,0,41").is_err());
    }

    #[test]
    fn negative_rotation_is_accepted() {
        let args = Args::try_parse_from(["header-crop", "bali.jpg", "--headless", "--rotate", "-90"]).unwrap();
        assert_eq!(args.rotate, Some(-90.0));
        assert!(args.headless);
    }

    #[test]
    fn headless_flags_need_headless() {
        for flags in [
            &["--preset", "square"][..],
            &["--scale", "1.5"],
            &["--rotate", "-90"],
            &["--crop", "5,20,90,41"],
            &["--output", "header.jpg"],
            &["--preview", "preview.png"],
            &["--preview-data-url"],
        ] {
            let argv = ["header-crop", "bali.jpg"].iter().chain(flags.iter()).copied();
            let err = Args::try_parse_from(argv).unwrap_err();
            assert_eq!(
                err.kind(),
                clap::error::ErrorKind::MissingRequiredArgument,
                "{:?} was accepted without --headless",
                flags
            );
        }
    }

    #[test]
    fn interactive_run_takes_destination_and_copy() {
        let args = Args::try_parse_from(["header-crop", "bali.jpg", "-d", "destinations", "--copy"]).unwrap();
        assert!(!args.headless);
        assert_eq!(args.destination.as_deref(), Some("destinations"));
        assert!(args.copy);
    }
}
