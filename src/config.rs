use std::path::PathBuf;

use clap::Parser;

use crate::render::RenderMode;

/// Runtime configuration for the classification pipeline.
///
/// Defaults mirror the production deployment: a 1024-px processing bound,
/// JPEG quality 75 and an 8 MiB upload ceiling keep peak memory per request
/// bounded regardless of server-wide concurrency, and the 2-thread CPU budget
/// keeps a slow inference from contending for every core.
#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Path to the YOLO ONNX weight artifact.
    #[arg(short, long, default_value = "best.onnx")]
    pub model_path: PathBuf,

    /// Path to the sidecar class-names file (one raw label per line).
    #[arg(long, default_value = "best.names")]
    pub names_path: PathBuf,

    /// Directory holding per-request upload artifacts.
    #[arg(short, long, default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Longest allowed image side; larger uploads are downsampled to this
    /// before inference. Also the square inference resolution — the two must
    /// stay equal or accuracy degrades silently.
    #[arg(long, default_value_t = 1024)]
    pub max_image_size: u32,

    /// Upload size ceiling in bytes.
    #[arg(long, default_value_t = 8 * 1024 * 1024)]
    pub max_upload_bytes: u64,

    /// JPEG quality for the encoded response image.
    #[arg(long, default_value_t = 75, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Minimum confidence for a raw detection to be kept.
    #[arg(long, default_value_t = 0.25)]
    pub confidence_threshold: f32,

    /// IoU threshold for overlap suppression.
    #[arg(long, default_value_t = 0.45)]
    pub iou_threshold: f32,

    /// CPU threads granted to the ONNX session.
    #[arg(long, default_value_t = 2)]
    pub intra_threads: usize,

    /// Whether the response image carries detection graphics.
    #[arg(long, value_enum, default_value_t = RenderMode::Annotated)]
    pub render_mode: RenderMode,

    /// TTF font used for annotation label text. Without it the annotation is
    /// the bounding rectangle alone.
    #[arg(long)]
    pub font_path: Option<PathBuf>,
}

impl Config {
    /// Extensions accepted at the upload boundary.
    pub const ALLOWED_EXTENSIONS: [&'static str; 4] = ["png", "jpg", "jpeg", "gif"];

    pub fn is_allowed_extension(filename: &str) -> bool {
        std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                Self::ALLOWED_EXTENSIONS.contains(&ext.as_str())
            })
    }

    /// Configuration with defaults suitable for tests, rooted at `dir`.
    pub fn for_test(dir: &std::path::Path) -> Self {
        Self {
            model_path: dir.join("best.onnx"),
            names_path: dir.join("best.names"),
            upload_dir: dir.join("uploads"),
            max_image_size: 1024,
            max_upload_bytes: 8 * 1024 * 1024,
            jpeg_quality: 75,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            intra_threads: 2,
            render_mode: RenderMode::Clean,
            font_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        let cases = [
            ("produce.jpg", true),
            ("produce.JPG", true),
            ("produce.jpeg", true),
            ("produce.png", true),
            ("produce.gif", true),
            ("produce.txt", false),
            ("produce.webp", false),
            ("produce", false),
            ("", false),
        ];

        for (filename, expected) in cases {
            assert_eq!(
                Config::is_allowed_extension(filename),
                expected,
                "extension check mismatch for {filename:?}"
            );
        }
    }

    #[test]
    fn test_test_config_defaults_match_deployment() {
        let config = Config::for_test(std::path::Path::new("/tmp"));
        assert_eq!(config.max_image_size, 1024);
        assert_eq!(config.max_upload_bytes, 8 * 1024 * 1024);
        assert_eq!(config.jpeg_quality, 75);
    }
}
