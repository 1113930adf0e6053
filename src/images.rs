use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

// Stand-in when the placeholder asset itself is missing.
const BLANK_WIDTH: u32 = 640;
const BLANK_HEIGHT: u32 = 360;
const BLANK_GREY: Rgb<u8> = Rgb([221, 221, 221]);

const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("unsupported image url: {0}")]
    UnsupportedUrl(String),
    #[error("image download failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image host returned status {0}")]
    Status(StatusCode),
    #[error("image is larger than {0} bytes")]
    TooLarge(usize),
    #[error("image could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    Empty,
}

/// A decoded bitmap already scaled for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayImage {
    image: DynamicImage,
}

impl DisplayImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        self.image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    /// PNG encoding wrapped as a `data:` URI for inline `<img>` sources.
    pub fn to_data_uri(&self) -> Result<String, image::ImageError> {
        let png = self.to_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

/// Width capped at `max_width`, height following the original aspect ratio.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let new_width = width.min(max_width.max(1));
    let new_height = (new_width as f64 * height as f64 / width as f64).round() as u32;
    (new_width, new_height.max(1))
}

fn scale(image: DynamicImage, max_width: u32) -> DisplayImage {
    let (width, height) = scaled_dimensions(image.width(), image.height(), max_width);
    let image = if (width, height) == (image.width(), image.height()) {
        image
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    };
    DisplayImage { image }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::Empty);
    }
    Ok(image)
}

fn load_file(path: &Path) -> Result<DynamicImage, ImageError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

fn blank() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(BLANK_WIDTH, BLANK_HEIGHT, BLANK_GREY))
}

/// Turns image URLs and bundled assets into display-sized bitmaps.
///
/// None of its public methods fail: any problem with the requested image
/// yields the placeholder instead.
#[derive(Clone)]
pub struct Normalizer {
    client: Client,
    placeholder_path: PathBuf,
    max_bytes: usize,
}

impl Normalizer {
    pub fn new(client: Client, placeholder_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            placeholder_path: placeholder_path.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Refuse downloads whose body exceeds `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub async fn normalize(&self, source: Option<&str>, max_width: u32) -> DisplayImage {
        let Some(url) = source.map(str::trim).filter(|s| !s.is_empty()) else {
            return self.placeholder(max_width);
        };

        match self.download(url).await {
            Ok(image) => scale(image, max_width),
            Err(err) => {
                debug!(%url, error = %err, "Falling back to placeholder image");
                self.placeholder(max_width)
            }
        }
    }

    /// Normalize a bundled asset such as the page banner.
    pub fn local(&self, path: &Path, max_width: u32) -> DisplayImage {
        match load_file(path) {
            Ok(image) => scale(image, max_width),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Falling back to placeholder image");
                self.placeholder(max_width)
            }
        }
    }

    pub fn placeholder(&self, max_width: u32) -> DisplayImage {
        let image = load_file(&self.placeholder_path).unwrap_or_else(|err| {
            warn!(
                path = %self.placeholder_path.display(),
                error = %err,
                "Placeholder image unavailable, using blank image"
            );
            blank()
        });
        scale(image, max_width)
    }

    async fn download(&self, url: &str) -> Result<DynamicImage, ImageError> {
        let parsed = Url::parse(url).map_err(|_| ImageError::UnsupportedUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImageError::UnsupportedUrl(url.to_string()));
        }

        let mut response = self.client.get(parsed).send().await?;
        if !response.status().is_success() {
            return Err(ImageError::Status(response.status()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(ImageError::TooLarge(self.max_bytes));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(ImageError::TooLarge(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 120, 200])));
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn placeholder_file(width: u32, height: u32) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&png_bytes(width, height)).unwrap();
        file
    }

    mod scaled_dimensions_tests {
        use super::*;

        #[test]
        fn test_wide_image_is_capped() {
            assert_eq!(scaled_dimensions(1400, 700, 700), (700, 350));
        }

        #[test]
        fn test_small_image_unchanged() {
            assert_eq!(scaled_dimensions(500, 300, 700), (500, 300));
        }

        #[test]
        fn test_height_is_rounded() {
            // 700 * 333 / 1000 = 233.1
            assert_eq!(scaled_dimensions(1000, 333, 700), (700, 233));
            // 700 * 335 / 1000 = 234.5
            assert_eq!(scaled_dimensions(1000, 335, 700), (700, 235));
        }

        #[test]
        fn test_height_never_zero() {
            assert_eq!(scaled_dimensions(4000, 1, 700), (700, 1));
        }

        #[test]
        fn test_zero_sized_input() {
            assert_eq!(scaled_dimensions(0, 100, 700), (0, 0));
        }

        #[test]
        fn test_width_bound_and_ratio_hold() {
            for &width in &[1u32, 50, 699, 700, 701, 1920, 4000] {
                for &height in &[1u32, 10, 480, 1080, 5000] {
                    let (w, h) = scaled_dimensions(width, height, 700);
                    assert!(w <= 700);
                    let exact = w as f64 * height as f64 / width as f64;
                    assert!(
                        (h as f64 - exact).abs() <= 0.5 || (exact < 1.0 && h == 1),
                        "{}x{} -> {}x{}",
                        width,
                        height,
                        w,
                        h
                    );
                }
            }
        }
    }

    mod placeholder_tests {
        use super::*;

        #[test]
        fn test_placeholder_is_scaled() {
            let file = placeholder_file(1400, 700);
            let normalizer = Normalizer::new(Client::new(), file.path());

            let image = normalizer.placeholder(700);
            assert_eq!((image.width(), image.height()), (700, 350));
        }

        #[test]
        fn test_missing_placeholder_uses_blank() {
            let normalizer = Normalizer::new(Client::new(), "/nonexistent/no_image.png");

            let image = normalizer.placeholder(500);
            // 360 * 500 / 640 = 281.25
            assert_eq!((image.width(), image.height()), (500, 281));
        }

        #[test]
        fn test_local_asset() {
            let file = placeholder_file(300, 100);
            let banner = placeholder_file(2000, 500);
            let normalizer = Normalizer::new(Client::new(), file.path());

            let image = normalizer.local(banner.path(), 1000);
            assert_eq!((image.width(), image.height()), (1000, 250));
        }

        #[test]
        fn test_missing_local_asset_uses_placeholder() {
            let file = placeholder_file(300, 100);
            let normalizer = Normalizer::new(Client::new(), file.path());

            let image = normalizer.local(Path::new("/nonexistent/banner.png"), 1000);
            assert_eq!(image, normalizer.placeholder(1000));
        }

        #[test]
        fn test_data_uri_carries_png() {
            let file = placeholder_file(120, 80);
            let normalizer = Normalizer::new(Client::new(), file.path());
            let image = normalizer.placeholder(700);

            let uri = image.to_data_uri().unwrap();
            let encoded = uri.strip_prefix("data:image/png;base64,").unwrap();
            assert_eq!(STANDARD.decode(encoded).unwrap(), image.to_png().unwrap());
        }

        #[test]
        fn test_png_encoding_decodes_back() {
            let file = placeholder_file(120, 80);
            let normalizer = Normalizer::new(Client::new(), file.path());

            let png = normalizer.placeholder(700).to_png().unwrap();
            let decoded = image::load_from_memory(&png).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (120, 80));
        }
    }

    mod normalize_tests {
        use super::*;

        #[tokio::test]
        async fn test_no_url_gives_placeholder() {
            let file = placeholder_file(1400, 700);
            let normalizer = Normalizer::new(Client::new(), file.path());

            let image = normalizer.normalize(None, 700).await;
            assert_eq!(image, normalizer.placeholder(700));

            let blank_url = normalizer.normalize(Some("  "), 700).await;
            assert_eq!(blank_url, normalizer.placeholder(700));
        }

        #[tokio::test]
        async fn test_downloaded_image_is_scaled() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/photo.png"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "image/png")
                        .set_body_bytes(png_bytes(1400, 700)),
                )
                .mount(&server)
                .await;

            let file = placeholder_file(10, 10);
            let normalizer = Normalizer::new(Client::new(), file.path());
            let url = format!("{}/photo.png", server.uri());

            let image = normalizer.normalize(Some(&url), 700).await;
            assert_eq!((image.width(), image.height()), (700, 350));
        }

        #[tokio::test]
        async fn test_unreachable_image_gives_placeholder() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let file = placeholder_file(1400, 700);
            let normalizer = Normalizer::new(Client::new(), file.path());
            let url = format!("{}/missing.jpg", server.uri());

            let image = normalizer.normalize(Some(&url), 700).await;
            assert_eq!(image, normalizer.placeholder(700));
        }

        #[tokio::test]
        async fn test_undecodable_image_gives_placeholder() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>not an image</html>"))
                .mount(&server)
                .await;

            let file = placeholder_file(1400, 700);
            let normalizer = Normalizer::new(Client::new(), file.path());
            let url = format!("{}/fake.jpg", server.uri());

            let image = normalizer.normalize(Some(&url), 700).await;
            assert_eq!(image, normalizer.placeholder(700));
        }

        #[tokio::test]
        async fn test_oversized_image_gives_placeholder() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/huge.png"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(400, 200)))
                .mount(&server)
                .await;

            let file = placeholder_file(1400, 700);
            let normalizer = Normalizer::new(Client::new(), file.path()).with_max_bytes(64);
            let url = format!("{}/huge.png", server.uri());

            let image = normalizer.normalize(Some(&url), 700).await;
            assert_eq!(image, normalizer.placeholder(700));
        }

        #[tokio::test]
        async fn test_unsupported_scheme_gives_placeholder() {
            let file = placeholder_file(1400, 700);
            let normalizer = Normalizer::new(Client::new(), file.path());

            let image = normalizer
                .normalize(Some("file:///etc/hostname"), 700)
                .await;
            assert_eq!(image, normalizer.placeholder(700));
        }
    }
}
