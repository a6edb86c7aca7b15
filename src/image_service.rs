use crate::error::{ViewerError, ViewerResult};
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, error};

/// A decoded raster image together with the bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct DisplayImage {
    bytes: Vec<u8>,
    image: DynamicImage,
}

impl DisplayImage {
    pub fn decode(bytes: Vec<u8>) -> ViewerResult<Self> {
        let image = image::load_from_memory(&bytes)?;
        Ok(Self { bytes, image })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Writes the original encoded bytes, not a re-encoding.
    pub fn save(&self, path: &Path) -> ViewerResult<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

pub struct ImageService {
    client: reqwest::Client,
}

impl ImageService {
    pub fn new() -> ViewerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    /// Downloads the whole response body into memory. There is no size cap.
    pub async fn fetch_bytes(&self, url: &str) -> ViewerResult<Vec<u8>> {
        debug!("Downloading {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            error!("Download of {} failed with status {}", url, status);
            return Err(ViewerError::NetworkError(format!(
                "GET {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn fetch_display_image(&self, url: &str) -> ViewerResult<DisplayImage> {
        let bytes = self.fetch_bytes(url).await?;
        DisplayImage::decode(bytes).map_err(|e| {
            error!("Downloaded content from {} is not an image: {}", url, e);
            e
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 155, 58, 255])
            } else {
                Rgba([254, 223, 0, 255])
            }
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_display_image_decode() {
        let png = png_fixture(4, 3);
        let image = DisplayImage::decode(png.clone()).unwrap();

        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 3);
        assert_eq!(image.bytes(), png.as_slice());

        assert!(matches!(
            DisplayImage::decode(b"<html>nope</html>".to_vec()),
            Err(ViewerError::DecodeError(_))
        ));
    }

    #[test]
    fn test_display_image_save_writes_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let png = png_fixture(2, 2);
        let image = DisplayImage::decode(png.clone()).unwrap();

        let target = dir.path().join("flag.png");
        image.save(&target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), png);
    }

    #[tokio::test]
    async fn test_fetch_bytes_and_display_image() {
        let server = MockServer::start().await;
        let png = png_fixture(8, 5);
        Mock::given(method("GET"))
            .and(path("/br.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png.clone()))
            .expect(2)
            .mount(&server)
            .await;

        let service = ImageService::new().unwrap();
        let url = format!("{}/br.png", server.uri());

        let bytes = service.fetch_bytes(&url).await.unwrap();
        assert_eq!(bytes, png);

        let image = service.fetch_display_image(&url).await.unwrap();
        assert_eq!((image.width(), image.height()), (8, 5));
    }

    #[tokio::test]
    async fn test_fetch_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page.png"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not an image"))
            .mount(&server)
            .await;

        let service = ImageService::new().unwrap();

        let err = service
            .fetch_bytes(&format!("{}/missing.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::NetworkError(_)));

        let err = service
            .fetch_display_image(&format!("{}/page.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::DecodeError(_)));

        let err = service.fetch_bytes("http://").await.unwrap_err();
        assert!(matches!(err, ViewerError::NetworkError(_)));
    }
}
