//! 送信用画像のエンコード
//!
//! 長辺が `max_size` を超える画像は縮小してJPEGに再エンコードし、Base64にする。
//! キャッシュキーには元ファイルのSHA-256を使う（縮小設定に依存しない）。

use crate::error::{ObjectifyError, Result};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use sha2::{Digest, Sha256};
use std::path::Path;

const JPEG_QUALITY: u8 = 85;

/// インライン送信する画像
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub file_name: String,
    pub mime_type: String,
    /// Base64エンコード済みデータ
    pub data: String,
    /// 元ファイルのSHA-256（hex）
    pub sha256: String,
}

impl EncodedImage {
    /// ファイルから読み込む（max_size = 0 なら縮小しない）
    pub fn load(path: &Path, max_size: u32) -> Result<Self> {
        if !path.is_file() {
            return Err(ObjectifyError::FileNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime_type = detect_mime_type(path, &bytes).ok_or_else(|| {
            ObjectifyError::ImageLoad(format!("対応していない画像形式です: {}", path.display()))
        })?;

        Self::from_bytes(file_name, &bytes, mime_type, max_size)
    }

    pub fn from_bytes(file_name: String, bytes: &[u8], mime_type: &str, max_size: u32) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ObjectifyError::ImageLoad(format!("空のファイルです: {}", file_name)));
        }

        let sha256 = hex::encode(Sha256::digest(bytes));

        let (payload, mime_type) = match downscale(bytes, max_size) {
            Ok(Some(jpeg)) => (jpeg, "image/jpeg".to_string()),
            Ok(None) => (bytes.to_vec(), mime_type.to_string()),
            Err(e) => {
                // デコードできない画像もそのまま送る（判定はサービス側に任せる）
                tracing::warn!(file = %file_name, error = %e, "画像を縮小できないため元データを送信します");
                (bytes.to_vec(), mime_type.to_string())
            }
        };

        Ok(Self {
            file_name,
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(payload),
            sha256,
        })
    }

    /// Base64データのバイト数
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }
}

/// MIMEタイプ判定（先頭バイト優先、次に拡張子）
pub fn detect_mime_type(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(bytes) {
        return Some(format.to_mime_type());
    }

    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// 長辺が max_size を超える場合のみ縮小してJPEGバイト列を返す
fn downscale(bytes: &[u8], max_size: u32) -> image::ImageResult<Option<Vec<u8>>> {
    if max_size == 0 {
        return Ok(None);
    }

    let img = image::load_from_memory(bytes)?;
    if img.width().max(img.height()) <= max_size {
        return Ok(None);
    }

    let resized = img.resize(max_size, max_size, FilterType::Triangle);
    tracing::debug!(
        from = %format!("{}x{}", img.width(), img.height()),
        to = %format!("{}x{}", resized.width(), resized.height()),
        "送信前に画像を縮小"
    );

    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
        encoder.encode_image(&resized.to_rgb8())?;
    }
    Ok(Some(buffer))
}
