//! 画像解析サービス連携
//!
//! 画像をインラインで送り、説明テキストを受け取る。
//! テキストのパースと曲照合は objectify_common 側で行う。

pub mod cache;
mod gemini;
mod encode;

pub use cache::CacheFile;
pub use gemini::GeminiClient;
pub use encode::{detect_mime_type, EncodedImage};

use crate::error::Result;
use async_trait::async_trait;
use objectify_common::ParseMode;

/// 画像→説明テキスト
#[async_trait]
pub trait DescriptorService: Send + Sync {
    /// 1回だけ問い合わせる（リトライなし）
    async fn describe(&self, image: &EncodedImage, mode: ParseMode) -> Result<String>;
}
