//! objectify: 写真の雰囲気から曲を推薦するCLI
//!
//! 曲カタログ・パース・照合は objectify_common、
//! ここでは設定、画像の取得と送信、表示、フォルダ監視を扱う。

pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod pipeline;
pub mod presenter;
pub mod scanner;
pub mod watch;
