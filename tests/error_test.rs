//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use objectify::descriptor::EncodedImage;
use objectify::error::ObjectifyError;
use objectify::scanner;
use objectify_common::{parse_response, Catalog, ParseMode};
use std::path::Path;
use tempfile::tempdir;

/// 存在しないフォルダをスキャンした場合
#[test]
fn test_scan_nonexistent_folder() {
    let result = scanner::scan_folder(Path::new("/nonexistent/path/12345"), false);
    assert!(matches!(result, Err(ObjectifyError::FolderNotFound(_))));
}

/// 画像のないフォルダをスキャンした場合
#[test]
fn test_scan_folder_no_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("catalog.csv"), "track_id").unwrap();

    let images = scanner::scan_folder(dir.path(), false).unwrap();
    assert!(images.is_empty());
}

/// 非再帰スキャンはサブフォルダを見ない
#[test]
fn test_scan_recursive_flag() {
    let dir = tempdir().expect("Failed to create temp dir");
    let sub = dir.path().join("DCIM");
    std::fs::create_dir(&sub).unwrap();
    std::fs::write(dir.path().join("top.JPG"), b"jpeg").unwrap();
    std::fs::write(sub.join("inner.png"), b"png").unwrap();

    assert_eq!(scanner::scan_folder(dir.path(), false).unwrap().len(), 1);
    assert_eq!(scanner::scan_folder(dir.path(), true).unwrap().len(), 2);
}

/// 存在しない画像の読み込み
#[test]
fn test_load_missing_image() {
    let result = EncodedImage::load(Path::new("/nonexistent/photo.jpg"), 0);
    assert!(matches!(result, Err(ObjectifyError::FileNotFound(_))));
}

/// 画像でないファイルの読み込み
#[test]
fn test_load_unsupported_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "not an image").unwrap();

    let result = EncodedImage::load(&path, 0);
    assert!(matches!(result, Err(ObjectifyError::ImageLoad(_))));
}

/// 共通クレートのエラーはそのまま表示される
#[test]
fn test_common_error_is_transparent() {
    let inner = parse_response("no numbers here", ParseMode::Strict).unwrap_err();
    let message = inner.to_string();
    let err: ObjectifyError = inner.into();
    assert!(matches!(err, ObjectifyError::Common(_)));
    assert_eq!(err.to_string(), message);
}

/// 存在しないカタログ
#[test]
fn test_catalog_missing_file() {
    let result = Catalog::from_path(Path::new("/nonexistent/catalog.csv"));
    assert!(result.is_err());

    let catalog = Catalog::load_or_empty(Path::new("/nonexistent/catalog.csv"));
    assert!(catalog.is_empty());
}

/// ObjectifyErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        ObjectifyError::Config("テスト設定エラー".to_string()),
        ObjectifyError::MissingApiKey,
        ObjectifyError::FileNotFound("bell.jpg".to_string()),
        ObjectifyError::FolderNotFound("/camera".to_string()),
        ObjectifyError::NoImagesFound("/camera".to_string()),
        ObjectifyError::ApiCall("503".to_string()),
        ObjectifyError::ApiParse("no candidates".to_string()),
        ObjectifyError::Cancelled,
    ];

    for err in errors {
        assert!(!err.to_string().is_empty());
    }

    assert!(ObjectifyError::MissingApiKey.to_string().contains("GEMINI_API_KEY"));
}

/// IOエラーの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: ObjectifyError = io_err.into();
    assert!(matches!(err, ObjectifyError::Io(_)));
}
