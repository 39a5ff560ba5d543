//! 結果表示
//!
//! 画面描画の代わりに標準出力へ推薦結果を出す。曲の選択とリンクを開く処理もここ。

use crate::error::Result;
use crate::pipeline::Recommendation;
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use objectify_common::{CatalogEntry, TargetFeatureVector};
use std::process::Command;
use std::time::Duration;

/// 解析待ちのスピナー
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub fn format_target(target: &TargetFeatureVector) -> String {
    let f = &target.features;
    format!(
        "danceability={:.3} energy={:.3} loudness={:.1}dB speechiness={:.3} acousticness={:.3} valence={:.3} region={}",
        f.danceability,
        f.energy,
        f.loudness,
        f.speechiness,
        f.acousticness,
        f.valence,
        target.region_filter().unwrap_or("(any)"),
    )
}

pub fn format_track(index: usize, track: &CatalogEntry) -> String {
    let region = track
        .region
        .as_deref()
        .map(|r| format!(" [{}]", r))
        .unwrap_or_default();
    format!("{}. {} - {}{}", index + 1, track.track_name, track.artists, region)
}

/// 推薦結果を表示
pub fn print_recommendation(rec: &Recommendation, verbose: bool) {
    println!("📷 {} ({})", rec.file_name, rec.request_id);

    if rec.is_failed() {
        println!("⚠ {}", rec.response_text);
        return;
    }

    if verbose {
        println!("\n--- 解析テキスト{} ---", if rec.from_cache { " (キャッシュ)" } else { "" });
        println!("{}", rec.response_text.trim_end());
        println!("---");
    }

    if let Some(target) = &rec.target {
        print_matches(target, &rec.tracks);
    }
}

/// 照合ターゲットと一致した曲を表示
pub fn print_matches(target: &TargetFeatureVector, tracks: &[CatalogEntry]) {
    println!("🎚 {}", format_target(target));

    if tracks.is_empty() {
        println!("条件に合う曲が見つかりませんでした");
        return;
    }

    println!("\n🎵 おすすめの曲:");
    for (i, track) in tracks.iter().enumerate() {
        println!("  {}", format_track(i, track));
        println!("     {}", track.spotify_url());
    }
}

/// 曲を選んでリンクを開く（キャンセル時は何もしない）
pub fn select_and_open(rec: &Recommendation) -> Result<()> {
    if rec.tracks.is_empty() {
        return Ok(());
    }

    let items: Vec<String> = rec
        .tracks
        .iter()
        .enumerate()
        .map(|(i, t)| format_track(i, t))
        .collect();

    let selection = Select::new()
        .with_prompt("開く曲を選択（Escでスキップ）")
        .items(&items)
        .default(0)
        .interact_opt()?;

    if let Some(index) = selection {
        let url = rec.tracks[index].spotify_url();
        println!("→ {}", url);
        open_url(&url);
    }

    Ok(())
}

/// OSのリンクハンドラでURLを開く（失敗してもログのみ）
pub fn open_url(url: &str) {
    #[cfg(windows)]
    let result = Command::new("cmd").args(["/c", "start", "", url]).spawn();

    #[cfg(target_os = "macos")]
    let result = Command::new("open").arg(url).spawn();

    #[cfg(all(unix, not(target_os = "macos")))]
    let result = Command::new("xdg-open").arg(url).spawn();

    if let Err(e) = result {
        tracing::warn!(url = %url, error = %e, "リンクを開けませんでした");
    }
}
