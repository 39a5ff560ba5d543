//! プロンプト生成モジュール
//!
//! 画像解析サービスに送る指示文:
//! - REGIONS: 地域ラベルの候補
//! - build_descriptor_prompt: 1行1値の行形式（末尾7行を位置で読む）
//! - build_structured_prompt: JSONオブジェクト形式

use crate::types::Feature;

/// 地域ラベル（カタログの region 列と同じ表記）
pub const REGIONS: &[&str] = &[
    "Latin-America",
    "Asia",
    "Anglo-America",
    "Europe",
    "Africa",
    "Oceania",
];

/// 解析失敗時にユーザーへ表示する固定メッセージ
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze image. Please try again.";

/// 特徴量ごとの値域の説明行
fn feature_range_lines() -> String {
    Feature::ALL
        .iter()
        .map(|f| {
            let (min, max) = f.range();
            let note = match f {
                Feature::Loudness => " (lower value means quieter)",
                _ => "",
            };
            let mut name = f.name().to_string();
            name[..1].make_ascii_uppercase();
            format!("{} between {} and {}{};", name, min, max, note)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 行形式プロンプト
///
/// レスポンスの末尾7行が danceability, energy, loudness, speechiness,
/// acousticness, valence, region の順になることを前提にパースされる。
pub fn build_descriptor_prompt() -> String {
    format!(
        r#"Analyze the given image and identify the closest object within the scene.
For each characteristic answer in one word on a new line to later use as features. Do not include feature names in the answer, just the values you produce.
Name object category;
Potential material(s);
Religious/belief significance if it has any, if none then leave as None;
Main colour;
Three main moods it gives (each on a new line);
Historical or symbolic context (e.g., ancient, modern, ceremonial, etc.);
Associated sound or auditory quality (e.g., chime, drum, silence, etc.);
Based on the characteristics that you produce, map them to these Spotify song feature values:
{ranges}
Region ({regions});
Don't output any whitespace-only lines and don't include names for song features, only values. The last seven lines must be the six feature values followed by the region."#,
        ranges = feature_range_lines(),
        regions = REGIONS.join(", "),
    )
}

/// JSON形式プロンプト
///
/// `responseMimeType: application/json` と組み合わせて使う。
pub fn build_structured_prompt() -> String {
    let keys = Feature::ALL
        .iter()
        .map(|f| format!("  \"{}\": number", f.name()))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"Analyze the given image and identify the closest object within the scene.
Consider its category, potential materials, religious/belief significance, main colour, three main moods, historical or symbolic context and associated sound.
Based on those characteristics, map the image to Spotify song feature values in these ranges:
{ranges}
Choose the cultural region from: {regions}.

Output ONLY a JSON object exactly in this format:
{{
  "object": "string",
  "moods": ["string", "string", "string"],
{keys},
  "region": "string"
}}"#,
        ranges = feature_range_lines(),
        regions = REGIONS.join(", "),
        keys = keys,
    )
}
