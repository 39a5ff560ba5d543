use crate::config::Config;
use clap::{Args, Parser, Subcommand};
use objectify_common::{MatchConfig, ParseMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "objectify")]
#[command(about = "写真の雰囲気から曲を推薦するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// 照合オプション（解析系コマンド共通）
#[derive(Args, Debug, Clone, Default)]
pub struct MatchArgs {
    /// 曲カタログCSV（省略時は設定 / OBJECTIFY_CATALOG / ./catalog.csv）
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// レスポンスの読み方 (lenient/strict/structured)
    #[arg(short, long, default_value = "lenient")]
    pub mode: ParseMode,

    /// 許容幅（0〜1スケール、省略時は設定値）
    #[arg(short, long)]
    pub tolerance: Option<f64>,

    /// 地域ラベルを照合に使わない
    #[arg(long)]
    pub ignore_region: bool,

    /// 最大件数（省略時は設定値）
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// speechiness も許容幅で絞り込む
    #[arg(long)]
    pub speechiness_tolerance: Option<f64>,

    /// acousticness も許容幅で絞り込む
    #[arg(long)]
    pub acousticness_tolerance: Option<f64>,
}

impl MatchArgs {
    /// 設定ファイルの値に引数を上書きした照合設定
    pub fn match_config(&self, config: &Config) -> MatchConfig {
        let base = config.match_config();
        MatchConfig {
            tolerance: self.tolerance.unwrap_or(base.tolerance),
            limit: self.limit.unwrap_or(base.limit),
            match_region: !self.ignore_region,
            speechiness_tolerance: self.speechiness_tolerance,
            acousticness_tolerance: self.acousticness_tolerance,
            ..base
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真1枚を解析して曲を推薦
    Analyze {
        /// 画像ファイル
        #[arg(required = true)]
        image: PathBuf,

        #[command(flatten)]
        matching: MatchArgs,

        /// 結果JSONの出力先
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// キャッシュを使用（同じ画像の再解析をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 推薦曲を選んでリンクを開く
        #[arg(long)]
        open: bool,
    },

    /// フォルダから写真を選んで解析
    Pick {
        /// 写真フォルダ
        #[arg(required = true)]
        folder: PathBuf,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        #[command(flatten)]
        matching: MatchArgs,

        /// 結果JSONの出力先
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// キャッシュを使用
        #[arg(long)]
        use_cache: bool,

        /// 推薦曲を選んでリンクを開く
        #[arg(long)]
        open: bool,
    },

    /// フォルダを監視し、新しい写真を自動で解析
    Watch {
        /// 監視するフォルダ（カメラの保存先など）
        #[arg(required = true)]
        folder: PathBuf,

        /// ポーリング間隔（秒）
        #[arg(short, long, default_value = "2")]
        interval: u64,

        /// サブフォルダも監視
        #[arg(short = 'r', long)]
        recursive: bool,

        #[command(flatten)]
        matching: MatchArgs,

        /// キャッシュを使用
        #[arg(long)]
        use_cache: bool,
    },

    /// 保存済みの解析テキストで照合だけやり直す（API呼び出しなし）
    Rematch {
        /// 解析テキストファイル（- で標準入力）
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        matching: MatchArgs,
    },

    /// カタログの概要を表示
    Catalog {
        /// 曲カタログCSV
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 既定のカタログCSVを設定
        #[arg(long)]
        set_catalog: Option<PathBuf>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}
