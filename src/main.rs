use clap::Parser;
use dialoguer::Select;
use objectify::{cli, config, descriptor, error, pipeline, presenter, scanner, watch};
use cli::{Cli, Commands, MatchArgs};
use config::Config;
use descriptor::{CacheFile, GeminiClient};
use error::{ObjectifyError, Result};
use objectify_common::{Catalog, RequestTracker};
use pipeline::{Recommendation, Recommender};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load()?;
    let tracker = RequestTracker::new();

    match cli.command {
        Commands::Analyze { image, matching, output, use_cache, open } => {
            println!("🎧 objectify - 写真解析\n");

            let recommender = build_recommender(&config, &matching, use_cache)?;
            let rec = run_single(&recommender, &image, &tracker).await?;
            finish(&rec, output.as_deref(), open, cli.verbose)?;
        }

        Commands::Pick { folder, recursive, matching, output, use_cache, open } => {
            println!("🎧 objectify - 写真を選んで解析\n");

            let images = scanner::scan_folder(&folder, recursive)?;
            if images.is_empty() {
                return Err(ObjectifyError::NoImagesFound(folder.display().to_string()));
            }

            let labels: Vec<String> = images.iter().map(|i| i.label()).collect();
            let selection = Select::new()
                .with_prompt("解析する写真を選択")
                .items(&labels)
                .default(images.len() - 1)
                .interact_opt()?;
            let Some(index) = selection else {
                return Err(ObjectifyError::Cancelled);
            };

            let recommender = build_recommender(&config, &matching, use_cache)?;
            let rec = run_single(&recommender, &images[index].path, &tracker).await?;
            finish(&rec, output.as_deref(), open, cli.verbose)?;
        }

        Commands::Watch { folder, interval, recursive, matching, use_cache } => {
            println!("🎧 objectify - 監視モード\n");

            if !folder.is_dir() {
                return Err(ObjectifyError::FolderNotFound(folder.display().to_string()));
            }

            let recommender = Arc::new(build_recommender(&config, &matching, use_cache)?);
            let options = watch::WatchOptions {
                interval: Duration::from_secs(interval.max(1)),
                recursive,
                verbose: cli.verbose,
            };
            watch::watch_folder(recommender, &folder, options).await?;
        }

        Commands::Rematch { input, matching } => {
            let text = if input == Path::new("-") {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                if !input.exists() {
                    return Err(ObjectifyError::FileNotFound(input.display().to_string()));
                }
                std::fs::read_to_string(&input)?
            };

            let catalog = load_catalog(&config, &matching);
            let match_config = matching.match_config(&config);
            let (target, matched) = pipeline::rematch(&catalog, &match_config, matching.mode, &text)?;
            presenter::print_matches(&target, &matched.tracks);
        }

        Commands::Catalog { catalog } => {
            let path = config.resolve_catalog_path(catalog.as_deref());
            let catalog = Catalog::from_path(&path)?;

            println!("カタログ: {}", path.display());
            println!("  曲数: {}", catalog.len());
            println!("  特徴量が欠けた行: {}", catalog.incomplete_rows());
            let regions = catalog.regions();
            if regions.is_empty() {
                println!("  地域: (なし)");
            } else {
                println!("  地域: {}", regions.join(", "));
            }
        }

        Commands::Config { set_api_key, set_catalog, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if let Some(path) = set_catalog {
                config.set_catalog_path(path)?;
                println!("✔ カタログを設定しました");
            }

            if show {
                println!("設定: {}", Config::config_path()?.display());
                println!("  モデル: {}", config.model);
                println!("  APIエンドポイント: {}", config.api_base_url);
                println!("  カタログ: {}", config.resolve_catalog_path(None).display());
                println!("  許容幅: {}", config.tolerance);
                println!("  最大件数: {}", config.match_limit);
                println!("  最大画像サイズ: {}px", config.max_image_size);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  APIキー: {}", if config.get_api_key().is_ok() { "設定済み" } else { "未設定" });
            }
        }

        Commands::Cache { clear, info } => {
            let dir = Config::config_dir()?;
            let cache_path = CacheFile::cache_path(&dir);

            if info || !clear {
                if cache_path.exists() {
                    let cache = CacheFile::load(&dir);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                if CacheFile::clear(&dir)? {
                    println!("✔ キャッシュを削除しました");
                } else {
                    println!("削除するキャッシュがありません");
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "objectify=debug,objectify_common=debug"
    } else {
        "objectify=info,objectify_common=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_catalog(config: &Config, matching: &MatchArgs) -> Catalog {
    let path = config.resolve_catalog_path(matching.catalog.as_deref());
    let catalog = Catalog::load_or_empty(&path);
    if catalog.is_empty() {
        println!("⚠ カタログが空です（{}）。推薦は0件になります\n", path.display());
    }
    catalog
}

fn build_recommender(config: &Config, matching: &MatchArgs, use_cache: bool) -> Result<Recommender<GeminiClient>> {
    let client = GeminiClient::from_config(config)?;
    let catalog = Arc::new(load_catalog(config, matching));

    let recommender = Recommender::new(client, catalog, matching.match_config(config), matching.mode)
        .with_max_image_size(config.max_image_size);

    if use_cache {
        Ok(recommender.with_cache(&Config::config_dir()?))
    } else {
        Ok(recommender)
    }
}

async fn run_single(
    recommender: &Recommender<GeminiClient>,
    image: &Path,
    tracker: &RequestTracker,
) -> Result<Recommendation> {
    let id = tracker.issue();
    let spinner = presenter::spinner("AI解析中...");
    let result = recommender.recommend(image, id).await;
    spinner.finish_and_clear();
    result
}

fn finish(rec: &Recommendation, output: Option<&Path>, open: bool, verbose: bool) -> Result<()> {
    presenter::print_recommendation(rec, verbose);

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(rec)?;
        std::fs::write(output, json)?;
        println!("\n✔ 結果を保存: {}", output.display());
    }

    if open && !rec.is_failed() {
        presenter::select_and_open(rec)?;
    }

    Ok(())
}
