use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use radio_show::config::Config;
use radio_show::pipeline::{Credentials, ShowPipeline};
use radio_show::types::Language;
use radio_show::voice_catalog::{self, VoiceCatalog, VoiceInfo};
use radio_show::voice_map::{self, Preset, VoiceOverrides};
use radio_show::wav_io;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "radio_show.toml";

#[derive(Debug, Parser)]
#[command(name = "radio-show")]
#[command(about = "K-pop ラジオ番組ジェネレーター (台本生成 + 音声合成 + 効果音)")]
struct Args {
    /// 台本の言語
    #[arg(long, value_enum, alias = "language")]
    lang: Option<Language>,

    /// DJ の音声ID
    #[arg(long)]
    voice_dj: Option<String>,

    /// ファンの音声ID
    #[arg(long)]
    voice_fan: Option<String>,

    /// ゲストの音声ID
    #[arg(long)]
    voice_guest: Option<String>,

    /// アナウンサーの音声ID
    #[arg(long)]
    voice_announcer: Option<String>,

    /// 設定プリセット
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// 効果音を無効化
    #[arg(long, alias = "no-sound-effects")]
    no_sfx: bool,

    /// 出力ファイル名
    #[arg(long)]
    output: Option<String>,

    /// 利用可能な音声を表示して終了
    #[arg(long)]
    list_voices: bool,

    /// 詳細ログ
    #[arg(short, long)]
    verbose: bool,

    /// 設定ファイル
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// デフォルト設定ファイルを生成して終了
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = DEFAULT_CONFIG_PATH)]
    generate_config: Option<PathBuf>,
}

/// ロガー初期化前に設定ファイルからログレベルだけ読む
fn configured_log_level(path: &Path) -> String {
    Config::from_file(path)
        .map(|config| config.output.log_level)
        .unwrap_or_else(|_| "info".to_string())
}

/// アカウントの音声一覧を取得（キー未設定もエラー）
async fn fetch_voices(config: &Config) -> Result<Vec<VoiceInfo>> {
    let api_key = Credentials::eleven_from_env()?;
    let catalog = VoiceCatalog::new(&config.tts.base_url, api_key, config.tts.timeout_seconds)?;
    Ok(catalog.fetch().await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // ロガーを初期化
    let level = if args.verbose {
        "debug".to_string()
    } else {
        configured_log_level(&args.config)
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    // 設定ファイル生成モード
    if let Some(path) = &args.generate_config {
        Config::write_default(path)?;
        println!("設定ファイルを生成しました: {}", path.display());
        return Ok(());
    }

    let mut config = Config::load_or_default(&args.config)?;

    // 音声一覧表示モード
    if args.list_voices {
        voice_catalog::print_voices(fetch_voices(&config).await);
        return Ok(());
    }

    // API呼び出しの前に認証情報を確認
    let credentials = Credentials::from_env()?;

    let overrides = VoiceOverrides {
        dj: args.voice_dj,
        fan: args.voice_fan,
        guest: args.voice_guest,
        announcer: args.voice_announcer,
    };
    let voice_map = voice_map::resolve_voice_map(&mut config, args.preset, &overrides);

    if let Some(language) = args.lang {
        config.language.default_language = language;
    }
    if args.no_sfx {
        config.effects.enabled = false;
    }
    if let Some(output) = args.output {
        config.output.final_filename = output;
    }

    config.ensure_directories()?;

    log::info!("{} を開始します", config.output.show_name);
    log::debug!("設定: {:?}", config);

    let timestamp = wav_io::timestamp();
    let pipeline = ShowPipeline::from_config(&config, voice_map, &credentials)?;
    let report = pipeline.run(&timestamp).await;
    report.print_summary();

    if report.output.is_fatal() {
        log::error!("番組の出力に失敗しました。ログを確認してください");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "radio-show",
            "--lang",
            "korean",
            "--preset",
            "full_production",
            "--voice-dj",
            "abc",
            "--no-sfx",
            "-v",
        ]);
        assert_eq!(args.lang, Some(Language::Korean));
        assert_eq!(args.preset, Some(Preset::FullProduction));
        assert_eq!(args.voice_dj.as_deref(), Some("abc"));
        assert!(args.no_sfx);
        assert!(args.verbose);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.generate_config.is_none());
    }

    #[test]
    fn test_long_aliases() {
        let args = Args::parse_from(["radio-show", "--language", "english", "--no-sound-effects"]);
        assert_eq!(args.lang, Some(Language::English));
        assert!(args.no_sfx);
    }

    #[test]
    fn test_generate_config_default_path() {
        let args = Args::parse_from(["radio-show", "--generate-config"]);
        assert_eq!(args.generate_config, Some(PathBuf::from(DEFAULT_CONFIG_PATH)));

        let args = Args::parse_from(["radio-show", "--generate-config", "custom.toml"]);
        assert_eq!(args.generate_config, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn test_log_level_falls_back_to_info() {
        assert_eq!(configured_log_level(Path::new("nonexistent_file.toml")), "info");
    }
}
