// CLI subcommand definitions using clap derive macros
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::call::{CallFlow, CallSession};
use crate::config::{self, KitConfig};
use crate::error::CallScopeError;
use crate::http::{HttpDriver, HttpMethod};
use crate::twiml::message::OutlineEntry;
use crate::twiml::parse_document;

/// 通話フローのテストキット
#[derive(Parser, Debug, PartialEq)]
#[command(name = "twiml-test-kit")]
pub enum Cli {
    /// アプリケーションに着信させ、応答ドキュメントを表示する
    Call {
        /// 最初にリクエストするパス
        path: String,
        /// JSON設定ファイルパス
        #[arg(long)]
        config: Option<PathBuf>,
        /// ベースURL (設定ファイルより優先)
        #[arg(long)]
        base_url: Option<String>,
        /// 発信元番号
        #[arg(long)]
        from: Option<String>,
        /// 着信先番号
        #[arg(long)]
        to: Option<String>,
        /// 最初のリクエストのメソッド: get|post|put|patch|delete
        #[arg(long)]
        method: Option<HttpMethod>,
        /// たどるリダイレクトの最大数
        #[arg(long, default_value_t = 0)]
        follow: usize,
        /// Gather に入力する数字
        #[arg(long, conflicts_with = "speak")]
        press: Option<String>,
        /// Gather に入力する音声認識結果
        #[arg(long)]
        speak: Option<String>,
        /// [DEBUG] ログを標準エラーに出す
        #[arg(long)]
        debug: bool,
    },
    /// ローカルの XML ファイルを解析して構造を表示する
    Inspect {
        /// XML ファイル
        file: PathBuf,
    },
}

/// 通話の後に実行する操作
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSteps {
    pub follow: usize,
    pub press: Option<String>,
    pub speak: Option<String>,
}

/// call サブコマンドの結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallReport {
    pub call_sid: String,
    pub path: String,
    pub status: u16,
    pub redirects_followed: usize,
    pub outline: Vec<OutlineEntry>,
}

/// CLI 引数を設定に重ねる
pub fn apply_overrides(
    mut config: KitConfig,
    base_url: Option<String>,
    from: Option<String>,
    to: Option<String>,
    method: Option<HttpMethod>,
    debug: bool,
) -> Result<KitConfig, CallScopeError> {
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    if let Some(from) = from {
        config.from = from;
    }
    if let Some(to) = to {
        config.to = to;
    }
    if let Some(method) = method {
        config.method = method;
    }
    config.debug |= debug;

    config.validate().map_err(|errors| {
        CallScopeError::ConfigError(format!("Validation errors: {}", errors.join("; ")))
    })?;
    Ok(config)
}

/// 通話を開始し、指定された操作を順に行う
pub fn run_call_with<D: HttpDriver + 'static>(
    driver: D,
    config: &KitConfig,
    path: &str,
    steps: &CallSteps,
) -> Result<CallReport, CallScopeError> {
    let mut call = CallSession::initiate(driver, path, &config.from, &config.to, config.call_options())?;

    let mut redirects_followed = 0;
    while redirects_followed < steps.follow && call.has_redirect() {
        call.follow_redirect_in_place(&Default::default())?;
        redirects_followed += 1;
    }

    if let Some(digits) = &steps.press {
        call.within_gather(|gather| gather.press(digits))?;
    } else if let Some(text) = &steps.speak {
        call.within_gather(|gather| gather.speak(text))?;
    }

    Ok(CallReport {
        call_sid: call.sid().to_string(),
        path: call.current_path().to_string(),
        status: call.status(),
        redirects_followed,
        outline: call.scope().document().outline(),
    })
}

/// callサブコマンドの実行
pub fn run_call(
    path: &str,
    config_path: Option<&Path>,
    config: KitConfig,
    steps: &CallSteps,
) -> Result<(), CallScopeError> {
    let config = match config_path {
        Some(p) => {
            let file_config = config::load_from_file(p)?;
            merge_file_config(file_config, config)
        }
        None => config,
    };
    let report = run_call_with(config.driver(), &config, path, steps)?;
    println!("{}", to_json(&report)?);
    Ok(())
}

/// ファイルの設定を基準に、デフォルトから変更された CLI 側の値で上書きする
fn merge_file_config(mut file: KitConfig, cli: KitConfig) -> KitConfig {
    let defaults = KitConfig::default();
    if cli.base_url != defaults.base_url {
        file.base_url = cli.base_url;
    }
    if cli.from != defaults.from {
        file.from = cli.from;
    }
    if cli.to != defaults.to {
        file.to = cli.to;
    }
    if cli.method != defaults.method {
        file.method = cli.method;
    }
    file.debug |= cli.debug;
    file
}

/// 文字列を解析してアウトラインを返す
pub fn inspect_str(xml: &str) -> Result<Vec<OutlineEntry>, CallScopeError> {
    Ok(parse_document(xml)?.outline())
}

/// inspectサブコマンドの実行
pub fn run_inspect(file: &Path) -> Result<(), CallScopeError> {
    let xml = std::fs::read_to_string(file)?;
    let outline = inspect_str(&xml)?;
    println!("{}", to_json(&outline)?);
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CallScopeError> {
    serde_json::to_string_pretty(value).map_err(|e| CallScopeError::Io(e.into()))
}
