// Configuration manager module
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::call::{CallOptions, DEFAULT_DIRECTION};
use crate::error::CallScopeError;
use crate::http::{HttpMethod, UreqDriver};

/// 実行設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitConfig {
    /// アプリケーションのベースURL
    pub base_url: String,
    pub timeout_secs: u64,
    /// 最初のリクエストのメソッド
    pub method: HttpMethod,
    pub from: String,
    pub to: String,
    pub direction: String,
    pub is_machine: bool,
    pub called: Option<String>,
    pub call_status: Option<String>,
    pub debug: bool,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 10,
            method: HttpMethod::Post,
            from: "2065551212".to_string(),
            to: "2065553434".to_string(),
            direction: DEFAULT_DIRECTION.to_string(),
            is_machine: false,
            called: None,
            call_status: None,
            debug: false,
        }
    }
}

impl KitConfig {
    /// 設定値のバリデーション
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            errors.push("base_url must start with http:// or https://".to_string());
        }
        if self.timeout_secs == 0 {
            errors.push("timeout_secs must be greater than 0".to_string());
        }
        if self.from.is_empty() {
            errors.push("from must not be empty".to_string());
        }
        if self.to.is_empty() {
            errors.push("to must not be empty".to_string());
        }
        if self.direction.is_empty() {
            errors.push("direction must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 通話開始オプション (CallSid は毎回生成)
    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            method: self.method,
            call_sid: None,
            is_machine: self.is_machine,
            called: self.called.clone(),
            direction: self.direction.clone(),
            call_status: self.call_status.clone(),
            debug: self.debug,
        }
    }

    pub fn driver(&self) -> UreqDriver {
        UreqDriver::new(self.base_url.clone(), self.timeout())
    }
}

/// JSON文字列から設定を読み込み、バリデーションを実行する
pub fn load_from_str(json: &str) -> Result<KitConfig, CallScopeError> {
    let config: KitConfig = serde_json::from_str(json)
        .map_err(|e| CallScopeError::ConfigError(format!("JSON parse error: {}", e)))?;

    config.validate().map_err(|errors| {
        CallScopeError::ConfigError(format!("Validation errors: {}", errors.join("; ")))
    })?;

    Ok(config)
}

/// JSONファイルから設定を読み込み、バリデーションを実行する
pub fn load_from_file(path: &Path) -> Result<KitConfig, CallScopeError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CallScopeError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    load_from_str(&content)
}



#[cfg(test)]
mod proptests {
    use super::generators::arb_kit_config;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // 設定のラウンドトリップ
        #[test]
        fn prop_config_roundtrip(config in arb_kit_config()) {
            let json = serde_json::to_string(&config).unwrap();
            let loaded = load_from_str(&json).unwrap();
            prop_assert_eq!(loaded, config);
        }

        // 生成された設定は常に有効
        #[test]
        fn prop_generated_config_is_valid(config in arb_kit_config()) {
            prop_assert!(config.validate().is_ok());
        }
    }
}
