//! 配置管理模塊
//!
//! 負責加載和驗證代理節點配置

use crate::error::{AgentError, Result};
use crate::types::AgentConfig;
use config::{Config, File};
use std::path::Path;

/// 從配置文件加載代理配置
///
/// # 參數
/// - `config_path`: 配置文件路徑（支持 TOML、JSON、YAML）
///
/// # 返回
/// - `Ok(AgentConfig)`: 成功加載的配置
/// - `Err(AgentError)`: 配置文件格式錯誤或缺少必要字段
///
/// # 示例
/// ```no_run
/// use agent_node::config::load_config;
///
/// let config = load_config("config.toml").expect("Failed to load config");
/// println!("Keystore dir: {}", config.keystore_dir);
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<AgentConfig> {
    let config = Config::builder()
        .add_source(File::from(config_path.as_ref()))
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to load config file: {}", e)))?;

    let agent_config: AgentConfig = config
        .try_deserialize()
        .map_err(|e| AgentError::Config(format!("Failed to parse config: {}", e)))?;

    validate_config(&agent_config)?;

    Ok(agent_config)
}

/// 從環境變量加載配置（用於容器化部署）
///
/// 環境變量前綴: `AGENT_`
/// 示例: `AGENT_KEYSTORE_DIR`, `AGENT_MAX_CONCURRENT_REQUESTS`
pub fn load_config_from_env() -> Result<AgentConfig> {
    let config = Config::builder()
        .add_source(config::Environment::with_prefix("AGENT"))
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to load env vars: {}", e)))?;

    let agent_config: AgentConfig = config
        .try_deserialize()
        .map_err(|e| AgentError::Config(format!("Failed to parse env config: {}", e)))?;

    validate_config(&agent_config)?;

    Ok(agent_config)
}

/// 驗證配置的有效性
///
/// 檢查:
/// - 並發槽數與超時是否為正
/// - 密鑰庫目錄是否非空
fn validate_config(config: &AgentConfig) -> Result<()> {
    if config.max_concurrent_requests == 0 {
        return Err(AgentError::Config(
            "max_concurrent_requests must be greater than 0".to_string(),
        ));
    }

    if config.default_timeout_ms == 0 {
        return Err(AgentError::Config(
            "default_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if config.keystore_dir.is_empty() {
        return Err(AgentError::Config(
            "keystore_dir must not be empty".to_string(),
        ));
    }

    if config.user_agent.is_empty() {
        return Err(AgentError::Config(
            "user_agent must not be empty".to_string(),
        ));
    }

    Ok(())
}
