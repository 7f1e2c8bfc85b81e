//! 驗證節點代理統一錯誤類型定義
//!
//! 本模塊定義了代理運行過程中可能遇到的所有錯誤類型，
//! 使用 thiserror crate 提供良好的錯誤鏈和上下文信息。

use thiserror::Error;

/// 驗證節點代理錯誤類型
///
/// 涵蓋所有子系統的錯誤情況：
/// - 密鑰庫加密/解密
/// - 會話簽名
/// - 配置管理
/// - 網絡探測傳輸層
///
/// 注意：探測結果 `Bad` **不是**錯誤 —— 它是正常的業務結果，
/// 永遠以 `MonitoringResult` 的形式返回，不會拋出。
#[derive(Error, Debug)]
pub enum AgentError {
    /// 配置錯誤
    ///
    /// 當配置文件格式錯誤、URL 或超時參數不合法時返回此錯誤
    #[error("Configuration error: {0}")]
    Config(String),

    /// 私鑰格式錯誤
    ///
    /// 當提供的私鑰不是語法上有效的 secp256k1 私鑰時返回此錯誤
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    /// 認證失敗
    ///
    /// 密碼錯誤、密鑰庫損壞或 MAC 校驗失敗時返回此錯誤。
    /// 錯誤消息刻意不區分是哪一項檢查失敗，避免構成密碼預言機。
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 地址一致性校驗失敗
    ///
    /// 解密後重新推導的地址與密鑰庫記錄的地址不一致時返回此錯誤
    /// （縱深防禦：檢測 MAC 被一致性改寫的文件損壞）
    #[error("Address mismatch: {0}")]
    AddressMismatch(String),

    /// 未認證
    ///
    /// 在沒有活躍簽名會話的情況下調用簽名操作時返回此錯誤
    #[error("Not authenticated: no active signing session")]
    NotAuthenticated,

    /// 傳輸層錯誤
    ///
    /// 重試耗盡後的網絡失敗（僅內部使用；對探測調用方總是折疊為 Bad 結果）
    #[error("Transport error: {0}")]
    Transport(String),

    /// 序列化/反序列化錯誤
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP 請求錯誤
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// I/O 錯誤
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 通用錯誤
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 類型別名
///
/// 使用統一的錯誤類型簡化函數簽名
pub type Result<T> = std::result::Result<T, AgentError>;

/// 從 JSON 錯誤轉換
impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

/// 從簽名庫錯誤轉換
impl From<evm_signer::SignerError> for AgentError {
    fn from(err: evm_signer::SignerError) -> Self {
        match err {
            evm_signer::SignerError::KeyFormat(msg) => AgentError::KeyFormat(msg),
            other => AgentError::Authentication(other.to_string()),
        }
    }
}
