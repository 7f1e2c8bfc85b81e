//! 共享數據類型定義
//!
//! 本模塊定義代理中各個子系統共享的數據結構

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 探測分類結果
///
/// 注意：`Bad` 是正常業務結果，不是錯誤 —— 探測失敗（超時、
/// 連接拒絕、非預期狀態碼）都折疊為 `Bad`，不會向調用方拋出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    /// 最終狀態碼在預期集合內
    Good,
    /// 任何其他結果（含傳輸層失敗）
    Bad,
}

/// 監控探測請求
///
/// 由外部編排器提供，`callback_id` 作為關聯令牌原樣返回
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringRequest {
    /// 探測目標 URL（必須是 http/https）
    pub url: String,

    /// 關聯令牌，結果中原樣攜帶
    pub callback_id: String,

    /// 預期狀態碼集合（默認 {200, 201, 202, 204}）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_status_codes: Option<Vec<u16>>,

    /// 單次請求超時（毫秒，默認取配置值）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// HTTP 方法（默認 GET）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// 附加請求頭
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// 可選：響應體必須包含的子串（僅在基線 Good 後檢查，
    /// 不匹配時降級為 Bad）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_content: Option<String>,
}

impl MonitoringRequest {
    /// 創建最小化請求（僅 URL 和關聯令牌）
    pub fn new(url: impl Into<String>, callback_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            callback_id: callback_id.into(),
            expected_status_codes: None,
            timeout_ms: None,
            method: None,
            headers: None,
            expected_content: None,
        }
    }
}

/// 監控探測結果
///
/// 不變量：每個提交的請求恰好產生一個結果，無論成功與否
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringResult {
    /// 與請求一致的關聯令牌
    pub callback_id: String,

    /// 分類結果
    pub status: ProbeStatus,

    /// 延遲（小數毫秒，單調高精度時鐘，含內部重試）
    pub latency_ms: f64,

    /// 最終 HTTP 狀態碼（傳輸層失敗時為 None）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    /// 失敗描述（如有）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 結果產生時間戳（Unix 毫秒）
    pub timestamp: i64,
}

/// 簽名消息
///
/// `message` 是實際被簽名的規範化字符串，其中已嵌入
/// `payload`、`timestamp` 與 `nonce`（按鍵名排序），
/// 因此簽名同時覆蓋負載與防重放字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedMessage {
    /// 簽名（hex 編碼的 65 字節 r||s||v）
    pub signature: String,

    /// 被簽名的規範化消息字符串
    pub message: String,

    /// 簽名時間戳（Unix 毫秒）
    pub timestamp: i64,

    /// 每次簽名唯一的隨機 nonce（hex 編碼 16 字節）
    pub nonce: String,

    /// 簽名者公鑰（hex 編碼未壓縮格式）
    pub public_key: String,
}

/// 接收方時間戳新鮮度默認值：最大年齡 5 分鐘
pub const DEFAULT_MAX_AGE_MS: i64 = 5 * 60 * 1000;

/// 接收方時間戳新鮮度默認值：允許的未來時鐘偏差 60 秒
pub const DEFAULT_FUTURE_SKEW_MS: i64 = 60 * 1000;

impl SignedMessage {
    /// 接收方新鮮度檢查（防重放 + 容忍時鐘偏差）
    ///
    /// 時間戳有效當且僅當
    /// `now - max_age_ms <= timestamp <= now + future_skew_ms`
    pub fn is_fresh_at(&self, now_ms: i64, max_age_ms: i64, future_skew_ms: i64) -> bool {
        self.timestamp >= now_ms - max_age_ms && self.timestamp <= now_ms + future_skew_ms
    }

    /// 使用默認窗口（5 分鐘 / 60 秒）檢查當前時刻的新鮮度
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(
            chrono::Utc::now().timestamp_millis(),
            DEFAULT_MAX_AGE_MS,
            DEFAULT_FUTURE_SKEW_MS,
        )
    }
}

/// 密鑰庫目錄枚舉條目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    /// 錢包名稱（文件名去掉 .json 後綴）
    pub name: String,

    /// 校驗和地址
    pub address: String,

    /// 密鑰庫文件完整路徑
    pub path: String,
}

/// 代理運行時配置
///
/// 由外部 ConfigManager（config.rs）提供；此處僅定義結構與默認值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// 密鑰庫目錄
    pub keystore_dir: String,

    /// HTTP 探測默認超時（毫秒）
    pub default_timeout_ms: u64,

    /// 最大並發探測數（有界工作槽數量）
    pub max_concurrent_requests: usize,

    /// 傳輸層失敗重試次數
    pub retry_attempts: u32,

    /// 重試基礎延遲（毫秒，線性退避：delay × attempt）
    pub retry_delay_ms: u64,

    /// 探測請求 User-Agent
    pub user_agent: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            keystore_dir: std::env::var("KEYSTORE_DIR")
                .unwrap_or_else(|_| "./keystore".to_string()),
            default_timeout_ms: std::env::var("DEFAULT_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            max_concurrent_requests: std::env::var("MAX_CONCURRENT_REQUESTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            retry_attempts: std::env::var("RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            retry_delay_ms: std::env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
            user_agent: std::env::var("USER_AGENT")
                .unwrap_or_else(|_| format!("validator-agent/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}
