//! 驗證節點代理
//!
//! 本 crate 實現了一個驗證節點的核心代理組件，負責:
//! 1. 以加密形式管理 secp256k1 驗證密鑰（Web3 Keystore V3 兼容）
//! 2. 對出站消息做帶防重放字段的可恢復簽名
//! 3. 對目標端點執行有界並發的 HTTP 健康探測
//!
//! # 架構
//!
//! ```text
//! ┌──────────────────┐
//! │  MessageSigner   │  ← 會話簽名（認證 / 簽名 / 鎖定）
//! └────────┬─────────┘
//!          │
//!     ┌────┴─────┐          ┌──────────────────┐
//!     ▼          ▼          │ ProbeDispatcher  │  ← 有界並發探測
//! Keystore   evm-signer     └──────────────────┘
//! Manager    (secp256k1)
//! ```
//!
//! # 示例用法
//!
//! ```no_run
//! use agent_node::keystore::KeystoreManager;
//! use agent_node::signer::MessageSigner;
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let keystore = KeystoreManager::new("./keystore");
//!     let mut signer = MessageSigner::new(keystore);
//!
//!     signer.authenticate("./keystore/validator.json", "correct horse battery staple")?;
//!     let signed = signer.sign_message(&json!({ "status": "healthy" }))?;
//!     println!("Signature: {}", signed.signature);
//!
//!     Ok(())
//! }
//! ```

// 公開模塊
pub mod config;
pub mod error;
pub mod keystore;
pub mod monitor;
pub mod signer;
pub mod types;

// Re-export 常用類型
pub use error::{AgentError, Result};
pub use keystore::KeystoreManager;
pub use monitor::ProbeDispatcher;
pub use signer::MessageSigner;
pub use types::{AgentConfig, MonitoringRequest, MonitoringResult, ProbeStatus, SignedMessage};
