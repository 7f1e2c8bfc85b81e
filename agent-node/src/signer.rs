//! 會話簽名模塊
//!
//! 管理一個「認證後簽名」的會話：用密碼從密鑰庫解鎖私鑰、
//! 在內存中保持簽名會話、對出站消息做可恢復的 secp256k1 簽名。
//!
//! # 簽名格式
//!
//! 實際被簽名的是一個規範化 JSON 字符串：
//!
//! ```json
//! {"nonce":"<hex 16 bytes>","payload":<原始負載>,"timestamp":<Unix 毫秒>}
//! ```
//!
//! 鍵名按字典序排列（serde_json 的對象表示本身就是有序映射），
//! 因此簽名同時覆蓋業務負載與防重放字段，且編碼是確定性的。
//!
//! # 會話生命週期
//!
//! - `authenticate` 建立會話（重複調用替換舊會話）
//! - `lock` 主動銷毀會話；會話內的私鑰標量在 Drop 時零化
//! - `sign_message_with_password` 是一次性的「解鎖-簽名-銷毀」原子序列，
//!   不影響常駐會話狀態

use crate::error::{AgentError, Result};
use crate::keystore::KeystoreManager;
use crate::types::SignedMessage;
use evm_signer::secp256k1::{address_from_public_key_hex, recover_address};
use evm_signer::{Secp256k1Signer, Signer};
use rand::RngCore;
use std::path::Path;
use tracing::{debug, info};

/// 活躍簽名會話
///
/// `Secp256k1Signer` 內部的私鑰標量在 Drop 時自動零化，
/// 因此丟棄會話即完成確定性擦除
struct Session {
    signer: Secp256k1Signer,
    public_key: String,
    address: String,
}

/// 會話簽名器
///
/// # 示例
///
/// ```no_run
/// use agent_node::keystore::KeystoreManager;
/// use agent_node::signer::MessageSigner;
/// use serde_json::json;
///
/// let keystore = KeystoreManager::new("./keystore");
/// let mut signer = MessageSigner::new(keystore);
///
/// signer.authenticate("./keystore/validator.json", "correct horse battery staple")?;
/// let signed = signer.sign_message(&json!({ "uptime": 99.97 }))?;
/// assert!(MessageSigner::verify_signature(&signed));
/// signer.lock();
/// # Ok::<(), agent_node::error::AgentError>(())
/// ```
pub struct MessageSigner {
    keystore: KeystoreManager,
    session: Option<Session>,
}

impl MessageSigner {
    /// 創建未認證的簽名器
    pub fn new(keystore: KeystoreManager) -> Self {
        Self {
            keystore,
            session: None,
        }
    }

    /// 用密碼解鎖密鑰庫文件並建立簽名會話
    ///
    /// 重複調用會替換（並零化）現有會話。
    /// 返回解鎖錢包的校驗和地址。
    pub fn authenticate(&mut self, keystore_path: impl AsRef<Path>, password: &str) -> Result<String> {
        let wallet = self.keystore.load_wallet(keystore_path, password)?;
        let signer = wallet.signer()?;
        let address = wallet.address().to_string();
        let public_key = wallet.public_key().to_string();

        info!(address = %address, "Signing session established");

        self.session = Some(Session {
            signer,
            public_key,
            address: address.clone(),
        });
        Ok(address)
    }

    /// 是否存在活躍會話
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// 當前會話的校驗和地址
    pub fn address(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.address.as_str())
    }

    /// 當前會話的公鑰（hex 未壓縮格式）
    pub fn public_key(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.public_key.as_str())
    }

    /// 簽名業務負載
    ///
    /// 每次調用生成新的隨機 nonce 和當前時間戳，
    /// 與負載一起構成規範化消息後簽名。
    ///
    /// # 錯誤
    /// - `NotAuthenticated`: 沒有活躍會話
    pub fn sign_message(&self, payload: &serde_json::Value) -> Result<SignedMessage> {
        let session = self.session.as_ref().ok_or(AgentError::NotAuthenticated)?;
        Self::sign_with(&session.signer, &session.public_key, payload)
    }

    /// 一次性簽名：解鎖 → 簽名 → 銷毀
    ///
    /// 不建立也不影響常駐會話；解密的私鑰在返回前即被零化
    pub fn sign_message_with_password(
        &self,
        payload: &serde_json::Value,
        keystore_path: impl AsRef<Path>,
        password: &str,
    ) -> Result<SignedMessage> {
        let wallet = self.keystore.load_wallet(keystore_path, password)?;
        let signer = wallet.signer()?;
        let public_key = wallet.public_key().to_string();
        Self::sign_with(&signer, &public_key, payload)
        // wallet 與 signer 在此處 Drop，私鑰隨之零化
    }

    /// 銷毀當前會話（私鑰零化）
    pub fn lock(&mut self) {
        if self.session.take().is_some() {
            debug!("Signing session locked");
        }
    }

    /// 無狀態簽名驗證
    ///
    /// 從 `(message, signature)` 恢復簽名者地址，與 `public_key`
    /// 所蘊含的地址比對。任何格式錯誤（簽名不是合法 hex、長度不對、
    /// 公鑰損壞）都返回 `false`，**絕不** panic 或返回錯誤。
    pub fn verify_signature(signed: &SignedMessage) -> bool {
        let sig_hex = signed.signature.strip_prefix("0x").unwrap_or(&signed.signature);
        let signature = match hex::decode(sig_hex) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let expected = match address_from_public_key_hex(&signed.public_key) {
            Ok(addr) => addr,
            Err(_) => return false,
        };

        match recover_address(signed.message.as_bytes(), &signature) {
            Ok(recovered) => recovered.eq_ignore_ascii_case(&expected),
            Err(_) => false,
        }
    }

    /// 密鑰庫管理器引用
    pub fn keystore(&self) -> &KeystoreManager {
        &self.keystore
    }

    fn sign_with(
        signer: &Secp256k1Signer,
        public_key: &str,
        payload: &serde_json::Value,
    ) -> Result<SignedMessage> {
        let mut nonce_bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);
        let timestamp = chrono::Utc::now().timestamp_millis();

        let message = canonical_message(&nonce, payload, timestamp)?;
        let signature = signer.sign(message.as_bytes())?;

        debug!(nonce = %nonce, timestamp, "Message signed");

        Ok(SignedMessage {
            signature: format!("0x{}", hex::encode(signature)),
            message,
            timestamp,
            nonce,
            public_key: public_key.to_string(),
        })
    }
}

/// 構造規範化消息字符串
///
/// serde_json 的對象是按鍵排序的有序映射，序列化結果對同一輸入
/// 是確定性的（嵌套對象同樣按鍵排序）
fn canonical_message(nonce: &str, payload: &serde_json::Value, timestamp: i64) -> Result<String> {
    let envelope = serde_json::json!({
        "nonce": nonce,
        "payload": payload,
        "timestamp": timestamp,
    });
    Ok(serde_json::to_string(&envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const TEST_PASSWORD: &str = "password123";

    fn authenticated_signer() -> (MessageSigner, std::path::PathBuf, TempDir) {
        let dir = TempDir::new().unwrap();
        let keystore = KeystoreManager::with_kdf_params(dir.path(), 2, 8, 1);
        let imported = keystore
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("validator"))
            .unwrap();
        let path = imported.keystore_path.clone();

        let mut signer = MessageSigner::new(keystore);
        signer.authenticate(&path, TEST_PASSWORD).unwrap();
        (signer, path, dir)
    }

    #[test]
    fn test_authenticate_establishes_session() {
        let (signer, _path, _dir) = authenticated_signer();

        assert!(signer.is_authenticated());
        assert_eq!(signer.address(), Some(TEST_ADDRESS));
        assert!(signer.public_key().unwrap().starts_with("0x04"));
    }

    #[test]
    fn test_sign_without_session_fails() {
        let dir = TempDir::new().unwrap();
        let signer = MessageSigner::new(KeystoreManager::new(dir.path()));

        let result = signer.sign_message(&json!({ "x": 1 }));
        assert!(matches!(result, Err(AgentError::NotAuthenticated)));
    }

    #[test]
    fn test_sign_and_verify() {
        let (signer, _path, _dir) = authenticated_signer();

        let signed = signer.sign_message(&json!({ "uptime": 99.9 })).unwrap();
        assert!(MessageSigner::verify_signature(&signed));

        // 規範化消息嵌入了 nonce / payload / timestamp
        let parsed: serde_json::Value = serde_json::from_str(&signed.message).unwrap();
        assert_eq!(parsed["nonce"], json!(signed.nonce));
        assert_eq!(parsed["timestamp"], json!(signed.timestamp));
        assert_eq!(parsed["payload"]["uptime"], json!(99.9));
    }

    #[test]
    fn test_tampered_message_rejected() {
        let (signer, _path, _dir) = authenticated_signer();
        let mut signed = signer.sign_message(&json!({ "value": 1 })).unwrap();

        signed.message = signed.message.replace("\"value\":1", "\"value\":2");
        assert!(!MessageSigner::verify_signature(&signed));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let (signer, _path, _dir) = authenticated_signer();
        let mut signed = signer.sign_message(&json!({ "value": 1 })).unwrap();

        // 翻轉 r 的一個比特
        let mut raw = hex::decode(signed.signature.trim_start_matches("0x")).unwrap();
        raw[5] ^= 0x01;
        signed.signature = format!("0x{}", hex::encode(raw));
        assert!(!MessageSigner::verify_signature(&signed));
    }

    #[test]
    fn test_verify_never_panics_on_garbage() {
        let garbage = SignedMessage {
            signature: "not-hex".to_string(),
            message: "{}".to_string(),
            timestamp: 0,
            nonce: String::new(),
            public_key: "0xzz".to_string(),
        };
        assert!(!MessageSigner::verify_signature(&garbage));

        let short_sig = SignedMessage {
            signature: "0xabcd".to_string(),
            message: "{}".to_string(),
            timestamp: 0,
            nonce: String::new(),
            public_key: "0x04".to_string(),
        };
        assert!(!MessageSigner::verify_signature(&short_sig));
    }

    #[test]
    fn test_nonce_unique_per_signature() {
        let (signer, _path, _dir) = authenticated_signer();

        let a = signer.sign_message(&json!({ "n": 1 })).unwrap();
        let b = signer.sign_message(&json!({ "n": 1 })).unwrap();

        // 相同負載因 nonce 不同產生不同消息與簽名
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.message, b.message);
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_lock_destroys_session() {
        let (mut signer, _path, _dir) = authenticated_signer();

        signer.lock();
        assert!(!signer.is_authenticated());
        assert_eq!(signer.address(), None);
        assert!(matches!(
            signer.sign_message(&json!({})),
            Err(AgentError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_reauthenticate_replaces_session() {
        let (mut signer, path, _dir) = authenticated_signer();

        let other_key = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
        let imported = signer
            .keystore()
            .import_wallet(other_key, TEST_PASSWORD, Some("secondary"))
            .unwrap();

        let address = signer
            .authenticate(&imported.keystore_path, TEST_PASSWORD)
            .unwrap();
        assert_ne!(address, TEST_ADDRESS);
        assert_eq!(signer.address(), Some(address.as_str()));

        // 原錢包仍可重新認證
        signer.authenticate(&path, TEST_PASSWORD).unwrap();
        assert_eq!(signer.address(), Some(TEST_ADDRESS));
    }

    #[test]
    fn test_sign_with_password_is_stateless() {
        let dir = TempDir::new().unwrap();
        let keystore = KeystoreManager::with_kdf_params(dir.path(), 2, 8, 1);
        let imported = keystore
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("validator"))
            .unwrap();

        let signer = MessageSigner::new(keystore);
        let signed = signer
            .sign_message_with_password(
                &json!({ "report": "ok" }),
                &imported.keystore_path,
                TEST_PASSWORD,
            )
            .unwrap();

        assert!(MessageSigner::verify_signature(&signed));
        // 一次性簽名不留下會話
        assert!(!signer.is_authenticated());
    }

    #[test]
    fn test_sign_with_wrong_password_fails() {
        let (signer, path, _dir) = authenticated_signer();
        let result = signer.sign_message_with_password(&json!({}), &path, "wrongpass");
        assert!(matches!(result, Err(AgentError::Authentication(_))));
    }

    #[test]
    fn test_canonical_message_is_sorted_and_deterministic() {
        let payload = json!({ "zeta": 1, "alpha": { "y": 2, "x": 3 } });
        let message = canonical_message("00ff", &payload, 1234).unwrap();

        assert_eq!(
            message,
            "{\"nonce\":\"00ff\",\"payload\":{\"alpha\":{\"x\":3,\"y\":2},\"zeta\":1},\"timestamp\":1234}"
        );
    }
}
