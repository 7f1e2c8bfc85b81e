//! 加密密鑰庫模塊
//!
//! 負責將 secp256k1 私鑰以密碼加密的形式持久化到磁盤，
//! 格式兼容 Web3 Keystore V3（scrypt + AES-128-CTR + MAC）。
//!
//! # 文件格式
//!
//! 每個錢包一個 JSON 文件，存儲在可配置的密鑰庫目錄下：
//!
//! ```json
//! {
//!   "version": 3,
//!   "id": "uuid-v4",
//!   "address": "0x...(EIP-55 校驗和地址)",
//!   "publicKey": "0x04...(未壓縮公鑰)",
//!   "crypto": {
//!     "ciphertext": "hex",
//!     "cipherparams": { "iv": "hex(16 bytes)" },
//!     "cipher": "aes-128-ctr",
//!     "kdf": "scrypt",
//!     "kdfparams": { "dklen": 32, "salt": "hex(32 bytes)", "n": 16384, "r": 8, "p": 1 },
//!     "mac": "hex(SHA-256)"
//!   }
//! }
//! ```
//!
//! # 加密流程
//!
//! 1. 生成 32 字節隨機 salt 和 16 字節隨機 IV
//! 2. scrypt(password, salt; N=16384, r=8, p=1) 派生 32 字節密鑰
//! 3. 派生密鑰前半（0..16）作為 AES-128-CTR 加密密鑰
//! 4. 派生密鑰後半（16..32）參與 MAC：`mac = SHA256(derived[16..32] || ciphertext)`
//!
//! # 安全不變量
//!
//! - 明文私鑰**永不**寫入磁盤，也不出現在日誌中
//! - 解密前先做**常數時間** MAC 比較；密碼錯誤與文件損壞不可區分
//! - KDF 參數隨記錄存儲，即使全局默認值改變，舊文件仍可自描述地校驗
//! - 解密後獨立重新推導地址並與記錄比對（縱深防禦）
//! - 寫入採用臨時文件 + 原子重命名，避免同名導入競爭留下半寫文件

use crate::error::{AgentError, Result};
use crate::types::WalletEntry;
use aes::cipher::{KeyIvInit, StreamCipher};
use evm_signer::Secp256k1Signer;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-128-CTR，128 位大端計數器（與原生 `aes-128-ctr` 語義一致）
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// 密鑰庫格式版本
const KEYSTORE_VERSION: u32 = 3;

/// scrypt 默認成本參數 N（必須是 2 的冪）
pub const DEFAULT_SCRYPT_N: u32 = 16384;

/// scrypt 默認塊大小參數 r
pub const DEFAULT_SCRYPT_R: u32 = 8;

/// scrypt 默認並行度參數 p
pub const DEFAULT_SCRYPT_P: u32 = 1;

/// 派生密鑰長度（字節）
const DKLEN: u32 = 32;

/// 密碼最低長度（較弱的下限；加固版本應提高）
const MIN_PASSWORD_LEN: usize = 8;

/// 密鑰庫文件（Web3 Keystore V3 兼容）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreFile {
    /// 格式版本（恆為 3）
    pub version: u32,

    /// UUID v4 標識
    pub id: String,

    /// EIP-55 校驗和地址（由私鑰推導）
    pub address: String,

    /// 未壓縮公鑰（hex，0x04 前綴）
    #[serde(rename = "publicKey")]
    pub public_key: String,

    /// 加密數據塊
    pub crypto: CryptoJson,
}

/// V3 crypto 塊
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoJson {
    /// hex 編碼的密文
    pub ciphertext: String,

    /// 加密算法參數
    pub cipherparams: CipherParams,

    /// 加密算法（恆為 "aes-128-ctr"）
    pub cipher: String,

    /// 密鑰派生函數（恆為 "scrypt"）
    pub kdf: String,

    /// KDF 參數（隨記錄存儲，自描述）
    pub kdfparams: KdfParams,

    /// hex 編碼的 MAC（SHA-256）
    pub mac: String,
}

/// AES-128-CTR 參數
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherParams {
    /// hex 編碼的 16 字節初始化向量
    pub iv: String,
}

/// scrypt 參數
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// 派生密鑰長度（恆為 32）
    pub dklen: u32,

    /// hex 編碼的隨機 salt（32 字節）
    pub salt: String,

    /// CPU/內存成本參數（2 的冪）
    pub n: u32,

    /// 塊大小參數
    pub r: u32,

    /// 並行度參數
    pub p: u32,
}

/// 解密後的錢包（僅存在於內存）
///
/// 私鑰緩衝區在 `Drop` 時自動零填充（RAII 保證確定性擦除，
/// 優於垃圾回收運行時的「盡力而為」語義）。
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DecryptedWallet {
    /// 原始私鑰字節（32 字節，Drop 時零化）
    private_key: Vec<u8>,

    /// 未壓縮公鑰（hex，可公開）
    #[zeroize(skip)]
    public_key: String,

    /// 校驗和地址（可公開）
    #[zeroize(skip)]
    address: String,
}

impl DecryptedWallet {
    /// 私鑰字節引用。調用方不得複製到長生命週期的緩衝區。
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// hex 公鑰
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// 校驗和地址
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 從私鑰構造簽名器
    pub fn signer(&self) -> Result<Secp256k1Signer> {
        Ok(Secp256k1Signer::from_bytes(&self.private_key)?)
    }
}

/// 導入結果
#[derive(Debug, Clone)]
pub struct ImportedWallet {
    /// 推導出的校驗和地址
    pub address: String,

    /// 寫入的密鑰庫文件路徑
    pub keystore_path: PathBuf,
}

/// 密鑰庫管理器
///
/// 封裝密鑰庫目錄上的導入、加載、枚舉操作
///
/// # 示例
///
/// ```no_run
/// use agent_node::keystore::KeystoreManager;
///
/// let manager = KeystoreManager::new("./keystore");
/// let imported = manager.import_wallet(
///     "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
///     "correct horse battery staple",
///     Some("validator"),
/// )?;
/// println!("Imported wallet: {}", imported.address);
/// # Ok::<(), agent_node::error::AgentError>(())
/// ```
pub struct KeystoreManager {
    /// 密鑰庫目錄
    keystore_dir: PathBuf,

    /// 新建記錄使用的 scrypt 參數 (n, r, p)
    kdf_params: (u32, u32, u32),
}

impl KeystoreManager {
    /// 創建使用默認 scrypt 參數的管理器
    pub fn new(keystore_dir: impl AsRef<Path>) -> Self {
        Self {
            keystore_dir: keystore_dir.as_ref().to_path_buf(),
            kdf_params: (DEFAULT_SCRYPT_N, DEFAULT_SCRYPT_R, DEFAULT_SCRYPT_P),
        }
    }

    /// 創建使用自定義 scrypt 參數的管理器
    ///
    /// 較低的 N 更快但更不安全，僅用於測試。
    /// 加載時始終遵循記錄內存儲的參數，與此設置無關。
    pub fn with_kdf_params(keystore_dir: impl AsRef<Path>, n: u32, r: u32, p: u32) -> Self {
        Self {
            keystore_dir: keystore_dir.as_ref().to_path_buf(),
            kdf_params: (n, r, p),
        }
    }

    /// 導入私鑰並加密寫入密鑰庫
    ///
    /// # 參數
    /// - `private_key_hex`: hex 私鑰（可帶 0x 前綴）
    /// - `password`: 加密密碼（≥ 8 字符）
    /// - `wallet_name`: 可選文件名；缺省時使用時間戳命名
    ///
    /// # 錯誤
    /// - `Config`: 密碼過短
    /// - `KeyFormat`: 私鑰語法無效
    /// - `Io`: 目錄創建或文件寫入失敗
    pub fn import_wallet(
        &self,
        private_key_hex: &str,
        password: &str,
        wallet_name: Option<&str>,
    ) -> Result<ImportedWallet> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AgentError::Config(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        // 先驗證私鑰語法並推導地址/公鑰
        let signer = Secp256k1Signer::from_hex(private_key_hex)?;
        let address = evm_signer::Signer::address(&signer);
        let public_key = signer.public_key_hex();

        // 隨機 salt 與 IV
        let mut salt = [0u8; 32];
        let mut iv = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut iv);

        // scrypt 派生 + 就地加密（明文緩衝區被密文覆蓋）
        let (n, r, p) = self.kdf_params;
        let mut derived_key = derive_key(password, &salt, n, r, p)?;

        let mut ciphertext = signer.private_key_bytes().to_vec();
        let mut cipher = Aes128Ctr::new(derived_key[..16].into(), iv.as_slice().into());
        cipher.apply_keystream(&mut ciphertext);

        let mac = compute_mac(&derived_key[16..32], &ciphertext);
        derived_key.zeroize();

        let record = KeystoreFile {
            version: KEYSTORE_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            address: address.clone(),
            public_key,
            crypto: CryptoJson {
                ciphertext: hex::encode(&ciphertext),
                cipherparams: CipherParams {
                    iv: hex::encode(iv),
                },
                cipher: "aes-128-ctr".to_string(),
                kdf: "scrypt".to_string(),
                kdfparams: KdfParams {
                    dklen: DKLEN,
                    salt: hex::encode(salt),
                    n,
                    r,
                    p,
                },
                mac: hex::encode(mac),
            },
        };

        let keystore_path = self.write_record(&record, wallet_name)?;

        info!(
            address = %address,
            path = %keystore_path.display(),
            "Wallet imported into keystore"
        );

        Ok(ImportedWallet {
            address,
            keystore_path,
        })
    }

    /// 從密鑰庫文件加載並解密錢包
    ///
    /// 校驗順序（刻意設計）：
    /// 1. 解析與格式校驗
    /// 2. 按記錄內 KDF 參數重新派生密鑰
    /// 3. **常數時間** MAC 比較 —— 失敗即終止，絕不部分解密
    /// 4. 解密並獨立重新推導地址，與記錄比對
    ///
    /// # 錯誤
    /// - `Authentication`: 密碼錯誤或文件損壞（消息不區分二者）
    /// - `AddressMismatch`: 解密成功但地址與記錄不一致
    pub fn load_wallet(&self, path: impl AsRef<Path>, password: &str) -> Result<DecryptedWallet> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading wallet from keystore");

        let data = fs::read_to_string(path)?;
        let record: KeystoreFile = serde_json::from_str(&data)
            .map_err(|_| AgentError::Authentication("Keystore record is not valid".to_string()))?;

        if record.version != KEYSTORE_VERSION {
            return Err(AgentError::Authentication(format!(
                "Unsupported keystore version: {}",
                record.version
            )));
        }
        if record.crypto.cipher != "aes-128-ctr" {
            return Err(AgentError::Authentication(format!(
                "Unsupported cipher: {}",
                record.crypto.cipher
            )));
        }
        if record.crypto.kdf != "scrypt" {
            return Err(AgentError::Authentication(format!(
                "Unsupported KDF: {}",
                record.crypto.kdf
            )));
        }

        let salt = decode_hex_field(&record.crypto.kdfparams.salt)?;
        let iv = decode_hex_field(&record.crypto.cipherparams.iv)?;
        let ciphertext = decode_hex_field(&record.crypto.ciphertext)?;
        let stored_mac = decode_hex_field(&record.crypto.mac)?;

        if iv.len() != 16 {
            return Err(AgentError::Authentication(
                "Keystore record is not valid".to_string(),
            ));
        }

        // 按記錄內的參數派生（自描述格式）
        let kdf = &record.crypto.kdfparams;
        let mut derived_key = derive_key(password, &salt, kdf.n, kdf.r, kdf.p)?;

        // 解密前先做常數時間 MAC 校驗：密碼錯誤與密文篡改不可區分
        let computed_mac = compute_mac(&derived_key[16..32], &ciphertext);
        let mac_ok: bool = computed_mac.ct_eq(&stored_mac).into();
        if !mac_ok {
            derived_key.zeroize();
            return Err(AgentError::Authentication(
                "Invalid password or corrupted keystore".to_string(),
            ));
        }

        let mut plaintext = ciphertext;
        let mut cipher = Aes128Ctr::new(derived_key[..16].into(), iv.as_slice().into());
        cipher.apply_keystream(&mut plaintext);
        derived_key.zeroize();

        // 縱深防禦：獨立重新推導地址並與記錄比對
        let signer = Secp256k1Signer::from_bytes(&plaintext).map_err(|_| {
            plaintext_cleanup(&mut plaintext);
            AgentError::Authentication("Invalid password or corrupted keystore".to_string())
        })?;
        let derived_address = evm_signer::Signer::address(&signer);
        if !derived_address.eq_ignore_ascii_case(&record.address) {
            plaintext_cleanup(&mut plaintext);
            return Err(AgentError::AddressMismatch(format!(
                "Keystore address does not match decrypted key: {}",
                record.address
            )));
        }

        debug!(address = %derived_address, "Wallet decrypted and verified");

        Ok(DecryptedWallet {
            private_key: plaintext,
            public_key: signer.public_key_hex(),
            address: derived_address,
        })
    }

    /// 枚舉密鑰庫目錄下的所有錢包
    ///
    /// 容忍部分失敗：無法解析的文件被跳過（記錄 warn 日誌），
    /// 不會使整個枚舉失敗
    pub fn list_wallets(&self) -> Result<Vec<WalletEntry>> {
        if !self.keystore_dir.exists() {
            return Ok(Vec::new());
        }

        let mut wallets = Vec::new();
        for entry in fs::read_dir(&self.keystore_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match fs::read_to_string(&path)
                .map_err(AgentError::from)
                .and_then(|data| {
                    serde_json::from_str::<KeystoreFile>(&data).map_err(AgentError::from)
                }) {
                Ok(record) => {
                    let name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    wallets.push(WalletEntry {
                        name,
                        address: record.address,
                        path: path.to_string_lossy().into_owned(),
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unparsable keystore file");
                }
            }
        }

        wallets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(wallets)
    }

    /// 密鑰庫目錄
    pub fn keystore_dir(&self) -> &Path {
        &self.keystore_dir
    }

    /// 將記錄寫入磁盤（臨時文件 + 原子重命名）
    fn write_record(&self, record: &KeystoreFile, wallet_name: Option<&str>) -> Result<PathBuf> {
        fs::create_dir_all(&self.keystore_dir)?;

        let file_name = match wallet_name {
            Some(name) => format!("{}.json", name),
            None => format!(
                "UTC--{}--{}.json",
                chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ"),
                record.address.trim_start_matches("0x").to_lowercase()
            ),
        };

        let path = self.keystore_dir.join(&file_name);
        let tmp_path = self.keystore_dir.join(format!(".{}.tmp", file_name));

        let json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &path)?;

        Ok(path)
    }
}

/// scrypt 密鑰派生
///
/// # 錯誤
/// - `Authentication`: 參數不合法（N 不是 2 的冪等）——
///   加載路徑上的參數來自文件，損壞的參數等同於損壞的文件
fn derive_key(password: &str, salt: &[u8], n: u32, r: u32, p: u32) -> Result<Vec<u8>> {
    if n < 2 || !n.is_power_of_two() {
        return Err(AgentError::Authentication(
            "Invalid scrypt parameters".to_string(),
        ));
    }
    let log_n = n.trailing_zeros() as u8;

    let params = scrypt::Params::new(log_n, r, p, DKLEN as usize)
        .map_err(|_| AgentError::Authentication("Invalid scrypt parameters".to_string()))?;

    let mut derived = vec![0u8; DKLEN as usize];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut derived)
        .map_err(|_| AgentError::Authentication("Key derivation failed".to_string()))?;
    Ok(derived)
}

/// `mac = SHA256(derived[16..32] || ciphertext)`
fn compute_mac(mac_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(mac_key);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

/// hex 字段解碼；任何失敗折疊為不可區分的認證錯誤
fn decode_hex_field(value: &str) -> Result<Vec<u8>> {
    hex::decode(value)
        .map_err(|_| AgentError::Authentication("Keystore record is not valid".to_string()))
}

/// 錯誤路徑上的明文清理
fn plaintext_cleanup(plaintext: &mut Vec<u8>) {
    plaintext.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// 測試用的快速 scrypt 參數（N=2，僅為正確性測試）
    const TEST_N: u32 = 2;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const TEST_PASSWORD: &str = "password123";

    fn temp_manager() -> (KeystoreManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let manager = KeystoreManager::with_kdf_params(dir.path().join("keystore"), TEST_N, 8, 1);
        (manager, dir)
    }

    #[test]
    fn test_import_and_load_roundtrip() {
        let (manager, _dir) = temp_manager();

        let imported = manager
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("primary"))
            .unwrap();
        assert_eq!(imported.address, TEST_ADDRESS);

        let wallet = manager
            .load_wallet(&imported.keystore_path, TEST_PASSWORD)
            .unwrap();
        assert_eq!(wallet.address(), TEST_ADDRESS);
        assert_eq!(hex::encode(wallet.private_key()), TEST_KEY);

        // 私鑰必須能重新推導同一地址
        let signer = wallet.signer().unwrap();
        assert_eq!(evm_signer::Signer::address(&signer), TEST_ADDRESS);
    }

    #[test]
    fn test_wrong_password_fails_with_authentication_error() {
        let (manager, _dir) = temp_manager();

        let imported = manager
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("primary"))
            .unwrap();

        // 接近的猜測與完全不同的猜測必須返回同一錯誤類別
        for guess in ["wrongpass", "password124", "Password123"] {
            let result = manager.load_wallet(&imported.keystore_path, guess);
            match result {
                Err(AgentError::Authentication(_)) => {}
                other => panic!("Expected Authentication error, got {:?}", other.err()),
            }
        }
    }

    #[test]
    fn test_tampered_ciphertext_detected() {
        let (manager, _dir) = temp_manager();
        let imported = manager
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("w"))
            .unwrap();

        let data = fs::read_to_string(&imported.keystore_path).unwrap();
        let mut record: KeystoreFile = serde_json::from_str(&data).unwrap();

        let mut ct = hex::decode(&record.crypto.ciphertext).unwrap();
        ct[0] ^= 0x01; // 翻轉單個比特
        record.crypto.ciphertext = hex::encode(&ct);
        fs::write(
            &imported.keystore_path,
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();

        let result = manager.load_wallet(&imported.keystore_path, TEST_PASSWORD);
        assert!(matches!(result, Err(AgentError::Authentication(_))));
    }

    #[test]
    fn test_tampered_mac_detected() {
        let (manager, _dir) = temp_manager();
        let imported = manager
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("w"))
            .unwrap();

        let data = fs::read_to_string(&imported.keystore_path).unwrap();
        let mut record: KeystoreFile = serde_json::from_str(&data).unwrap();

        let mut mac = hex::decode(&record.crypto.mac).unwrap();
        mac[31] ^= 0x80;
        record.crypto.mac = hex::encode(&mac);
        fs::write(
            &imported.keystore_path,
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();

        let result = manager.load_wallet(&imported.keystore_path, TEST_PASSWORD);
        assert!(matches!(result, Err(AgentError::Authentication(_))));
    }

    #[test]
    fn test_address_mismatch_detected() {
        let (manager, _dir) = temp_manager();
        let imported = manager
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("w"))
            .unwrap();

        // 模擬攻擊者用另一把密鑰/密碼一致性地重寫了整個 crypto 塊，
        // 但保留了原始 address 字段
        let other_key = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
        let other = manager
            .import_wallet(other_key, TEST_PASSWORD, Some("other"))
            .unwrap();

        let original = fs::read_to_string(&imported.keystore_path).unwrap();
        let original_record: KeystoreFile = serde_json::from_str(&original).unwrap();

        let rewritten = fs::read_to_string(&other.keystore_path).unwrap();
        let mut rewritten_record: KeystoreFile = serde_json::from_str(&rewritten).unwrap();
        rewritten_record.address = original_record.address;
        fs::write(
            &imported.keystore_path,
            serde_json::to_string(&rewritten_record).unwrap(),
        )
        .unwrap();

        let result = manager.load_wallet(&imported.keystore_path, TEST_PASSWORD);
        assert!(matches!(result, Err(AgentError::AddressMismatch(_))));
    }

    #[test]
    fn test_weak_password_rejected() {
        let (manager, _dir) = temp_manager();
        let result = manager.import_wallet(TEST_KEY, "short", Some("w"));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_invalid_private_key_rejected() {
        let (manager, _dir) = temp_manager();

        assert!(matches!(
            manager.import_wallet("not-hex", TEST_PASSWORD, Some("w")),
            Err(AgentError::KeyFormat(_))
        ));
        assert!(matches!(
            manager.import_wallet("abcd", TEST_PASSWORD, Some("w")),
            Err(AgentError::KeyFormat(_))
        ));
        // 全零標量在曲線階之外
        let zero_key = "00".repeat(32);
        assert!(matches!(
            manager.import_wallet(&zero_key, TEST_PASSWORD, Some("w")),
            Err(AgentError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_kdf_params_travel_with_record() {
        let dir = TempDir::new().unwrap();

        // 用非默認參數導入
        let writer = KeystoreManager::with_kdf_params(dir.path(), 4, 4, 1);
        let imported = writer
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("w"))
            .unwrap();

        // 用默認參數的管理器加載：必須遵循文件內的參數
        let reader = KeystoreManager::new(dir.path());
        let wallet = reader
            .load_wallet(&imported.keystore_path, TEST_PASSWORD)
            .unwrap();
        assert_eq!(wallet.address(), TEST_ADDRESS);

        let data = fs::read_to_string(&imported.keystore_path).unwrap();
        let record: KeystoreFile = serde_json::from_str(&data).unwrap();
        assert_eq!(record.crypto.kdfparams.n, 4);
        assert_eq!(record.crypto.kdfparams.r, 4);
    }

    #[test]
    fn test_list_wallets_skips_corrupt_files() {
        let (manager, _dir) = temp_manager();

        manager
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("alpha"))
            .unwrap();
        let key2 = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
        manager
            .import_wallet(key2, TEST_PASSWORD, Some("beta"))
            .unwrap();

        // 寫入一個損壞文件：枚舉必須跳過它而不是失敗
        fs::write(manager.keystore_dir().join("corrupt.json"), "{ not json").unwrap();

        let wallets = manager.list_wallets().unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].name, "alpha");
        assert_eq!(wallets[0].address, TEST_ADDRESS);
        assert_eq!(wallets[1].name, "beta");
    }

    #[test]
    fn test_list_wallets_empty_directory() {
        let (manager, _dir) = temp_manager();
        assert!(manager.list_wallets().unwrap().is_empty());
    }

    #[test]
    fn test_record_format() {
        let (manager, _dir) = temp_manager();
        let imported = manager
            .import_wallet(TEST_KEY, TEST_PASSWORD, Some("fmt"))
            .unwrap();

        let data = fs::read_to_string(&imported.keystore_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();

        assert_eq!(parsed["version"], 3);
        assert_eq!(parsed["crypto"]["cipher"], "aes-128-ctr");
        assert_eq!(parsed["crypto"]["kdf"], "scrypt");
        assert_eq!(parsed["crypto"]["kdfparams"]["dklen"], 32);
        // 明文私鑰絕不出現在文件中
        assert!(!data.contains(TEST_KEY));
        // UUID v4
        let id = parsed["id"].as_str().unwrap();
        assert_eq!(uuid::Uuid::parse_str(id).unwrap().get_version_num(), 4);
        // 公鑰字段使用 publicKey 命名
        assert!(parsed["publicKey"].as_str().unwrap().starts_with("0x04"));
    }

    #[test]
    fn test_default_file_name_is_timestamp_based() {
        let (manager, _dir) = temp_manager();
        let imported = manager.import_wallet(TEST_KEY, TEST_PASSWORD, None).unwrap();

        let file_name = imported
            .keystore_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(file_name.starts_with("UTC--"));
        assert!(file_name.ends_with(".json"));
    }
}
