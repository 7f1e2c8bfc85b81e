//! 網站健康探測調度模塊
//!
//! 負責對目標端點執行 HTTP 健康探測：
//! - 有界並發的 FIFO 請求隊列（工作槽泵送模型）
//! - 傳輸層失敗的線性退避重試
//! - 狀態碼分類（所有 HTTP 響應都被接受，之後再分類）
//! - 延遲測量（單調時鐘，含重試，小數毫秒）
//!
//! # 分類語義
//!
//! `Bad` 是正常業務結果而非錯誤：超時、連接失敗、非預期狀態碼
//! 都折疊為帶 `error` 描述的 `Bad` 結果。探測調用方**永遠**
//! 收到 `MonitoringResult`，每個提交的請求恰好對應一個結果。
//!
//! # 重試策略
//!
//! - 僅傳輸層失敗觸發重試（連接失敗、超時、響應中斷）
//! - HTTP 響應無論狀態碼都不重試 —— 那是分類問題
//! - 線性退避：`retry_delay_ms × attempt`
//! - 只有最後一次嘗試的結果參與分類
//!
//! # 隊列模型
//!
//! `queue_monitoring_request` 將請求追加到 FIFO 隊列並觸發泵送；
//! 泵送在有空閒槽時彈出隊首請求並生成工作任務，任務完成後釋放
//! 槽位並再次泵送。結果通過實例持有的 mpsc 通道交付。
//!
//! 注意：`monitor_multiple_websites` 刻意**繞過**有界池，
//! 對整批請求直接並發執行（保留既有調用方語義）。

use crate::error::{AgentError, Result};
use crate::types::{AgentConfig, MonitoringRequest, MonitoringResult, ProbeStatus};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 默認預期狀態碼集合
const DEFAULT_EXPECTED_STATUS_CODES: [u16; 4] = [200, 201, 202, 204];

/// 響應體讀取上限（10 MB）
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// 重定向跟隨上限
const MAX_REDIRECTS: usize = 5;

/// 調度器統計快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    /// 正在執行的探測數（佔用槽位的工作任務）
    pub active_requests: usize,

    /// 隊列中等待的請求數
    pub queued_requests: usize,

    /// 累計完成的探測數
    pub total_processed: usize,
}

/// 單次 HTTP 嘗試的結果
struct ProbeOutcome {
    status: u16,
    body: Option<String>,
}

struct Inner {
    client: Client,
    config: AgentConfig,
    queue: Mutex<VecDeque<MonitoringRequest>>,
    active: AtomicUsize,
    total_processed: AtomicUsize,
    shutdown: AtomicBool,
    results_tx: mpsc::UnboundedSender<MonitoringResult>,
}

/// 探測調度器
///
/// 可克隆的句柄；所有可變狀態都是實例字段（原子計數器與
/// 互斥隊列），不存在進程級單例。
///
/// # 示例
///
/// ```no_run
/// use agent_node::monitor::ProbeDispatcher;
/// use agent_node::types::{AgentConfig, MonitoringRequest};
///
/// # async fn example() -> agent_node::error::Result<()> {
/// let (dispatcher, mut results) = ProbeDispatcher::new(&AgentConfig::default())?;
///
/// dispatcher.queue_monitoring_request(MonitoringRequest::new(
///     "https://example.com/health",
///     "probe-1",
/// ));
///
/// if let Some(result) = results.recv().await {
///     println!("{}: {:?} ({:.1} ms)", result.callback_id, result.status, result.latency_ms);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProbeDispatcher {
    inner: Arc<Inner>,
}

impl ProbeDispatcher {
    /// 創建調度器與配套的結果接收端
    pub fn new(
        config: &AgentConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MonitoringResult>)> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let dispatcher = Self {
            inner: Arc::new(Inner {
                client,
                config: config.clone(),
                queue: Mutex::new(VecDeque::new()),
                active: AtomicUsize::new(0),
                total_processed: AtomicUsize::new(0),
                shutdown: AtomicBool::new(false),
                results_tx,
            }),
        };
        Ok((dispatcher, results_rx))
    }

    /// 立即執行單次探測（不經過隊列）
    ///
    /// 永不返回錯誤：所有失敗形態都折疊為 `Bad` 結果。
    /// 延遲為從進入本方法到產生結果的單調時鐘跨度，包含所有重試。
    pub async fn monitor_website(&self, request: MonitoringRequest) -> MonitoringResult {
        let start = Instant::now();

        let result = self.probe_with_retries(&request, start).await;

        self.inner.total_processed.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// 將請求追加到 FIFO 隊列並觸發泵送
    ///
    /// 結果經由構造時返回的 mpsc 接收端交付
    ///
    /// # Panics
    ///
    /// 泵送通過 `tokio::spawn` 生成工作任務，因此本方法雖是同步簽名，
    /// 仍必須在 Tokio 運行時上下文中調用，否則會 panic
    pub fn queue_monitoring_request(&self, request: MonitoringRequest) {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            warn!(
                callback_id = %request.callback_id,
                "Dispatcher destroyed; request dropped"
            );
            return;
        }

        self.lock_queue().push_back(request);
        self.pump();
    }

    /// 對整批請求並發執行探測
    ///
    /// 刻意繞過有界工作池：整批請求同時發起，不佔用隊列槽位。
    /// 結果順序與輸入順序一致，每個請求恰好一個結果。
    pub async fn monitor_multiple_websites(
        &self,
        requests: Vec<MonitoringRequest>,
    ) -> Vec<MonitoringResult> {
        let futures = requests
            .into_iter()
            .map(|request| self.monitor_website(request));
        futures::future::join_all(futures).await
    }

    /// 當前統計快照
    pub fn statistics(&self) -> DispatcherStats {
        DispatcherStats {
            active_requests: self.inner.active.load(Ordering::SeqCst),
            queued_requests: self.lock_queue().len(),
            total_processed: self.inner.total_processed.load(Ordering::Relaxed),
        }
    }

    /// 停止泵送並清空隊列與計數器
    ///
    /// 已在執行中的探測允許完成，但其結果不再交付
    pub fn destroy(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.lock_queue().clear();
        self.inner.total_processed.store(0, Ordering::Relaxed);
        info!("Probe dispatcher destroyed");
    }

    /// 泵送：只要有空閒槽且隊列非空就生成工作任務
    fn pump(&self) {
        loop {
            if self.inner.shutdown.load(Ordering::SeqCst) {
                return;
            }

            // 先佔槽再取任務，失敗則回退，避免超出並發上限
            let previous = self.inner.active.fetch_add(1, Ordering::SeqCst);
            if previous >= self.inner.config.max_concurrent_requests {
                self.inner.active.fetch_sub(1, Ordering::SeqCst);
                return;
            }

            let request = match self.lock_queue().pop_front() {
                Some(request) => request,
                None => {
                    self.inner.active.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            };

            let this = self.clone();
            tokio::spawn(async move {
                let callback_id = request.callback_id.clone();
                let result = this.monitor_website(request).await;

                if !this.inner.shutdown.load(Ordering::SeqCst) {
                    // 接收端被丟棄時結果被靜默丟棄
                    if this.inner.results_tx.send(result).is_err() {
                        debug!(callback_id = %callback_id, "Result receiver dropped");
                    }
                }

                this.inner.active.fetch_sub(1, Ordering::SeqCst);
                this.pump();
            });
        }
    }

    /// 帶重試的探測執行
    async fn probe_with_retries(
        &self,
        request: &MonitoringRequest,
        start: Instant,
    ) -> MonitoringResult {
        // 非 http(s) 方案直接折疊為 Bad，不重試
        let url_lower = request.url.to_ascii_lowercase();
        if !url_lower.starts_with("http://") && !url_lower.starts_with("https://") {
            return self.bad_result(
                request,
                start,
                None,
                Some(format!("Unsupported URL scheme: {}", request.url)),
            );
        }

        // 方法與請求頭的解析失敗是配置問題，不重試
        let method = match parse_method(request.method.as_deref()) {
            Ok(method) => method,
            Err(message) => return self.bad_result(request, start, None, Some(message)),
        };
        let headers = match parse_headers(request.headers.as_ref()) {
            Ok(headers) => headers,
            Err(message) => return self.bad_result(request, start, None, Some(message)),
        };

        let timeout = Duration::from_millis(
            request.timeout_ms.unwrap_or(self.inner.config.default_timeout_ms),
        );
        let want_body = request.expected_content.is_some();

        let attempts = self.inner.config.retry_attempts + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self
                .execute_probe(&request.url, method.clone(), headers.clone(), timeout, want_body)
                .await
            {
                Ok(outcome) => return self.classify(request, start, outcome),
                Err(err) => {
                    last_error = err.to_string();
                    if attempt < attempts {
                        let delay = self.inner.config.retry_delay_ms * u64::from(attempt);
                        warn!(
                            callback_id = %request.callback_id,
                            attempt,
                            delay_ms = delay,
                            error = %last_error,
                            "Probe transport failure; retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        self.bad_result(request, start, None, Some(last_error))
    }

    /// 單次 HTTP 嘗試；任何傳輸層失敗以 `Transport` 錯誤返回（可重試）
    ///
    /// `Transport` 僅在重試循環內部流轉，重試耗盡後折疊為 `Bad` 結果
    async fn execute_probe(
        &self,
        url: &str,
        method: Method,
        headers: HeaderMap,
        timeout: Duration,
        want_body: bool,
    ) -> Result<ProbeOutcome> {
        let response = self
            .inner
            .client
            .request(method, url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = response.status().as_u16();

        let body = if want_body {
            Some(
                read_capped_body(response)
                    .await
                    .map_err(|e| AgentError::Transport(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(ProbeOutcome { status, body })
    }

    /// 對最終 HTTP 響應分類
    fn classify(
        &self,
        request: &MonitoringRequest,
        start: Instant,
        outcome: ProbeOutcome,
    ) -> MonitoringResult {
        let expected = request
            .expected_status_codes
            .as_deref()
            .unwrap_or(&DEFAULT_EXPECTED_STATUS_CODES);

        let mut status = if expected.contains(&outcome.status) {
            ProbeStatus::Good
        } else {
            ProbeStatus::Bad
        };

        // 內容匹配僅在基線 Good 後運行，且只能降級
        let mut error = None;
        if status == ProbeStatus::Good {
            if let Some(expected_content) = &request.expected_content {
                let found = outcome
                    .body
                    .as_deref()
                    .map(|body| body.contains(expected_content.as_str()))
                    .unwrap_or(false);
                if !found {
                    status = ProbeStatus::Bad;
                    error = Some("Expected content not found in response body".to_string());
                }
            }
        }

        debug!(
            callback_id = %request.callback_id,
            http_status = outcome.status,
            result = ?status,
            "Probe classified"
        );

        MonitoringResult {
            callback_id: request.callback_id.clone(),
            status,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            http_status: Some(outcome.status),
            error,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn bad_result(
        &self,
        request: &MonitoringRequest,
        start: Instant,
        http_status: Option<u16>,
        error: Option<String>,
    ) -> MonitoringResult {
        MonitoringResult {
            callback_id: request.callback_id.clone(),
            status: ProbeStatus::Bad,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            http_status,
            error,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<MonitoringRequest>> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// 解析 HTTP 方法（默認 GET）
fn parse_method(method: Option<&str>) -> std::result::Result<Method, String> {
    match method {
        None => Ok(Method::GET),
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| format!("Invalid HTTP method: {}", m)),
    }
}

/// 解析附加請求頭
fn parse_headers(
    headers: Option<&std::collections::HashMap<String, String>>,
) -> std::result::Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    if let Some(headers) = headers {
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("Invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| format!("Invalid header value for {}", name))?;
            map.insert(name, value);
        }
    }
    Ok(map)
}

/// 讀取響應體，截斷到 10 MB 上限
async fn read_capped_body(
    mut response: reqwest::Response,
) -> std::result::Result<String, reqwest::Error> {
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() >= MAX_BODY_BYTES {
            let take = MAX_BODY_BYTES - body.len();
            body.extend_from_slice(&chunk[..take]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
