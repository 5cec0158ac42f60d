use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::{header::CONTENT_TYPE, Client, Response, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::time_entry::{TimeEntry, TimeTrackingSummary};

/// プロジェクトごとのtime entry一覧で取得できる最大件数。
pub const MAX_ENTRIES_LIMIT: u16 = 100;

/// 時間計測のバックエンドと通信するためのtrait。
///
/// 失敗の種類は区別しない。通信エラー、エラーステータス、不正なレスポンスは
/// すべて同じエラーとして返す。
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait TrackingRepository {
    /// 計測を開始し、新しく作成されたアクティブなtime entryを返す。
    async fn create_time_entry(&self, project_name: &str, user_email: &str) -> Result<TimeEntry>;

    /// 指定したtime entryの計測を終了する。
    ///
    /// バックエンドが本文を返さない場合は`None`となる。
    async fn stop_time_entry(&self, entry_id: i64) -> Result<Option<TimeEntry>>;

    /// ユーザーの現在アクティブなtime entryを取得する。
    async fn read_active_time_entry(&self, user_email: &str) -> Result<Option<TimeEntry>>;

    /// プロジェクトとユーザーの組に対する集計結果を取得する。
    async fn read_summary(&self, project_name: &str, user_email: &str) -> Result<TimeTrackingSummary>;

    /// プロジェクトのtime entryを新しい順に最大`limit`件取得する。
    async fn read_project_time_entries(
        &self,
        project_name: &str,
        user_email: &str,
        limit: u16,
    ) -> Result<Vec<TimeEntry>>;
}

#[derive(Debug, Serialize)]
struct CreateTimeEntryRequest<'a> {
    project_name: &'a str,
    user_email: &'a str,
}

/// 時間計測のREST APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TrackingClient::new("http://localhost:8000/api").unwrap();
/// let entry = client.create_time_entry("Tower A", "detailer@example.com").await.unwrap();
/// ```
pub struct TrackingClient {
    client: Client,
    api_url: Url,
}

impl TrackingClient {
    /// 新しい`TrackingClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `api_url` - APIのベースURL (例: `http://localhost:8000/api`)
    pub fn new(api_url: &str) -> Result<Self> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid API url: {}", api_url))?;
        if api_url.cannot_be_a_base() {
            anyhow::bail!("API url cannot be used as a base: {}", api_url);
        }

        Ok(Self {
            client: Client::new(),
            api_url,
        })
    }

    /// ベースURLの後ろにパスセグメントを追加したURLを返す。
    ///
    /// 各セグメントはパーセントエンコードされる。
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API url cannot be used as a base: {}", self.api_url))?
            .pop_if_empty()
            .push("time-tracking")
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        request
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracking API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .context("Failed to deserialize response")
    }

    /// 本文が空、または`null`の場合に`None`を返す。
    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>> {
        let body = self
            .send(request)
            .await?
            .text()
            .await
            .context("Failed to read response body")?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Option<T>>(&body).context("Failed to deserialize response")
    }
}

impl TrackingRepository for TrackingClient {
    async fn create_time_entry(&self, project_name: &str, user_email: &str) -> Result<TimeEntry> {
        let url = self.endpoint(&[])?;
        debug!("POST {}", url);
        let entry: TimeEntry = self
            .send_json(self.client.post(url).json(&CreateTimeEntryRequest {
                project_name,
                user_email,
            }))
            .await?;
        info!("Started time entry {} for {}", entry.id, entry.project_name);

        Ok(entry)
    }

    async fn stop_time_entry(&self, entry_id: i64) -> Result<Option<TimeEntry>> {
        let url = self.endpoint(&[&entry_id.to_string()])?;
        debug!("PUT {}", url);
        let entry = self.send_optional(self.client.put(url)).await?;
        info!("Stopped time entry {}", entry_id);

        Ok(entry)
    }

    async fn read_active_time_entry(&self, user_email: &str) -> Result<Option<TimeEntry>> {
        let url = self.endpoint(&["active", user_email])?;
        debug!("GET {}", url);

        self.send_optional(self.client.get(url)).await
    }

    async fn read_summary(&self, project_name: &str, user_email: &str) -> Result<TimeTrackingSummary> {
        let url = self.endpoint(&["summary", project_name])?;
        debug!("GET {}", url);

        self.send_json(self.client.get(url).query(&[("user_email", user_email)]))
            .await
    }

    async fn read_project_time_entries(
        &self,
        project_name: &str,
        user_email: &str,
        limit: u16,
    ) -> Result<Vec<TimeEntry>> {
        let url = self.endpoint(&["project", project_name])?;
        debug!("GET {}", url);
        let limit = limit.clamp(1, MAX_ENTRIES_LIMIT).to_string();
        let entries: Vec<TimeEntry> = self
            .send_json(
                self.client
                    .get(url)
                    .query(&[("user_email", user_email), ("limit", limit.as_str())]),
            )
            .await?;
        info!("length of time entries: {}", entries.len());

        Ok(entries)
    }
}
