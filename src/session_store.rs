use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::datetime;
use crate::session_cache::SessionCache;
use crate::time_entry::{TimeEntry, TimeTrackingSummary};
use crate::tracking_api::TrackingRepository;

/// 計測中に表示を更新する間隔。
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// ある時点での計測状態。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingState {
    pub active_session: Option<TimeEntry>,
    pub active_project: Option<String>,
    pub is_tracking: bool,
}

impl TrackingState {
    /// 配信されたセッションをそのまま採用した状態を返す。
    fn from_session(session: Option<&TimeEntry>) -> Self {
        match session {
            Some(session) => Self {
                active_session: Some(session.clone()),
                active_project: Some(session.project_name.clone()),
                is_tracking: session.is_active,
            },
            None => Self::default(),
        }
    }

    /// 現在時刻での経過秒数。計測していない場合は0を返す。
    pub fn elapsed_seconds(&self) -> i64 {
        match (&self.active_session, self.is_tracking) {
            (Some(session), true) => session.elapsed_seconds(datetime::now()),
            _ => 0,
        }
    }
}

/// ユーザーのアクティブなセッションを1つだけ保持する共有ストア。
///
/// 状態は`watch`チャネルに1つだけ保持し、購読している全ての`TrackingView`に配信する。
/// 配信はバックエンドの呼び出しが成功した後にのみ行う。
/// 同時に呼ばれた`start_tracking`の直列化は行わない。
pub struct SessionStore<R: TrackingRepository> {
    repository: R,
    cache: SessionCache,
    user_email: Option<String>,
    sender: watch::Sender<Option<TimeEntry>>,
}

impl<R: TrackingRepository> SessionStore<R> {
    /// 新しい`SessionStore`を返す。
    ///
    /// # Arguments
    ///
    /// * `repository` - バックエンドと通信するためのリポジトリ
    /// * `cache` - アクティブなセッションを保存するローカルキャッシュ
    /// * `user_email` - マウント時の照合に利用する、サインイン中のユーザー
    pub fn new(repository: R, cache: SessionCache, user_email: Option<String>) -> Self {
        let (sender, _) = watch::channel(None);

        Self {
            repository,
            cache,
            user_email,
            sender,
        }
    }

    /// 状態の変更を購読する`TrackingView`を返す。
    pub fn subscribe(&self) -> TrackingView {
        TrackingView {
            receiver: self.sender.subscribe(),
        }
    }

    /// 購読を開始し、バックエンドのアクティブなセッションと照合する。
    ///
    /// 照合は1回だけ行い、ポーリングはしない。
    /// 照合の失敗はログに出力するだけで、呼び出し元には返さない。
    pub async fn mount(&self) -> TrackingView {
        let view = self.subscribe();
        self.reconcile().await;
        view
    }

    /// 現在の計測状態を返す。
    pub fn state(&self) -> TrackingState {
        TrackingState::from_session(self.sender.borrow().as_ref())
    }

    /// 現在時刻での経過秒数。計測していない場合は0を返す。
    pub fn elapsed_seconds(&self) -> i64 {
        self.state().elapsed_seconds()
    }

    async fn reconcile(&self) {
        let Some(user_email) = self.user_email.as_deref() else {
            debug!("No signed-in user, falling back to the cached session");
            self.adopt_cached_session();
            return;
        };

        match self.repository.read_active_time_entry(user_email).await {
            Ok(Some(session)) => {
                info!(
                    "Resuming active session {} on {}",
                    session.id, session.project_name
                );
                self.save_cache(&session);
                self.publish(Some(session));
            }
            Ok(None) => {
                if self.sender.borrow().is_none() {
                    self.clear_cache();
                }
            }
            Err(e) => {
                warn!("Failed to check active session: {:#}", e);
                self.adopt_cached_session();
            }
        }
    }

    /// ストアが空の場合のみ、キャッシュされたセッションを採用する。
    ///
    /// サインイン中のユーザーと異なるユーザーのセッションは採用しない。
    fn adopt_cached_session(&self) {
        if self.sender.borrow().is_some() {
            return;
        }
        match self.cache.load() {
            Ok(Some(session))
                if self
                    .user_email
                    .as_deref()
                    .is_some_and(|email| email != session.user_email) =>
            {
                debug!(
                    "Ignoring cached session {} of another user {}",
                    session.id, session.user_email
                );
            }
            Ok(Some(session)) => {
                debug!(
                    "Adopting cached session {} from {}",
                    session.id,
                    self.cache.path().display()
                );
                self.publish(Some(session));
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable session cache: {:#}", e),
        }
    }

    /// 計測を開始する。
    ///
    /// 別のプロジェクトを計測中の場合、先に`stop_tracking`を呼ぶのは呼び出し元の責任とする。
    /// 失敗した場合は状態を変更せずにエラーを返す。再試行は行わない。
    pub async fn start_tracking(&self, project_name: &str, user_email: &str) -> Result<TimeEntry> {
        let session = self
            .repository
            .create_time_entry(project_name, user_email)
            .await
            .with_context(|| format!("Failed to start tracking {}", project_name))
            .inspect_err(|e| error!("{:#}", e))?;

        self.save_cache(&session);
        self.publish(Some(session.clone()));

        Ok(session)
    }

    /// 計測を終了する。
    ///
    /// アクティブなセッションがない場合は何もせずに`None`を返す。
    /// バックエンドが終了したtime entryを返した場合はそれを返す。
    /// 失敗した場合は状態を変更せずにエラーを返す。
    pub async fn stop_tracking(&self) -> Result<Option<TimeEntry>> {
        let Some(session_id) = self.sender.borrow().as_ref().map(|session| session.id) else {
            debug!("No active session to stop");
            return Ok(None);
        };

        let finished = self
            .repository
            .stop_time_entry(session_id)
            .await
            .with_context(|| format!("Failed to stop tracking session {}", session_id))
            .inspect_err(|e| error!("{:#}", e))?;

        self.clear_cache();
        self.publish(None);

        Ok(finished)
    }

    /// 別のプロジェクトを計測中であれば終了してから、指定したプロジェクトの計測を開始する。
    pub async fn switch_project(&self, project_name: &str, user_email: &str) -> Result<TimeEntry> {
        let state = self.state();
        if state.is_tracking && state.active_project.as_deref() != Some(project_name) {
            self.stop_tracking().await?;
        }

        self.start_tracking(project_name, user_email).await
    }

    /// プロジェクトを離れる。そのプロジェクトを計測中の場合のみ計測を終了する。
    ///
    /// 計測を終了した場合は`true`を返す。
    pub async fn leave_project(&self, project_name: &str) -> Result<bool> {
        let state = self.state();
        if !state.is_tracking || state.active_project.as_deref() != Some(project_name) {
            debug!("Leaving {} without an active session on it", project_name);
            return Ok(false);
        }

        self.stop_tracking().await?;
        Ok(true)
    }

    /// プロジェクトの集計結果を取得する。状態は変更しない。
    pub async fn project_summary(
        &self,
        project_name: &str,
        user_email: &str,
    ) -> Result<TimeTrackingSummary> {
        self.repository
            .read_summary(project_name, user_email)
            .await
            .with_context(|| format!("Failed to get project summary for {}", project_name))
            .inspect_err(|e| error!("{:#}", e))
    }

    /// プロジェクトのtime entryを取得する。状態は変更しない。
    pub async fn project_entries(
        &self,
        project_name: &str,
        user_email: &str,
        limit: u16,
    ) -> Result<Vec<TimeEntry>> {
        self.repository
            .read_project_time_entries(project_name, user_email, limit)
            .await
            .with_context(|| format!("Failed to get time entries for {}", project_name))
            .inspect_err(|e| error!("{:#}", e))
    }

    fn publish(&self, session: Option<TimeEntry>) {
        self.sender.send_replace(session);
    }

    fn save_cache(&self, session: &TimeEntry) {
        if let Err(e) = self.cache.save(session) {
            warn!("Failed to cache active session: {:#}", e);
        }
    }

    fn clear_cache(&self) {
        if let Err(e) = self.cache.clear() {
            warn!("Failed to clear cached session: {:#}", e);
        }
    }
}

/// `SessionStore`を購読する側の窓口。
///
/// 画面ごとに1つ持ち、配信された状態をそのまま採用する。
pub struct TrackingView {
    receiver: watch::Receiver<Option<TimeEntry>>,
}

impl TrackingView {
    pub fn state(&self) -> TrackingState {
        TrackingState::from_session(self.receiver.borrow().as_ref())
    }

    /// 次に状態が変更されるまで待つ。
    pub async fn changed(&mut self) -> Result<TrackingState> {
        self.receiver
            .changed()
            .await
            .context("Session store was dropped")?;
        Ok(self.state())
    }

    /// 表示を更新すべきタイミングまで待つ。
    ///
    /// 状態が変更された時に加えて、計測中は`ticker`が進むたびに戻る。
    pub async fn next_refresh(&mut self, ticker: &mut Interval) -> Result<TrackingState> {
        if !self.state().is_tracking {
            return self.changed().await;
        }

        tokio::select! {
            changed = self.receiver.changed() => changed.context("Session store was dropped")?,
            _ = ticker.tick() => {}
        }
        Ok(self.state())
    }
}

/// 表示更新用の`Interval`を返す。
///
/// 遅れた分のtickはまとめずに読み飛ばす。経過時間は毎回開始時刻から計算するため、
/// tickを取りこぼしても表示はずれない。
pub fn refresh_ticker() -> Interval {
    let mut ticker = time::interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
