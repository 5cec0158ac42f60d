use anyhow::{Context, Result};
use log::{info, warn};

use crate::console::format_duration;
use crate::recent_projects::{RecentProject, RecentProjects};
use crate::session_store::SessionStore;
use crate::time_entry::TimeEntry;
use crate::tracking_api::TrackingRepository;

/// プロジェクトを開いて計測を開始するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct OpenArgs {
    #[clap(help = "Name of the project to open")]
    project: String,
}

/// `open`サブコマンドの結果。
#[derive(Debug)]
pub struct OpenOutcome {
    pub recent_projects: Vec<RecentProject>,
    /// 計測を開始できなかった場合は`None`。
    pub session: Option<TimeEntry>,
}

pub struct OpenCommand<'a, T: TrackingRepository> {
    store: &'a SessionStore<T>,
    recent_projects: &'a RecentProjects,
}

impl<'a, T: TrackingRepository> OpenCommand<'a, T> {
    /// 新しい`OpenCommand`を返す。
    ///
    /// # Arguments
    /// * `store` - 計測中のセッションを保持するストア
    /// * `recent_projects` - 最近のプロジェクトの一覧
    pub fn new(store: &'a SessionStore<T>, recent_projects: &'a RecentProjects) -> Self {
        Self {
            store,
            recent_projects,
        }
    }

    /// `open`サブコマンドの処理を行う。
    ///
    /// 最近のプロジェクトに追加した後、別のプロジェクトを計測中であれば終了してから計測を開始する。
    /// 計測の開始に失敗してもプロジェクトを開くこと自体は成功とする。
    pub async fn run(&self, args: OpenArgs, user_email: &str) -> Result<OpenOutcome> {
        let recent_projects = self
            .recent_projects
            .touch(user_email, &args.project)
            .with_context(|| format!("Failed to record recent project: {}", args.project))?;
        info!("Opened project {}", args.project);

        let session = match self.store.switch_project(&args.project, user_email).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Opening {} without time tracking: {:#}", args.project, e);
                None
            }
        };

        Ok(OpenOutcome {
            recent_projects,
            session,
        })
    }
}

/// プロジェクトを閉じてダッシュボードに戻るためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct CloseArgs {
    #[clap(help = "Name of the project to close")]
    project: String,
}

pub struct CloseCommand<'a, T: TrackingRepository> {
    store: &'a SessionStore<T>,
}

impl<'a, T: TrackingRepository> CloseCommand<'a, T> {
    /// 新しい`CloseCommand`を返す。
    pub fn new(store: &'a SessionStore<T>) -> Self {
        Self { store }
    }

    /// `close`サブコマンドの処理を行う。
    ///
    /// そのプロジェクトを計測中の場合のみ計測を終了する。
    /// 終了に失敗してもプロジェクトを閉じること自体は成功とし、計測中のまま残す。
    /// 計測を終了した場合は`true`を返す。
    pub async fn run(&self, args: CloseArgs) -> bool {
        let elapsed = self.store.elapsed_seconds();
        match self.store.leave_project(&args.project).await {
            Ok(true) => {
                info!("Tracked {} on {}", format_duration(elapsed), args.project);
                true
            }
            Ok(false) => {
                info!("Not tracking {}", args.project);
                false
            }
            Err(e) => {
                warn!("Closing {} while still tracking: {:#}", args.project, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use chrono::Utc;
    use mockall::predicate::eq;

    use super::{CloseArgs, CloseCommand, OpenArgs, OpenCommand};
    use crate::session_store::SessionStore;
    use crate::test_support::{temp_cache, temp_projects};
    use crate::time_entry::dummy_entry;
    use crate::tracking_api::MockTrackingRepository;

    const USER: &str = "detailer@example.com";

    #[tokio::test]
    async fn test_open_starts_tracking() {
        let mut repository = MockTrackingRepository::new();
        repository
            .expect_create_time_entry()
            .times(1)
            .returning(|project, _| Ok(dummy_entry(1, project, Utc::now())));
        let (_dir, cache) = temp_cache();
        let store = SessionStore::new(repository, cache, None);
        let (_projects_dir, recent) = temp_projects();

        let outcome = OpenCommand::new(&store, &recent)
            .run(
                OpenArgs {
                    project: "Tower A".to_string(),
                },
                USER,
            )
            .await
            .unwrap();

        assert_eq!(outcome.session.map(|entry| entry.project_name).as_deref(), Some("Tower A"));
        assert_eq!(outcome.recent_projects[0].name, "Tower A");
        assert!(store.state().is_tracking);
    }

    /// 計測の開始に失敗してもプロジェクトは開ける。
    #[tokio::test]
    async fn test_open_without_tracking() {
        let mut repository = MockTrackingRepository::new();
        repository
            .expect_create_time_entry()
            .times(1)
            .returning(|_, _| Err(anyhow!("connection refused")));
        let (_dir, cache) = temp_cache();
        let store = SessionStore::new(repository, cache, None);
        let (_projects_dir, recent) = temp_projects();

        let outcome = OpenCommand::new(&store, &recent)
            .run(
                OpenArgs {
                    project: "Tower A".to_string(),
                },
                USER,
            )
            .await
            .unwrap();

        assert!(outcome.session.is_none());
        assert_eq!(recent.list(USER).unwrap()[0].name, "Tower A");
        assert!(!store.state().is_tracking);
    }

    #[tokio::test]
    async fn test_close_tracked_project() {
        let mut repository = MockTrackingRepository::new();
        repository
            .expect_create_time_entry()
            .returning(|project, _| Ok(dummy_entry(1, project, Utc::now())));
        repository
            .expect_stop_time_entry()
            .with(eq(1i64))
            .times(1)
            .returning(|_| Ok(None));
        let (_dir, cache) = temp_cache();
        let store = SessionStore::new(repository, cache, None);
        store.start_tracking("Tower A", USER).await.unwrap();

        let stopped = CloseCommand::new(&store)
            .run(CloseArgs {
                project: "Tower A".to_string(),
            })
            .await;

        assert!(stopped);
        assert!(!store.state().is_tracking);
    }

    /// 別のプロジェクトを閉じても計測中のセッションは終了しない。
    #[tokio::test]
    async fn test_close_other_project() {
        let mut repository = MockTrackingRepository::new();
        repository
            .expect_create_time_entry()
            .returning(|project, _| Ok(dummy_entry(1, project, Utc::now())));
        repository.expect_stop_time_entry().times(0);
        let (_dir, cache) = temp_cache();
        let store = SessionStore::new(repository, cache, None);
        store.start_tracking("Tower A", USER).await.unwrap();

        let stopped = CloseCommand::new(&store)
            .run(CloseArgs {
                project: "Tower B".to_string(),
            })
            .await;

        assert!(!stopped);
        assert_eq!(store.state().active_project.as_deref(), Some("Tower A"));
    }

    /// 終了に失敗しても閉じること自体は成功し、計測中のまま残る。
    #[tokio::test]
    async fn test_close_stop_failure() {
        let mut repository = MockTrackingRepository::new();
        repository
            .expect_create_time_entry()
            .returning(|project, _| Ok(dummy_entry(1, project, Utc::now())));
        repository
            .expect_stop_time_entry()
            .times(1)
            .returning(|_| Err(anyhow!("timed out")));
        let (_dir, cache) = temp_cache();
        let store = SessionStore::new(repository, cache, None);
        store.start_tracking("Tower A", USER).await.unwrap();

        let stopped = CloseCommand::new(&store)
            .run(CloseArgs {
                project: "Tower A".to_string(),
            })
            .await;

        assert!(!stopped);
        assert!(store.state().is_tracking);
    }
}
