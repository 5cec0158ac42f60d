use anyhow::{Context, Result};
use log::info;

use crate::session_store::SessionStore;
use crate::time_entry::{TimeEntry, TimeTrackingSummary};
use crate::tracking_api::{TrackingRepository, MAX_ENTRIES_LIMIT};

/// プロジェクトの集計結果を表示するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct SummaryArgs {
    #[clap(help = "Name of the project")]
    pub project: String,
}

/// プロジェクトのtime entryを表示するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct EntriesArgs {
    #[clap(help = "Name of the project")]
    pub project: String,

    #[clap(
        short = 'l',
        long = "limit",
        default_value_t = 50,
        value_parser = clap::value_parser!(u16).range(1..=MAX_ENTRIES_LIMIT as i64),
        help = "Maximum number of entries to show"
    )]
    pub limit: u16,
}

pub struct ReportCommand<'a, T: TrackingRepository> {
    store: &'a SessionStore<T>,
}

impl<'a, T: TrackingRepository> ReportCommand<'a, T> {
    /// 新しい`ReportCommand`を返す。
    pub fn new(store: &'a SessionStore<T>) -> Self {
        Self { store }
    }

    /// `summary`サブコマンドの処理を行う。
    pub async fn summary(&self, args: SummaryArgs, user_email: &str) -> Result<TimeTrackingSummary> {
        let summary = self
            .store
            .project_summary(&args.project, user_email)
            .await
            .context("Failed to retrieve summary")?;
        info!("Summary for {} retrieved successfully.", args.project);

        Ok(summary)
    }

    /// `entries`サブコマンドの処理を行う。
    pub async fn entries(&self, args: EntriesArgs, user_email: &str) -> Result<Vec<TimeEntry>> {
        let entries = self
            .store
            .project_entries(&args.project, user_email, args.limit)
            .await
            .context("Failed to retrieve time entries")?;
        info!("Time entries retrieved successfully.");

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use mockall::predicate::eq;
    use rstest::rstest;

    use super::{EntriesArgs, ReportCommand, SummaryArgs};
    use crate::session_store::SessionStore;
    use crate::test_support::temp_cache;
    use crate::time_entry::TimeTrackingSummary;
    use crate::tracking_api::MockTrackingRepository;

    const USER: &str = "detailer@example.com";

    #[derive(Debug, Parser)]
    struct TestCli {
        #[clap(flatten)]
        entries: EntriesArgs,
    }

    #[tokio::test]
    async fn test_summary() {
        let mut repository = MockTrackingRepository::new();
        repository
            .expect_read_summary()
            .with(eq("Tower A"), eq(USER))
            .times(1)
            .returning(|project, _| {
                Ok(TimeTrackingSummary {
                    project_name: project.to_string(),
                    total_hours: 0.0,
                    active_session: None,
                    recent_entries: vec![],
                })
            });
        let (_dir, cache) = temp_cache();
        let store = SessionStore::new(repository, cache, None);

        let summary = ReportCommand::new(&store)
            .summary(
                SummaryArgs {
                    project: "Tower A".to_string(),
                },
                USER,
            )
            .await
            .unwrap();

        assert_eq!(summary.project_name, "Tower A");
    }

    #[tokio::test]
    async fn test_entries() {
        let mut repository = MockTrackingRepository::new();
        repository
            .expect_read_project_time_entries()
            .with(eq("Tower A"), eq(USER), eq(10u16))
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        let (_dir, cache) = temp_cache();
        let store = SessionStore::new(repository, cache, None);

        let entries = ReportCommand::new(&store)
            .entries(
                EntriesArgs {
                    project: "Tower A".to_string(),
                    limit: 10,
                },
                USER,
            )
            .await
            .unwrap();

        assert!(entries.is_empty());
    }

    #[rstest]
    #[case::default(&["test", "Tower A"], Some(50))]
    #[case::explicit(&["test", "Tower A", "--limit", "100"], Some(100))]
    #[case::zero(&["test", "Tower A", "-l", "0"], None)]
    #[case::over(&["test", "Tower A", "-l", "101"], None)]
    fn test_entries_limit(#[case] argv: &[&str], #[case] expected: Option<u16>) {
        let parsed = TestCli::try_parse_from(argv).ok().map(|cli| cli.entries.limit);

        assert_eq!(parsed, expected);
    }
}
