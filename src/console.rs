use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;

use crate::datetime;
use crate::recent_projects::RecentProject;
use crate::session_store::TrackingState;
use crate::time_entry::{TimeEntry, TimeTrackingSummary};

/// 秒数を`HH:MM:SS`形式にする。時間は24を超えても繰り上げない。
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Consoleに計測結果を表示するためのtrait。
pub trait ConsolePresenter {
    /// 現在の計測状態を表示する。
    fn show_state(&mut self, state: &TrackingState) -> Result<()>;

    /// 計測中のタイマーを同じ行に上書きして表示する。
    fn show_live_timer(&mut self, state: &TrackingState) -> Result<()>;

    /// プロジェクトの集計結果を表示する。
    ///
    /// # Arguments
    ///
    /// * `summary` - 表示する集計結果
    /// * `state` - 計測中であれば経過時間を合わせて表示する
    fn show_summary(&mut self, summary: &TimeTrackingSummary, state: &TrackingState) -> Result<()>;

    /// タイムエントリーを表示する。
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()>;

    /// 最近のプロジェクトを表示する。
    fn show_recent_projects(&mut self, projects: &[RecentProject]) -> Result<()>;
}

/// 計測結果をMarkdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    fn write_entry(&mut self, entry: &TimeEntry) -> Result<()> {
        let start_str = entry
            .start_time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let end_str = entry
            .end_time
            .map(|end| end.with_timezone(&Local).format("%H:%M").to_string())
            .unwrap_or_else(|| "now".to_string());
        let duration = entry
            .duration_seconds
            .unwrap_or_else(|| entry.elapsed_seconds(datetime::now()));
        writeln!(
            self.writer,
            "- {} ~ {}: {}",
            start_str,
            end_str,
            format_duration(duration)
        )
        .with_context(|| format!("Failed to write time entry: {:?}", entry))
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    fn show_state(&mut self, state: &TrackingState) -> Result<()> {
        let written = match (&state.active_project, state.is_tracking) {
            (Some(project), true) => writeln!(
                self.writer,
                "Tracking {}: {}",
                project,
                format_duration(state.elapsed_seconds())
            ),
            _ => writeln!(self.writer, "Not tracking"),
        };
        written.context("Failed to write tracking state")
    }

    fn show_live_timer(&mut self, state: &TrackingState) -> Result<()> {
        let line = match (&state.active_project, state.is_tracking) {
            (Some(project), true) => format!(
                "Tracking {}: {}",
                project,
                format_duration(state.elapsed_seconds())
            ),
            _ => "Not tracking".to_string(),
        };
        // 前の表示より短い場合に備えて行末まで消す
        write!(self.writer, "\r{}\x1b[K", line)
            .and_then(|_| self.writer.flush())
            .context("Failed to write live timer")
    }

    fn show_summary(&mut self, summary: &TimeTrackingSummary, state: &TrackingState) -> Result<()> {
        writeln!(self.writer, "## {}", summary.project_name)
            .and_then(|_| writeln!(self.writer, "- total: {:.2} h", summary.total_hours))
            .context("Failed to write summary")?;

        let tracking_this_project =
            state.is_tracking && state.active_project.as_deref() == Some(summary.project_name.as_str());
        if tracking_this_project {
            writeln!(
                self.writer,
                "- currently tracking: {}",
                format_duration(state.elapsed_seconds())
            )
            .context("Failed to write summary")?;
        }

        if summary.recent_entries.is_empty() {
            return Ok(());
        }
        writeln!(self.writer, "\n### Recent entries").context("Failed to write summary")?;
        self.show_time_entries(&summary.recent_entries)
    }

    // time entryを開始時刻の新しい順に表示する。
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()> {
        let mut sorted_entries = time_entries.to_vec();
        sorted_entries.sort_by_key(|entry| std::cmp::Reverse(entry.start_time));

        for entry in &sorted_entries {
            self.write_entry(entry)?;
        }

        Ok(())
    }

    fn show_recent_projects(&mut self, projects: &[RecentProject]) -> Result<()> {
        if projects.is_empty() {
            return writeln!(self.writer, "No recent activity yet.")
                .context("Failed to write recent projects");
        }
        for project in projects {
            writeln!(
                self.writer,
                "- {} ({})",
                project.name,
                project.created_at.with_timezone(&Local).format("%Y-%m-%d")
            )
            .with_context(|| format!("Failed to write recent project: {}", project.name))?;
        }

        Ok(())
    }
}
