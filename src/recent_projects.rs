use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime;

/// ユーザーごとに保持する最近のプロジェクトの最大件数。
pub const MAX_RECENT_PROJECTS: usize = 20;

const RECENT_PROJECTS_FILE: &str = "recent_projects.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecentProject {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// ユーザーごとの最近開いたプロジェクトの一覧。
pub struct RecentProjects {
    path: PathBuf,
}

impl RecentProjects {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(RECENT_PROJECTS_FILE))
    }

    /// ユーザーの最近のプロジェクトを新しい順に返す。
    pub fn list(&self, user_email: &str) -> Result<Vec<RecentProject>> {
        Ok(self.read_all()?.remove(user_email).unwrap_or_default())
    }

    /// プロジェクトを先頭に移動、またはなければ追加する。
    ///
    /// 同じ名前のプロジェクトは1つにまとめ、最大件数を超えた古いものは削除する。
    pub fn touch(&self, user_email: &str, project_name: &str) -> Result<Vec<RecentProject>> {
        let mut all = self.read_all()?;
        let projects = all.entry(user_email.to_string()).or_default();
        projects.retain(|project| project.name != project_name);
        projects.insert(
            0,
            RecentProject {
                name: project_name.to_string(),
                created_at: datetime::now(),
            },
        );
        projects.truncate(MAX_RECENT_PROJECTS);
        let updated = projects.clone();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(&all).context("Failed to serialize recent projects")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(updated)
    }

    fn read_all(&self) -> Result<HashMap<String, Vec<RecentProject>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::MAX_RECENT_PROJECTS;
    use crate::datetime::mock_clock;
    use crate::test_support::temp_projects;

    const USER: &str = "detailer@example.com";

    #[test]
    fn test_list_empty() {
        let (_dir, projects) = temp_projects();

        assert!(projects.list(USER).unwrap().is_empty());
    }

    #[test]
    fn test_touch_moves_project_to_front() {
        let (_dir, projects) = temp_projects();
        mock_clock::freeze_at(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        projects.touch(USER, "Tower A").unwrap();
        mock_clock::advance(Duration::minutes(1));
        projects.touch(USER, "Tower B").unwrap();
        mock_clock::advance(Duration::minutes(1));

        projects.touch(USER, "Tower A").unwrap();

        let names: Vec<String> = projects
            .list(USER)
            .unwrap()
            .into_iter()
            .map(|project| project.name)
            .collect();
        assert_eq!(names, vec!["Tower A", "Tower B"]);
        assert_eq!(
            projects.list(USER).unwrap()[0].created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 2, 0).unwrap()
        );
        mock_clock::unfreeze();
    }

    #[test]
    fn test_touch_truncates() {
        let (_dir, projects) = temp_projects();

        for i in 0..MAX_RECENT_PROJECTS + 5 {
            projects.touch(USER, &format!("Project {}", i)).unwrap();
        }

        let list = projects.list(USER).unwrap();
        assert_eq!(list.len(), MAX_RECENT_PROJECTS);
        assert_eq!(list[0].name, format!("Project {}", MAX_RECENT_PROJECTS + 4));
    }

    /// ユーザーごとに別の一覧を持つ。
    #[test]
    fn test_projects_are_per_user() {
        let (_dir, projects) = temp_projects();

        projects.touch(USER, "Tower A").unwrap();
        projects.touch("checker@example.com", "Bridge 7").unwrap();

        assert_eq!(projects.list(USER).unwrap().len(), 1);
        assert_eq!(projects.list("checker@example.com").unwrap()[0].name, "Bridge 7");
    }
}
