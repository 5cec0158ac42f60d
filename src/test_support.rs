use tempfile::TempDir;

use crate::recent_projects::RecentProjects;
use crate::session_cache::SessionCache;

/// テスト用の一時ディレクトリ。戻り値が破棄されると中身ごと削除される。
pub fn scratch_dir() -> TempDir {
    tempfile::tempdir().expect("temp dir")
}

/// 一時ディレクトリ配下にキャッシュを作成する。
///
/// ディレクトリを保持するため、`TempDir`はテストの最後まで破棄しないこと。
pub fn temp_cache() -> (TempDir, SessionCache) {
    let dir = scratch_dir();
    let cache = SessionCache::in_dir(dir.path());
    (dir, cache)
}

/// 一時ディレクトリ配下に最近のプロジェクトの一覧を作成する。
pub fn temp_projects() -> (TempDir, RecentProjects) {
    let dir = scratch_dir();
    let projects = RecentProjects::in_dir(dir.path());
    (dir, projects)
}
