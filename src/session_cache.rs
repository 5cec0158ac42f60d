use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::time_entry::TimeEntry;

/// アクティブなセッションを保存するファイル名。
pub const ACTIVE_SESSION_FILE: &str = "active_session.json";

/// アクティブなセッションをローカルに保持するキャッシュ。
///
/// 書き込みは最後に書いたものが残る。ロックは行わない。
/// 正となる情報は常にバックエンドであり、このキャッシュは補助的に利用する。
#[derive(Clone, Debug)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    /// 新しい`SessionCache`を返す。
    ///
    /// # Arguments
    ///
    /// * `path` - キャッシュを保存するファイルのパス
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// データディレクトリ配下の既定のファイルを利用する`SessionCache`を返す。
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(ACTIVE_SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// キャッシュされたセッションを読み込む。ファイルがない場合は`None`を返す。
    pub fn load(&self) -> Result<Option<TimeEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let entry = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cached session: {}", self.path.display()))?;

        Ok(Some(entry))
    }

    /// セッションを書き込む。
    pub fn save(&self, entry: &TimeEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string(entry).context("Failed to serialize session")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!("Cached session {} at {}", entry.id, self.path.display());

        Ok(())
    }

    /// キャッシュを削除する。ファイルがない場合も成功とする。
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
