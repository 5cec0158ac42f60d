use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dirs::home_dir;
use log::debug;

/// APIのベースURLの既定値。
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const API_URL_ENV: &str = "STEELTRACK_API_URL";
const DATA_DIR_ENV: &str = "STEELTRACK_DATA_DIR";
const USER_EMAIL_ENV: &str = "STEELTRACK_USER_EMAIL";
const DATA_DIR_NAME: &str = ".steeltrack";
const USER_EMAIL_FILE: &str = "user_email";

/// 実行時の設定。
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub data_dir: PathBuf,
    /// サインイン中のユーザー。マウント時の照合に利用する。
    pub user_email: Option<String>,
}

impl Config {
    /// 環境変数とデータディレクトリから設定を読み込む。
    ///
    /// ユーザーは`email`、環境変数`STEELTRACK_USER_EMAIL`、
    /// データディレクトリにキャッシュされた値の順に優先する。
    ///
    /// # Arguments
    ///
    /// * `email` - コマンドラインで指定されたユーザー
    pub fn load(email: Option<String>) -> Result<Self> {
        let api_url = env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let data_dir = match env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => home_dir()
                .context("Failed to resolve home directory")?
                .join(DATA_DIR_NAME),
        };
        let user_email = match email.or_else(|| env::var(USER_EMAIL_ENV).ok()) {
            Some(email) => Some(email),
            None => read_user_email(&data_dir)?,
        };
        debug!("API url: {}, data dir: {}", api_url, data_dir.display());

        Ok(Self {
            api_url,
            data_dir,
            user_email: user_email.filter(|email| !email.trim().is_empty()),
        })
    }

    /// サインイン中のユーザーを返す。いない場合はエラーを返す。
    pub fn require_user_email(&self) -> Result<&str> {
        self.user_email
            .as_deref()
            .context("No signed-in user. Run `steeltrack login --email <EMAIL>` first")
    }
}

/// サインインしたユーザーをデータディレクトリにキャッシュする。
pub fn save_user_email(data_dir: &Path, email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        bail!("Invalid email address: {:?}", email);
    }
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let path = data_dir.join(USER_EMAIL_FILE);
    fs::write(&path, email).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}

/// キャッシュしたユーザーを削除する。
pub fn clear_user_email(data_dir: &Path) -> Result<()> {
    let path = data_dir.join(USER_EMAIL_FILE);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

fn read_user_email(data_dir: &Path) -> Result<Option<String>> {
    let path = data_dir.join(USER_EMAIL_FILE);
    match fs::read_to_string(&path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{clear_user_email, read_user_email, save_user_email, Config};
    use crate::test_support::scratch_dir;

    #[test]
    fn test_save_and_clear_user_email() {
        let scratch = scratch_dir();
        let dir = scratch.path().join("steeltrack");

        save_user_email(&dir, " detailer@example.com\n").unwrap();
        assert_eq!(
            read_user_email(&dir).unwrap().as_deref(),
            Some("detailer@example.com")
        );

        clear_user_email(&dir).unwrap();
        clear_user_email(&dir).unwrap();
        assert_eq!(read_user_email(&dir).unwrap(), None);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::no_at("detailer")]
    fn test_save_invalid_user_email(#[case] email: &str) {
        let scratch = scratch_dir();

        assert!(save_user_email(scratch.path(), email).is_err());
        assert_eq!(read_user_email(scratch.path()).unwrap(), None);
    }

    #[rstest]
    #[case::signed_in(Some("detailer@example.com"), true)]
    #[case::signed_out(None, false)]
    fn test_require_user_email(#[case] email: Option<&str>, #[case] expected: bool) {
        let config = Config {
            api_url: super::DEFAULT_API_URL.to_string(),
            data_dir: std::path::PathBuf::from("/nonexistent/steeltrack"),
            user_email: email.map(str::to_string),
        };

        assert_eq!(config.require_user_email().is_ok(), expected);
    }
}
