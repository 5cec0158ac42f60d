use std::future::Future;

use anyhow::Result;
use log::info;
use tokio::pin;

use crate::console::ConsolePresenter;
use crate::session_store::{refresh_ticker, SessionStore};
use crate::tracking_api::TrackingRepository;

pub struct WatchCommand<'a, T: TrackingRepository> {
    store: &'a SessionStore<T>,
}

impl<'a, T: TrackingRepository> WatchCommand<'a, T> {
    /// 新しい`WatchCommand`を返す。
    pub fn new(store: &'a SessionStore<T>) -> Self {
        Self { store }
    }

    /// `watch`サブコマンドの処理を行う。
    ///
    /// マウント時にアクティブなセッションと照合した後、`shutdown`が完了するまで
    /// 計測中は1秒ごとに経過時間を表示し直す。
    pub async fn run<P, F>(&self, presenter: &mut P, shutdown: F) -> Result<()>
    where
        P: ConsolePresenter,
        F: Future<Output = ()>,
    {
        let mut view = self.store.mount().await;
        let mut ticker = refresh_ticker();
        pin!(shutdown);

        presenter.show_live_timer(&view.state())?;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                state = view.next_refresh(&mut ticker) => presenter.show_live_timer(&state?)?,
            }
        }
        info!("Stopped watching");

        Ok(())
    }
}
