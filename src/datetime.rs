use chrono::{DateTime, Utc};

/// 経過時間の計算に利用する現在時刻を取得する。
#[cfg(not(test))]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_clock::now;
