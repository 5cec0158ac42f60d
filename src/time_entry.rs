use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// バックエンドが記録する1回分の作業セッション。
///
/// `end_time`と`duration_seconds`は計測中は`None`となる。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    pub project_name: String,
    pub user_email: String,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    pub is_active: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// `now`時点での経過秒数を返す。
    ///
    /// 開始時刻から毎回計算し直すため、累積誤差は発生しない。
    /// 時計のずれで開始時刻が未来になっている場合は0を返す。
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time)
            .num_milliseconds()
            .div_euclid(1000)
            .max(0)
    }
}

/// プロジェクトとユーザーの組に対する集計結果。
///
/// 集計はすべてサーバー側で行われる。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeTrackingSummary {
    pub project_name: String,
    pub total_hours: f64,
    #[serde(default)]
    pub active_session: Option<TimeEntry>,
    #[serde(default)]
    pub recent_entries: Vec<TimeEntry>,
}

/// タイムスタンプのシリアライズ形式。
///
/// RFC 3339に加えて、タイムゾーンを持たないISO 8601形式も受け付ける。
/// タイムゾーンがない場合はUTCとして扱う。
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
            return Ok(datetime.to_utc());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// テスト用にダミーのTimeEntryを作成する。
#[cfg(test)]
pub fn dummy_entry(id: i64, project_name: &str, start_time: DateTime<Utc>) -> TimeEntry {
    TimeEntry {
        id,
        project_name: project_name.to_string(),
        user_email: "detailer@example.com".to_string(),
        start_time,
        end_time: None,
        duration_seconds: None,
        is_active: true,
        created_at: start_time,
        updated_at: start_time,
    }
}
