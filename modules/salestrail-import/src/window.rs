use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Bounds for the CRM `closed_at` filter, built from CLI flags.
/// `--days=N` takes precedence over explicit dates; no flags means all time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ImportWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>, days: Option<i64>) -> Self {
        if let Some(days) = days {
            let to = Utc::now();
            return Self {
                from: Some(to - Duration::days(days)),
                to: Some(to),
            };
        }
        Self {
            from: from.map(start_of_day),
            to: to.map(start_of_day),
        }
    }

    pub fn closed_from(&self) -> Option<i64> {
        self.from.map(|t| t.timestamp())
    }

    pub fn closed_to(&self) -> Option<i64> {
        self.to.map(|t| t.timestamp())
    }

    pub fn describe(&self) -> String {
        match (self.from, self.to) {
            (None, None) => "all time".to_string(),
            (from, to) => format!(
                "{} → {}",
                from.map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "beginning".to_string()),
                to.map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "now".to_string()),
            ),
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
}
