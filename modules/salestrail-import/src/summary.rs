use std::collections::HashMap;

use chrono::NaiveDate;

use salestrail_common::UpsertOutcome;

#[derive(Debug, Default, Clone, Copy)]
pub struct Tally {
    pub count: u64,
    pub revenue: i64,
}

impl Tally {
    pub fn add(&mut self, revenue: i64) {
        self.count += 1;
        self.revenue += revenue;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PrepaidTally {
    pub prepaid: Tally,
    pub full: Tally,
}

#[derive(Debug)]
pub struct RecordError {
    pub deal_id: i64,
    pub error: String,
}

/// Accumulated counters for one import run, printed as the operator summary.
#[derive(Debug, Default)]
pub struct ImportStats {
    pub total_fetched: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub excluded: u64,
    pub by_pipeline: HashMap<i64, Tally>,
    pub by_targetologist: HashMap<String, Tally>,
    pub by_funnel: HashMap<String, Tally>,
    pub by_prepaid: PrepaidTally,
    pub by_date: HashMap<NaiveDate, Tally>,
    pub errors: Vec<RecordError>,
}

impl ImportStats {
    pub fn record_outcome(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Console report: totals plus revenue breakdowns, most recent 10 dates.
    pub fn print_summary(&self, title: &str) {
        let line = "=".repeat(64);
        println!("\n{line}");
        println!("{title}");
        println!("{line}\n");
        println!("Total fetched from CRM:    {}", self.total_fetched);
        println!("Inserted:                  {}", self.inserted);
        println!("Updated:                   {}", self.updated);
        println!("Skipped (no changes):      {}", self.skipped);
        if self.excluded > 0 {
            println!("Excluded (other product):  {}", self.excluded);
        }
        println!("Errors:                    {}", self.errors.len());

        if !self.by_pipeline.is_empty() {
            println!("\nBY PIPELINE:");
            for (pipeline, tally) in sorted_by_revenue(&self.by_pipeline) {
                println!(
                    "  {:<16} {} sales, {} KZT",
                    pipeline, tally.count, tally.revenue
                );
            }
        }

        if !self.by_targetologist.is_empty() {
            println!("\nBY TARGETOLOGIST:");
            for (name, tally) in sorted_by_revenue(&self.by_targetologist) {
                println!("  {:<16} {} sales, {} KZT", name, tally.count, tally.revenue);
            }
        }

        if !self.by_funnel.is_empty() {
            println!("\nBY FUNNEL:");
            for (funnel, tally) in sorted_by_revenue(&self.by_funnel) {
                println!("  {:<16} {} sales, {} KZT", funnel, tally.count, tally.revenue);
            }
        }

        let prepaid = self.by_prepaid;
        if prepaid.prepaid.count + prepaid.full.count > 0 {
            println!("\nBY PAYMENT TYPE:");
            println!(
                "  {:<16} {} sales, {} KZT",
                "prepaid", prepaid.prepaid.count, prepaid.prepaid.revenue
            );
            println!(
                "  {:<16} {} sales, {} KZT",
                "full", prepaid.full.count, prepaid.full.revenue
            );
        }

        if !self.by_date.is_empty() {
            println!("\nBY DATE (last 10 days):");
            let mut dates: Vec<_> = self.by_date.iter().collect();
            dates.sort_by(|a, b| b.0.cmp(a.0));
            for (date, tally) in dates.into_iter().take(10) {
                println!("  {date}       {} sales, {} KZT", tally.count, tally.revenue);
            }
        }

        if !self.errors.is_empty() {
            println!("\nERRORS:");
            for error in &self.errors {
                println!("  deal {}: {}", error.deal_id, error.error);
            }
        }

        println!("\n{line}\n");
    }
}

fn sorted_by_revenue<K: std::fmt::Display + Ord>(map: &HashMap<K, Tally>) -> Vec<(&K, &Tally)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| b.1.revenue.cmp(&a.1.revenue).then(a.0.cmp(b.0)));
    entries
}
