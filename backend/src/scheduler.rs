use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    calendar::Calendar,
    config::ScheduleSettings,
    models::Birthday,
    service::{BirthdayService, ServiceError},
};

/// Matches found by one reminder pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub today: Vec<Birthday>,
    pub tomorrow: Vec<Birthday>,
    pub next_week: Vec<Birthday>,
}

pub struct ReminderJob {
    service: Arc<BirthdayService>,
    calendar: Calendar,
}

impl ReminderJob {
    pub fn new(service: Arc<BirthdayService>, calendar: Calendar) -> Self {
        Self { service, calendar }
    }

    async fn due_in(&self, today: NaiveDate, days: u64) -> Result<Vec<Birthday>, ServiceError> {
        let out_of_range = |date: NaiveDate| {
            ServiceError::Invalid(format!(
                "{} is outside the {} calendar range",
                date, self.calendar
            ))
        };
        let target = today
            .checked_add_days(Days::new(days))
            .ok_or_else(|| out_of_range(today))?;
        let (month, day) = self
            .calendar
            .month_day(target)
            .ok_or_else(|| out_of_range(target))?;
        self.service.due_on(month, day).await
    }

    /// Looks up birthdays falling today, tomorrow and in seven days, logging each one.
    pub async fn run_for(&self, today: NaiveDate) -> Result<ReminderReport, ServiceError> {
        let report = ReminderReport {
            today: self.due_in(today, 0).await?,
            tomorrow: self.due_in(today, 1).await?,
            next_week: self.due_in(today, 7).await?,
        };

        for birthday in &report.today {
            log::info!("Today is {}'s birthday!", birthday.name);
        }
        for birthday in &report.tomorrow {
            log::info!("Tomorrow is {}'s birthday!", birthday.name);
        }
        for birthday in &report.next_week {
            log::info!("Next week is {}'s birthday!", birthday.name);
        }

        Ok(report)
    }

    async fn run_today(&self) {
        let today = Local::now().date_naive();
        match self.run_for(today).await {
            Ok(report) => log::debug!(
                "Birthday check for {}: {} today, {} tomorrow, {} next week",
                today,
                report.today.len(),
                report.tomorrow.len(),
                report.next_week.len()
            ),
            Err(e) => log::error!("Error checking birthdays: {}", e),
        }
    }
}

/// Next instant strictly after `now` whose wall-clock time is `at`.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    loop {
        let candidate = NaiveDateTime::new(date, at);
        // Skipped local times (DST gaps) fall through to the following day.
        if let Some(run) = tz.from_local_datetime(&candidate).earliest() {
            if run > *now {
                return run;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => return now.clone(),
        };
    }
}

/// Spawns the daily reminder loop; it exits once `cancel` fires.
pub fn spawn(
    job: ReminderJob,
    schedule: ScheduleSettings,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!(
            "Birthday reminders scheduled daily at {}",
            schedule.time.format("%H:%M")
        );

        if schedule.run_on_startup {
            job.run_today().await;
        }

        loop {
            let now = Local::now();
            let wait = (next_run_after(&now, schedule.time) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            log::debug!("Next birthday check in {}s", wait.as_secs());

            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("Birthday reminder scheduler stopped");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    job.run_today().await;
                }
            }
        }
    })
}
