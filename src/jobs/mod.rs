//! Daily job generation.
//!
//! Turns every vehicle that is due on the target day into a [`Job`]. One
//! run shares one schedule id and writes its jobs in a single bulk insert;
//! the store skips jobs that already exist for the same vehicle and day, so
//! re-running a day is harmless.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::core::{
    Building, Customer, EngineError, Job, JobStatus, SCHEDULER_COUNTER, Vehicle, service_date,
};
use crate::schedule::{ScheduleEvaluator, ServiceWindow};
use crate::store::{BuildingStore, CounterService, CustomerFilter, CustomerStore, JobStore};

/// Which day a run schedules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Tomorrow, or today for buildings that schedule same-day.
    Relative { today: NaiveDate, tomorrow: NaiveDate },
    /// One explicit day for every customer.
    Fixed(NaiveDate),
}

/// Counts from one job generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunSummary {
    pub schedule_id: u64,
    /// Day scheduled for customers without same-day scheduling.
    pub target_date: Option<NaiveDate>,
    /// Day the same-day jobs of this run were scheduled for, when there
    /// were any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_day_date: Option<NaiveDate>,
    /// Jobs written.
    pub generated: usize,
    /// Jobs the store already had for the same vehicle and day.
    pub duplicates: usize,
    /// Customers whose building could not be resolved.
    pub customers_skipped: usize,
    pub vehicles_inactive: usize,
    pub not_started: usize,
    pub not_due: usize,
    /// Jobs scheduled for today because the building asked for it.
    pub immediate: usize,
}

/// Generates the jobs for one day.
///
/// ```
/// use washcycle::jobs::JobGenerator;
/// use washcycle::memstore::MemoryStore;
/// use chrono::NaiveDate;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let summary = JobGenerator::new(store).run_for_date(day).await?;
/// assert_eq!(summary.generated, 0);
/// # Ok(())
/// # }
/// ```
pub struct JobGenerator<S> {
    store: S,
    evaluator: ScheduleEvaluator,
    created_by: String,
}

impl<S> JobGenerator<S>
where
    S: CustomerStore + BuildingStore + JobStore + CounterService,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            evaluator: ScheduleEvaluator::jobs(),
            created_by: "Cron Scheduler".to_string(),
        }
    }

    /// Actor recorded as `created_by` on generated jobs.
    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    /// Unattended run at `now`: schedules tomorrow, or today for buildings
    /// with same-day scheduling.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobRunSummary, EngineError> {
        let today = service_date(now);
        let tomorrow = today
            .succ_opt()
            .ok_or_else(|| EngineError::Period(format!("no day after {today}")))?;
        self.generate(Target::Relative { today, tomorrow }).await
    }

    /// Schedule every customer for `date`, ignoring same-day settings.
    pub async fn run_for_date(&self, date: NaiveDate) -> Result<JobRunSummary, EngineError> {
        self.generate(Target::Fixed(date)).await
    }

    async fn generate(&self, target: Target) -> Result<JobRunSummary, EngineError> {
        let customers = self.store.customers(&CustomerFilter::with_building()).await?;
        let schedule_id = self.store.next_id(SCHEDULER_COUNTER).await?;

        let mut summary = JobRunSummary {
            schedule_id,
            target_date: Some(match target {
                Target::Relative { tomorrow, .. } => tomorrow,
                Target::Fixed(date) => date,
            }),
            ..JobRunSummary::default()
        };
        info!(
            "Generating jobs: schedule {} for {} customers",
            schedule_id,
            customers.len()
        );

        let mut buildings: HashMap<String, Option<Building>> = HashMap::new();
        let mut jobs = Vec::new();

        for customer in &customers {
            let Some(building_id) = customer.building_ref() else {
                continue;
            };
            let Some(building) = self.resolve_building(&mut buildings, building_id).await else {
                warn!(
                    "Skipping customer {} ({}): building {} could not be resolved",
                    customer.id,
                    customer.display_name(),
                    building_id
                );
                summary.customers_skipped += 1;
                continue;
            };

            let (date, immediate) = match target {
                Target::Fixed(date) => (date, false),
                Target::Relative { today, .. } if building.schedule_today => (today, true),
                Target::Relative { tomorrow, .. } => (tomorrow, false),
            };

            for vehicle in &customer.vehicles {
                match self.evaluator.window(vehicle, date) {
                    ServiceWindow::Deactivated => {
                        summary.vehicles_inactive += 1;
                        continue;
                    }
                    ServiceWindow::NotStarted => {
                        summary.not_started += 1;
                        continue;
                    }
                    ServiceWindow::Active => {}
                }
                if !self.evaluator.matches_recurrence(vehicle, date) {
                    debug!("Vehicle {} not due on {}", vehicle.id, date);
                    summary.not_due += 1;
                    continue;
                }

                jobs.push(self.job(schedule_id, customer, &building, vehicle, date, immediate));
            }
        }

        if jobs.is_empty() {
            info!("No jobs due for schedule {}", schedule_id);
            return Ok(summary);
        }

        let scheduled_today = jobs.iter().filter(|j| j.immediate).count();
        let report = self.store.insert_jobs(jobs).await?;
        summary.generated = report.inserted;
        summary.duplicates = report.duplicates;
        summary.immediate = scheduled_today;
        if let Target::Relative { today, .. } = target {
            summary.same_day_date = (scheduled_today > 0).then_some(today);
        }

        info!(
            "Schedule {}: {} jobs created ({} same-day), {} already existed",
            schedule_id, summary.generated, summary.immediate, summary.duplicates
        );
        Ok(summary)
    }

    /// Look a building up once per run. Lookup failures count as unresolved.
    async fn resolve_building(
        &self,
        cache: &mut HashMap<String, Option<Building>>,
        id: &str,
    ) -> Option<Building> {
        if let Some(cached) = cache.get(id) {
            return cached.clone();
        }
        let found = match self.store.building(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Building lookup {} failed: {}", id, e);
                None
            }
        };
        cache.insert(id.to_string(), found.clone());
        found
    }

    fn job(
        &self,
        schedule_id: u64,
        customer: &Customer,
        building: &Building,
        vehicle: &Vehicle,
        date: NaiveDate,
        immediate: bool,
    ) -> Job {
        Job {
            schedule_id,
            customer: customer.id.clone(),
            vehicle: vehicle.id.clone(),
            building: building.id.clone(),
            location: customer.location.clone(),
            assigned_date: date,
            worker: vehicle.assigned_worker().map(str::to_string),
            status: JobStatus::Pending,
            completed_date: None,
            created_by: self.created_by.clone(),
            immediate,
            is_deleted: false,
        }
    }
}
