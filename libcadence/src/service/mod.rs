//! Service layer for Cadence
//!
//! A single facade, [`CadenceService`], wires the store, the platform
//! table, the generators and the scheduler together and exposes the manual
//! operations through two sub-services:
//!
//! - [`PostService`]: approve, publish-now, lookup and listing of Posts
//! - [`ScheduleService`]: today/weekly/monthly creation and toggling of Schedules
//!
//! Both binaries build on it: `cadence-queue` for the manual operations,
//! `cadence-send` for the scheduler.
//!
//! # Example
//!
//! ```no_run
//! use libcadence::service::CadenceService;
//!
//! # async fn example() -> libcadence::Result<()> {
//! let service = CadenceService::new().await?;
//!
//! let posted = service.posts().publish_now("alice", "post-id").await?;
//! println!("{:?}", posted.outcome);
//! # Ok(())
//! # }
//! ```

pub mod posts;
pub mod schedules;

pub use posts::{PostService, PublishResponse};
pub use schedules::{MonthlyRequest, ScheduleService, TodayRequest, TodayResponse};

use std::sync::Arc;

use crate::expander::RecurrenceExpander;
use crate::generator::Generators;
use crate::platforms::PlatformTable;
use crate::publisher::{Publisher, RetryPolicy};
use crate::scheduler::{Scheduler, SchedulerContext, SchedulerSettings};
use crate::{CadenceError, Config, Database, Result};

pub struct CadenceService {
    db: Database,
    config: Arc<Config>,
    posts: PostService,
    schedules: ScheduleService,
    scheduler: SchedulerContext,
}

impl CadenceService {
    /// Create a service from the configuration at the default location
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Open the database and build platform clients and generators from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the database cannot be opened or migrated
    /// - a configured platform client or generator cannot be built
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = config.database_path();
        let db_path = db_path.to_str().ok_or_else(|| {
            CadenceError::Config(crate::error::ConfigError::MissingField(
                "Invalid database path".to_string(),
            ))
        })?;
        let db = Database::new(db_path).await?;

        let platforms = PlatformTable::from_config(&config.platforms)?;
        let generators = Generators::from_config(config.generator.as_ref())?;
        Ok(Self::from_parts(db, platforms, generators, config))
    }

    /// Assemble a service from already built parts
    pub fn from_parts(
        db: Database,
        platforms: PlatformTable,
        generators: Generators,
        config: Config,
    ) -> Self {
        let config = Arc::new(config);
        let max_retries = config.scheduling.max_retries;
        let settings = SchedulerSettings::from(&config.scheduling);

        let publisher = Arc::new(Publisher::new(
            platforms,
            RetryPolicy::from_config(&config.publisher),
        ));
        let expander = Arc::new(RecurrenceExpander::new(
            db.clone(),
            Arc::clone(&generators.content),
            max_retries,
        ));

        let posts = PostService::new(db.clone(), Arc::clone(&publisher), settings.publish_lease);
        let schedules = ScheduleService::new(db.clone(), generators, max_retries);
        let scheduler = SchedulerContext::new(db.clone(), publisher, expander, settings);

        Self {
            db,
            config,
            posts,
            schedules,
            scheduler,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn posts(&self) -> &PostService {
        &self.posts
    }

    pub fn schedules(&self) -> &ScheduleService {
        &self.schedules
    }

    /// Context for running single passes without starting the background jobs
    pub fn scheduler_context(&self) -> &SchedulerContext {
        &self.scheduler
    }

    /// A stopped scheduler sharing this service's store and clients
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.scheduler.clone())
    }
}
