//! Periodic drivers for generation and processing
//!
//! Two independent tokio tasks:
//! - Processing: run an iteration, then sleep `processing.interval_secs`.
//!   The first iteration starts immediately.
//! - Generation: first cycle after `generation.interval_secs`, then every
//!   period.
//!
//! Neither loop ever exits on error; failures are logged and the next tick
//! runs as usual.

use crate::{config::Config, generator::Generator, processor::Processor};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Owns the two periodic loops
#[derive(Debug)]
pub struct Scheduler {
    processor: Arc<Processor>,
    generator: Option<Arc<Generator>>,
    processing_interval: Duration,
    generation_interval: Duration,
}

/// Handles of the spawned loops
#[derive(Debug)]
pub struct SchedulerHandles {
    /// Processing loop
    pub processing: JoinHandle<()>,
    /// Generation loop, absent when no generator is configured
    pub generation: Option<JoinHandle<()>>,
}

impl SchedulerHandles {
    /// Abort both loops and wait for them to unwind
    ///
    /// An in-flight confirmation wait is dropped; its record stays `Claimed`.
    pub async fn shutdown(self) {
        self.processing.abort();
        if let Some(generation) = &self.generation {
            generation.abort();
        }

        let _ = self.processing.await;
        if let Some(generation) = self.generation {
            let _ = generation.await;
        }
        info!("Scheduler stopped");
    }
}

impl Scheduler {
    /// Create a scheduler with intervals from configuration
    pub fn new(processor: Processor, generator: Option<Generator>, config: &Config) -> Self {
        Self::with_intervals(
            processor,
            generator,
            config.processing.interval(),
            config.generation.interval(),
        )
    }

    /// Create a scheduler with explicit intervals
    pub fn with_intervals(
        processor: Processor,
        generator: Option<Generator>,
        processing_interval: Duration,
        generation_interval: Duration,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            generator: generator.map(Arc::new),
            processing_interval,
            generation_interval,
        }
    }

    /// Spawn the loops onto the current runtime
    pub fn start(self) -> SchedulerHandles {
        info!(
            processing_interval_secs = self.processing_interval.as_secs(),
            generation_interval_secs = self.generation_interval.as_secs(),
            generation = self.generator.is_some(),
            "Starting scheduler"
        );

        let processing = tokio::spawn(processing_loop(
            self.processor,
            self.processing_interval,
        ));

        let generation = self.generator.map(|generator| {
            tokio::spawn(generation_loop(generator, self.generation_interval))
        });

        SchedulerHandles {
            processing,
            generation,
        }
    }
}

async fn processing_loop(processor: Arc<Processor>, pause: Duration) {
    loop {
        match processor.run_iteration().await {
            Ok(report) => debug!(?report, "Processing iteration finished"),
            Err(e) => warn!(error = %e, "Processing iteration aborted"),
        }

        tokio::time::sleep(pause).await;
    }
}

async fn generation_loop(generator: Arc<Generator>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = generator.run_once().await;
        debug!(?outcome, "Generation cycle finished");
    }
}
