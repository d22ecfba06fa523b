use crate::extractor::{DetailOutcome, OutcomeStatus};
use std::time::{Duration, Instant};

/// Running tally of a detail batch.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub extracted: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub images_saved: usize,
    pub images_failed: usize,
    pub collisions: usize,
    pub cancelled: bool,
    pub current: Option<String>,
    pub start_time: Instant,
    pub outcomes: Vec<DetailOutcome>,
    pub errors: Vec<String>,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            extracted: 0,
            degraded: 0,
            failed: 0,
            skipped: 0,
            images_saved: 0,
            images_failed: 0,
            collisions: 0,
            cancelled: false,
            current: None,
            start_time: Instant::now(),
            outcomes: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: DetailOutcome) {
        self.processed += 1;

        match outcome.status {
            OutcomeStatus::Extracted => self.extracted += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            status if status.is_degraded() => self.degraded += 1,
            _ => self.failed += 1,
        }

        self.images_saved += outcome.images.len();
        self.images_failed += outcome.image_errors.len();

        if let Some(error) = &outcome.error {
            self.add_error(format!("{}: {}", outcome.name, error));
        }
        for error in &outcome.image_errors {
            self.add_error(format!("{}: {}", outcome.name, error));
        }

        self.current = Some(outcome.name.clone());
        self.outcomes.push(outcome);
    }

    pub fn add_error<S: Into<String>>(&mut self, error: S) {
        self.errors.push(error.into());
    }

    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.processed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn estimated_remaining(&self) -> Duration {
        if self.processed == 0 || self.processed >= self.total {
            return Duration::from_secs(0);
        }

        let per_entity = self.elapsed().as_secs_f64() / self.processed as f64;
        Duration::from_secs_f64(per_entity * (self.total - self.processed) as f64)
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
