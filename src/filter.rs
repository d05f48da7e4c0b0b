use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::ClusterRecord;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

pub trait Named {
    fn name(&self) -> &str;
}

impl Named for ClusterRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive substring match on names. An empty query keeps everything.
pub fn filter_by_name<T: Named + Clone>(items: &[T], query: &str) -> Vec<T> {
    let needle = query.to_lowercase();
    items
        .iter()
        .filter(|item| item.name().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Search box state: keystrokes are held until the query has been quiet for
/// the configured period, then the visible list is re-derived from the full
/// source list.
#[derive(Debug)]
pub struct DebouncedFilter<T> {
    source: Vec<T>,
    visible: Vec<T>,
    query: String,
    pending: Option<(String, Instant)>,
    quiet_period: Duration,
    recomputations: u64,
}

impl<T: Named + Clone> DebouncedFilter<T> {
    pub fn new(source: Vec<T>) -> Self {
        Self::with_quiet_period(source, DEFAULT_QUIET_PERIOD)
    }

    pub fn with_quiet_period(source: Vec<T>, quiet_period: Duration) -> Self {
        let mut filter = Self {
            visible: Vec::new(),
            source,
            query: String::new(),
            pending: None,
            quiet_period,
            recomputations: 0,
        };
        filter.recompute();
        filter
    }

    pub fn visible(&self) -> &[T] {
        &self.visible
    }

    /// The query currently applied to the visible list.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn set_source(&mut self, source: Vec<T>) {
        self.source = source;
        self.recompute();
    }

    /// Records a keystroke; replaces any pending query and restarts the timer.
    pub fn input(&mut self, query: impl Into<String>, now: Instant) {
        self.pending = Some((query.into(), now));
    }

    /// When the pending query will be applied, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.quiet_period)
    }

    /// Applies the pending query once its quiet period has elapsed. Returns
    /// whether the visible list was recomputed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                if let Some((query, _)) = self.pending.take() {
                    self.query = query;
                }
                self.recompute();
                true
            }
            _ => false,
        }
    }

    fn recompute(&mut self) {
        self.visible = filter_by_name(&self.source, &self.query);
        self.recomputations += 1;
        debug!(query = %self.query, matches = self.visible.len(), "Filter recomputed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComputeType;

    fn clusters() -> Vec<ClusterRecord> {
        [
            "production-api-cluster",
            "production-web-cluster",
            "staging-cluster",
            "analytics-cluster",
        ]
        .iter()
        .map(|name| ClusterRecord {
            name: name.to_string(),
            active_services: 1,
            running_services: 1,
            closed_services: 0,
            compute_type: ComputeType::Fargate,
        })
        .collect()
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let matched = filter_by_name(&clusters(), "PRODUCTION");
        assert_eq!(matched.len(), 2);
        assert_eq!(filter_by_name(&clusters(), "").len(), 4);
        assert!(filter_by_name(&clusters(), "gpu").is_empty());
    }

    #[test]
    fn rapid_keystrokes_recompute_once_with_final_query() {
        let start = Instant::now();
        let mut filter = DebouncedFilter::new(clusters());
        let baseline = filter.recomputations();

        filter.input("p", start);
        assert!(!filter.poll(start + Duration::from_millis(100)));
        filter.input("pr", start + Duration::from_millis(100));
        assert!(!filter.poll(start + Duration::from_millis(250)));
        filter.input("stag", start + Duration::from_millis(250));
        assert!(!filter.poll(start + Duration::from_millis(500)));

        assert!(filter.poll(start + Duration::from_millis(550)));
        assert!(!filter.poll(start + Duration::from_millis(900)));

        assert_eq!(filter.recomputations(), baseline + 1);
        assert_eq!(filter.query(), "stag");
        assert_eq!(filter.visible().len(), 1);
        assert_eq!(filter.visible()[0].name, "staging-cluster");
    }

    #[test]
    fn new_source_is_filtered_with_applied_query() {
        let start = Instant::now();
        let mut filter = DebouncedFilter::new(clusters());
        filter.input("cluster", start);
        filter.poll(start + DEFAULT_QUIET_PERIOD);
        assert_eq!(filter.visible().len(), 4);

        let mut fewer = clusters();
        fewer.truncate(1);
        filter.set_source(fewer);
        assert_eq!(filter.visible().len(), 1);
        assert_eq!(filter.query(), "cluster");
    }
}
