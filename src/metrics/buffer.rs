//! Aggregation buffer
//!
//! Concurrent map from aggregation key to aggregator, double-buffered by
//! generation:
//!
//! ```text
//! Producer 1 ──┐  read lock   ┌──────────── Generation N ────────────┐
//! Producer 2 ──┤─────────────►│ shard 0 │ shard 1 │ ... │ shard 15  │
//! Producer 3 ──┘              └──────────────────────────────────────┘
//!                                              │ drain: write lock,
//!                                              ▼ swap in N+1
//!                              flush every aggregator of N, outside locks
//! ```
//!
//! Producers hold the generation read lock only while they touch their
//! shard, so they never block each other except on the same shard. A drain
//! takes the write lock just long enough to swap generations. It waits for
//! in-flight records to finish, so nothing recorded before the swap is lost
//! and nothing recorded after it leaks into the drained generation.

use std::hash::BuildHasher;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::aggregator::{Aggregator, SeriesIdentity};
use super::histogram::HistogramOptions;
use super::key_encoder::{AggregationKey, MetricKeyEncoder};
use super::types::{MetricKind, Series};

const NUM_SHARDS: usize = 16;

/// Static settings applied at the buffer boundary
#[derive(Debug, Clone)]
pub struct BufferSettings {
    /// Reported as the `host` resource of every series
    pub host: String,
    /// Concatenated in front of every metric name at record time
    pub prefix: Option<String>,
    /// Appended to every series' tags at drain time
    pub default_tags: Vec<String>,
    /// Advisory ceiling on live keys; exceeding it only logs
    pub max_buffer_size: usize,
    /// Used by histograms recorded without explicit options
    pub histogram: HistogramOptions,
}

impl Default for BufferSettings {
    fn default() -> Self {
        BufferSettings {
            host: "localhost".to_string(),
            prefix: None,
            default_tags: Vec::new(),
            max_buffer_size: 10_000,
            histogram: HistogramOptions::default(),
        }
    }
}

type Shard = Mutex<AHashMap<AggregationKey, Aggregator>>;

/// One generation of live aggregators
struct Generation {
    id: u64,
    shards: Box<[Shard]>,
    len: AtomicUsize,
    overflow_reported: AtomicBool,
}

impl Generation {
    fn new(id: u64) -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| Mutex::new(AHashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Generation {
            id,
            shards,
            len: AtomicUsize::new(0),
            overflow_reported: AtomicBool::new(false),
        }
    }
}

/// Buffers measurements and aggregates them per key until drained
pub struct AggregationBuffer {
    generation: RwLock<Generation>,
    settings: BufferSettings,
    host: Arc<str>,
    default_histogram: Arc<HistogramOptions>,
    hasher: ahash::RandomState,
}

impl AggregationBuffer {
    pub fn new(settings: BufferSettings) -> Self {
        let host: Arc<str> = Arc::from(settings.host.as_str());
        let default_histogram = Arc::new(settings.histogram.clone());
        AggregationBuffer {
            generation: RwLock::new(Generation::new(0)),
            settings,
            host,
            default_histogram,
            hasher: ahash::RandomState::new(),
        }
    }

    pub fn settings(&self) -> &BufferSettings {
        &self.settings
    }

    /// Record one measurement
    ///
    /// Creates the aggregator for a new key, or folds the value into the
    /// existing one. When a key already exists under a different kind the
    /// first kind wins. Never fails; exceeding `max_buffer_size` is logged
    /// once per generation and the measurement is still kept.
    pub fn record<S: AsRef<str>>(
        &self,
        kind: MetricKind,
        name: &str,
        value: f64,
        tags: &[S],
        timestamp: SystemTime,
        histogram: Option<&Arc<HistogramOptions>>,
    ) {
        let metric = MetricKeyEncoder::prefixed_name(self.settings.prefix.as_deref(), name);
        let key = MetricKeyEncoder::encode(&metric, tags);
        let shard_idx = self.shard_index(&key);

        let generation = self.generation.read();
        let live_keys = {
            let mut shard = generation.shards[shard_idx].lock();
            match shard.get_mut(key.as_str()) {
                Some(aggregator) => {
                    if aggregator.kind() != kind {
                        debug!(
                            key = %key,
                            existing = %aggregator.kind(),
                            recorded = %kind,
                            "kind mismatch for live key, keeping existing aggregator"
                        );
                    }
                    aggregator.accumulate(value, timestamp);
                    return;
                }
                None => {
                    let identity = SeriesIdentity {
                        metric,
                        tags: tags.iter().map(|t| t.as_ref().to_string()).collect(),
                        host: Arc::clone(&self.host),
                    };
                    let options = histogram.unwrap_or(&self.default_histogram);
                    let mut aggregator = Aggregator::new(kind, identity, Arc::clone(options));
                    aggregator.accumulate(value, timestamp);
                    shard.insert(key, aggregator);
                }
            }
            generation.len.fetch_add(1, Ordering::Relaxed) + 1
        };

        if live_keys > self.settings.max_buffer_size
            && !generation.overflow_reported.swap(true, Ordering::Relaxed)
        {
            warn!(
                live_keys,
                max_buffer_size = self.settings.max_buffer_size,
                generation = generation.id,
                "metrics buffer above advisory size; consider a shorter flush interval"
            );
        }
    }

    /// Number of live aggregation keys in the current generation
    pub fn len(&self) -> usize {
        self.generation.read().len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the live key count is above the advisory ceiling
    pub fn is_over_capacity(&self) -> bool {
        self.len() > self.settings.max_buffer_size
    }

    /// Current generation id; increases by one per drain
    pub fn generation_id(&self) -> u64 {
        self.generation.read().id
    }

    /// Swap in a fresh generation and flush the old one
    ///
    /// Series are ordered by aggregation key. Default tags are appended
    /// here, after the record-time tags. A second drain with no records in
    /// between returns an empty list.
    pub fn drain(&self) -> Vec<Series> {
        let drained = {
            let mut current = self.generation.write();
            let next = Generation::new(current.id.wrapping_add(1));
            std::mem::replace(&mut *current, next)
        };

        let mut aggregators: Vec<(AggregationKey, Aggregator)> =
            Vec::with_capacity(drained.len.load(Ordering::Relaxed));
        for shard in drained.shards.into_vec() {
            aggregators.extend(shard.into_inner());
        }
        aggregators.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut series = Vec::with_capacity(aggregators.len());
        for (_, mut aggregator) in aggregators {
            for mut s in aggregator.flush() {
                s.tags.extend(self.settings.default_tags.iter().cloned());
                series.push(s);
            }
        }

        debug!(
            generation = drained.id,
            series = series.len(),
            "drained metrics buffer"
        );
        series
    }

    #[inline]
    fn shard_index(&self, key: &AggregationKey) -> usize {
        let idx = (self.hasher.hash_one(key.as_str()) as usize) % NUM_SHARDS;
        debug_assert!(idx < NUM_SHARDS, "Hash produced invalid shard index");
        idx
    }
}

impl Default for AggregationBuffer {
    fn default() -> Self {
        Self::new(BufferSettings::default())
    }
}

impl std::fmt::Debug for AggregationBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationBuffer")
            .field("generation", &self.generation_id())
            .field("live_keys", &self.len())
            .field("settings", &self.settings)
            .finish()
    }
}
