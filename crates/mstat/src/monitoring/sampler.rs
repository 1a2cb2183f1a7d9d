//! Background memory sampler
//!
//! `Sampler::start` takes a baseline sample synchronously, then moves the
//! series onto a dedicated thread that samples once per tick. The only way
//! to talk to that thread is its mailbox, which accepts a single `Stop`
//! request; the reply carries the finished series by value. No other thread
//! ever holds a reference to the series while it is being appended to.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use mstat_cgroup::ResourceContext;
use mstat_core::{MstatError, Result};

use crate::config::SamplerConfig;
use crate::monitoring::clock::Clock;
use crate::monitoring::series::{Record, SeriesSnapshot};

enum Request {
    Stop { reply: Sender<SeriesSnapshot> },
}

/// The sampler's data and per-tick logic, free of any threading.
///
/// Once [`SamplerState::stop`] has handed the series out, further ticks are
/// no-ops.
pub struct SamplerState<R: ResourceContext, C: Clock> {
    context: Arc<R>,
    clock: C,
    keep_raw_stats: bool,
    series: Option<SeriesSnapshot>,
}

impl<R: ResourceContext, C: Clock> SamplerState<R, C> {
    pub fn new(context: Arc<R>, clock: C, keep_raw_stats: bool) -> Self {
        Self {
            context,
            clock,
            keep_raw_stats,
            series: Some(SeriesSnapshot::default()),
        }
    }

    /// Take one sample and append it
    pub fn sample(&mut self) -> Result<()> {
        let Some(series) = self.series.as_mut() else {
            return Ok(());
        };

        let timestamp = self.clock.now();
        let stats = self.context.memory_stats()?;
        series.samples.push(Record {
            timestamp,
            rss: stats.usage,
            kernel_memory: stats.kernel,
        });
        if self.keep_raw_stats {
            series.raw_stats.push(stats);
        }
        Ok(())
    }

    /// Sample on a timer tick; a failed read is logged and skipped
    pub fn tick(&mut self) {
        if let Err(e) = self.sample() {
            warn!("mstat: sample of {} skipped: {}", self.context.name(), e);
        }
    }

    /// Hand the series out. Later calls return an empty series.
    pub fn stop(&mut self) -> SeriesSnapshot {
        self.series.take().unwrap_or_default()
    }

    pub fn is_stopped(&self) -> bool {
        self.series.is_none()
    }

    /// Number of records so far
    pub fn len(&self) -> usize {
        self.series.as_ref().map_or(0, SeriesSnapshot::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to a running sampler thread
pub struct Sampler {
    mailbox: SyncSender<Request>,
    handle: Option<JoinHandle<()>>,
}

impl Sampler {
    /// Validate the interval, take the baseline sample, and start ticking.
    ///
    /// A failed baseline is an error: without it the series has no t=0.
    pub fn start<R: ResourceContext, C: Clock>(
        context: Arc<R>,
        config: &SamplerConfig,
        clock: C,
    ) -> Result<Self> {
        let interval = config.interval()?;

        let mut state = SamplerState::new(context, clock, config.keep_raw_stats);
        state.sample()?;

        let (mailbox, requests) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name("mstat-sampler".to_string())
            .spawn(move || run(state, requests, interval))
            .map_err(|e| MstatError::Spawn(format!("sampler thread: {}", e)))?;

        debug!("sampler started at {:?} intervals", interval);
        Ok(Self {
            mailbox,
            handle: Some(handle),
        })
    }

    /// Stop sampling and take ownership of everything recorded.
    ///
    /// Always returns; if the sampler thread is gone the series it held is
    /// lost and an empty one is returned.
    pub fn shutdown(mut self) -> SeriesSnapshot {
        let (reply, response) = mpsc::channel();
        let series = match self.mailbox.send(Request::Stop { reply }) {
            Ok(()) => response.recv().unwrap_or_else(|_| {
                error!("sampler thread exited without replying");
                SeriesSnapshot::default()
            }),
            Err(_) => {
                error!("sampler thread is gone");
                SeriesSnapshot::default()
            }
        };
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("sampler thread panicked");
        }
        debug!("sampler stopped with {} samples", series.len());
        series
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let (reply, _) = mpsc::channel();
            let _ = self.mailbox.send(Request::Stop { reply });
            let _ = handle.join();
        }
    }
}

/// Sampler thread: wait for either the next tick or a stop request
fn run<R: ResourceContext, C: Clock>(
    mut state: SamplerState<R, C>,
    requests: Receiver<Request>,
    interval: Duration,
) {
    let mut deadline = Instant::now() + interval;
    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match requests.recv_timeout(timeout) {
            Ok(Request::Stop { reply }) => {
                let _ = reply.send(state.stop());
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                state.tick();
                deadline = next_deadline(deadline, interval, Instant::now());
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("sampler handle dropped, exiting");
                return;
            }
        }
    }
}

/// Next tick strictly after `now` on the fixed grid `previous + k * interval`.
/// Ticks missed while sampling was slow are dropped rather than bunched.
fn next_deadline(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = previous + interval;
    while next <= now {
        next += interval;
    }
    next
}
