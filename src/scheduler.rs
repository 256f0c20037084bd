//! Sync loop.
//!
//! Runs a cycle on start and then on every interval tick. A cycle visits the
//! feeds in random order, one at a time, and delivers each feed's pending
//! items oldest first. SIGTERM/SIGINT let the item in flight finish and stop
//! the loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::app::{AppContext, Result};
use crate::config::duration::format_interval;
use crate::domain::{DeliveryOutcome, Feed};
use crate::messenger::Notifier;
use crate::publisher::ItemPublisher;
use crate::source::FeedDiffEngine;
use crate::store::CursorStore;

/// Cooperative stop signal shared between the signal listener and the loop.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger` has been called.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

/// Reports the signal to the operator, then trips `shutdown`.
pub fn listen_for_signals(shutdown: Shutdown, notifier: Notifier) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = wait_for_signal().await;
        info!("Received {}, stopping after the current item", name);
        notifier
            .notify(&format!("tubechan stopping ({})", name))
            .await;
        shutdown.trigger();
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!("Cannot install signal handlers ({}), falling back to ctrl-c", e);
            wait_for_ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    "ctrl-c"
}

/// Tally of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds: usize,
    pub suspended: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub deferred: usize,
    pub failed: usize,
    pub feed_errors: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::SkippedPermanently(_) => self.skipped += 1,
            DeliveryOutcome::SkippedTransiently(_) => self.deferred += 1,
            DeliveryOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} feeds ({} suspended): {} delivered, {} skipped, {} deferred, {} failed, {} feed errors ({:.1}s)",
            self.feeds,
            self.suspended,
            self.delivered,
            self.skipped,
            self.deferred,
            self.failed,
            self.feed_errors,
            self.elapsed.as_secs_f64()
        )
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub item_interval: Duration,
    pub burst_threshold: usize,
}

struct FeedSlot {
    feed: Feed,
    restored: bool,
    /// Set after a configuration error; the feed is left alone until restart.
    disabled: bool,
}

/// Everything a feed sync needs except the feed itself.
struct FeedWorker {
    diff: FeedDiffEngine,
    publisher: ItemPublisher,
    store: Arc<dyn CursorStore + Send + Sync>,
    notifier: Notifier,
    item_interval: Duration,
    burst_threshold: usize,
    shutdown: Shutdown,
}

pub struct ChannelScheduler {
    feeds: Vec<FeedSlot>,
    worker: FeedWorker,
    interval: Duration,
    shutdown: Shutdown,
}

impl ChannelScheduler {
    pub fn new(
        feeds: Vec<Feed>,
        diff: FeedDiffEngine,
        publisher: ItemPublisher,
        store: Arc<dyn CursorStore + Send + Sync>,
        notifier: Notifier,
        settings: SchedulerSettings,
        shutdown: Shutdown,
    ) -> Self {
        let feeds = feeds
            .into_iter()
            .map(|feed| FeedSlot {
                feed,
                restored: false,
                disabled: false,
            })
            .collect();

        Self {
            feeds,
            worker: FeedWorker {
                diff,
                publisher,
                store,
                notifier,
                item_interval: settings.item_interval,
                burst_threshold: settings.burst_threshold,
                shutdown: shutdown.clone(),
            },
            interval: settings.interval,
            shutdown,
        }
    }

    pub fn from_context(ctx: &AppContext, shutdown: Shutdown) -> Result<Self> {
        let config = &ctx.config;
        let settings = SchedulerSettings {
            interval: config.interval,
            item_interval: config.item_interval,
            burst_threshold: config.burst_threshold,
        };

        Ok(Self::new(
            ctx.feeds()?,
            ctx.diff_engine(),
            ctx.publisher(),
            ctx.store.clone(),
            ctx.notifier.clone(),
            settings,
            shutdown,
        ))
    }

    /// Current view of the feed table.
    pub fn feeds(&self) -> impl Iterator<Item = &Feed> {
        self.feeds.iter().map(|slot| &slot.feed)
    }

    /// Cycle immediately, then on every tick until shut down.
    pub async fn run(&mut self) {
        info!(
            "Scheduler started: {} feeds, interval {}",
            self.feeds.len(),
            format_interval(self.interval)
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                _ = self.shutdown.wait() => break,
            }
            if self.shutdown.is_triggered() {
                break;
            }
            self.run_cycle().await;
        }

        info!("Scheduler stopped");
    }

    /// One pass over all feeds.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport {
            feeds: self.feeds.len(),
            ..Default::default()
        };

        let mut order: Vec<usize> = (0..self.feeds.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        for index in order {
            if self.shutdown.is_triggered() {
                info!("Shutdown requested, skipping remaining feeds");
                break;
            }

            let slot = &mut self.feeds[index];
            if slot.feed.options.suspended {
                debug!(feed = %slot.feed.display_title(), "suspended");
                report.suspended += 1;
                continue;
            }
            if slot.disabled {
                continue;
            }

            if let Err(e) = self.worker.sync(slot, &mut report).await {
                report.feed_errors += 1;
                let label = slot.feed.display_title().to_string();
                error!(feed = %label, "Feed sync failed: {}", e);

                if e.is_configuration() {
                    slot.disabled = true;
                    self.worker
                        .notifier
                        .notify(&format!("{}: disabled until restart: {}", label, e))
                        .await;
                } else {
                    self.worker
                        .notifier
                        .notify(&format!("{}: {}", label, e))
                        .await;
                }
            }
        }

        report.elapsed = started.elapsed();
        info!("Cycle complete: {}", report);
        report
    }
}

impl FeedWorker {
    /// Pick up the persisted cursor and playlist. The newer of the stored and
    /// configured cursor wins.
    async fn restore(&self, feed: &mut Feed) -> Result<()> {
        if let Some(state) = self.store.get(&feed.id).await? {
            if state.cursor > feed.cursor {
                feed.cursor = state.cursor;
            }
            if feed.playlist_id.is_none() {
                feed.playlist_id = state.playlist_id;
            }
        }
        debug!(feed = %feed.display_title(), cursor = %feed.cursor, "state restored");
        Ok(())
    }

    async fn sync(&self, slot: &mut FeedSlot, report: &mut CycleReport) -> Result<()> {
        if !slot.restored {
            self.restore(&mut slot.feed).await?;
            slot.restored = true;
        }

        let feed = &mut slot.feed;
        let pending = self.diff.pending(feed).await?;
        if pending.items.is_empty() {
            debug!(feed = %feed.display_title(), "up to date");
            return Ok(());
        }

        let count = pending.items.len();
        let paced = count > self.burst_threshold;
        info!(feed = %feed.display_title(), pending = count, paced, "new items");

        for (position, item) in pending.items.iter().enumerate() {
            if position > 0 && paced {
                debug!("pausing {}", format_interval(self.item_interval));
                tokio::select! {
                    _ = tokio::time::sleep(self.item_interval) => {}
                    _ = self.shutdown.wait() => {}
                }
            }
            if self.shutdown.is_triggered() {
                info!(feed = %feed.display_title(), "Shutdown requested, leaving {} items", count - position);
                break;
            }

            let outcome = self.publisher.publish(feed, item).await;
            report.record(&outcome);
            if !outcome.continues_batch() {
                break;
            }
        }

        Ok(())
    }
}
