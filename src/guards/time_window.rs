//! Start/end countdowns per guard group
//!
//! Remaining time is seeded from network time and then decremented locally
//! once per second. Reaching zero is an edge: each countdown requests one
//! eligibility re-check on the transition and never again.

use crate::rpc_manager::LedgerRpc;
use crate::state::GuardGroup;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountdownState {
    Running,
    Expired,
}

/// Seconds until `target`, extrapolated locally between network syncs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    target: i64,
    remaining: i64,
    state: CountdownState,
}

impl Countdown {
    /// A countdown whose target already passed starts expired and never fires
    pub fn new(target: i64, now: i64) -> Self {
        let remaining = (target - now).max(0);
        Self {
            target,
            remaining,
            state: if remaining > 0 {
                CountdownState::Running
            } else {
                CountdownState::Expired
            },
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.state == CountdownState::Expired
    }

    /// Advance one second; true only on the Running -> Expired transition
    pub fn tick(&mut self) -> bool {
        if self.is_expired() {
            return false;
        }
        self.remaining = (self.remaining - 1).max(0);
        self.expire_if_done()
    }

    /// Re-seed from network time; true if this crossed zero
    pub fn resync(&mut self, now: i64) -> bool {
        if self.is_expired() {
            return false;
        }
        self.remaining = (self.target - now).max(0);
        self.expire_if_done()
    }

    fn expire_if_done(&mut self) -> bool {
        if self.remaining == 0 {
            self.state = CountdownState::Expired;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.remaining.max(0);
        write!(
            f,
            "{:02}d {:02}h {:02}m {:02}s",
            secs / 86_400,
            (secs % 86_400) / 3_600,
            (secs % 3_600) / 60,
            secs % 60
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEdge {
    Start,
    End,
}

/// What the UI should show for a group's time window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDisplay {
    StartingIn(i64),
    EndingIn(i64),
}

/// "Starting in" while start is ahead and the end (if any) has not passed;
/// "ending in" while end is ahead and the start (if any) has passed.
pub fn window_display(start: Option<i64>, end: Option<i64>, now: i64) -> Option<WindowDisplay> {
    match (start, end) {
        (Some(s), e) if s > now && e.map_or(true, |e| e > now) => {
            Some(WindowDisplay::StartingIn(s - now))
        }
        (s, Some(e)) if e > now && s.map_or(true, |s| s <= now) => {
            Some(WindowDisplay::EndingIn(e - now))
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct TrackedWindow {
    label: String,
    edge: WindowEdge,
    countdown: Countdown,
}

/// A request to re-run the eligibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecheckRequest {
    /// Group labels whose window edge was crossed
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TimeWindowTracker {
    windows: Vec<TrackedWindow>,
}

impl TimeWindowTracker {
    /// Track every future start/end timestamp of `groups`
    pub fn from_groups(groups: &[GuardGroup], now: i64) -> Self {
        let mut windows = Vec::new();
        for group in groups {
            let edges = [
                (WindowEdge::Start, group.guards.start_date.map(|d| d.date)),
                (WindowEdge::End, group.guards.end_date.map(|d| d.date)),
            ];
            for (edge, target) in edges {
                if let Some(target) = target {
                    let countdown = Countdown::new(target, now);
                    if !countdown.is_expired() {
                        windows.push(TrackedWindow {
                            label: group.label.clone(),
                            edge,
                            countdown,
                        });
                    }
                }
            }
        }
        Self { windows }
    }

    /// Nothing left to count down
    pub fn is_idle(&self) -> bool {
        self.windows.iter().all(|w| w.countdown.is_expired())
    }

    /// Advance one second; returns the labels that crossed zero on this tick
    pub fn tick(&mut self) -> Vec<String> {
        self.windows
            .iter_mut()
            .filter_map(|w| w.countdown.tick().then(|| w.label.clone()))
            .collect()
    }

    pub fn resync(&mut self, now: i64) -> Vec<String> {
        self.windows
            .iter_mut()
            .filter_map(|w| w.countdown.resync(now).then(|| w.label.clone()))
            .collect()
    }

    /// Running countdown for one label and edge
    pub fn countdown(&self, label: &str, edge: WindowEdge) -> Option<&Countdown> {
        self.windows
            .iter()
            .find(|w| w.label == label && w.edge == edge && !w.countdown.is_expired())
            .map(|w| &w.countdown)
    }

    /// Drive the tracker once per second until every countdown expired or
    /// the receiver is gone. When `resync` is given, network time is
    /// re-read every `every` ticks.
    pub async fn run(
        mut self,
        recheck: mpsc::UnboundedSender<RecheckRequest>,
        resync: Option<(Arc<dyn LedgerRpc>, u32)>,
    ) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // first tick completes immediately
        interval.tick().await;
        let mut ticks: u32 = 0;

        while !self.is_idle() {
            interval.tick().await;
            ticks = ticks.wrapping_add(1);

            let mut crossed = self.tick();
            if let Some((rpc, every)) = &resync {
                if *every > 0 && ticks % every == 0 {
                    match rpc.get_network_time().await {
                        Ok(now) => crossed.extend(self.resync(now)),
                        Err(e) => warn!(error = %e, "Network time resync failed"),
                    }
                }
            }

            if !crossed.is_empty() {
                info!(labels = ?crossed, "Guard window reached, requesting eligibility re-check");
                if recheck.send(RecheckRequest { labels: crossed }).is_err() {
                    debug!("Re-check receiver dropped, stopping tracker");
                    return;
                }
            }
        }
    }
}
