//! Session timers
//!
//! Every timer is a spawned task that posts a [`SessionEvent`] into the
//! session queue. Cancelling or dropping the handle aborts the task.

use crate::session::SessionEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A running timer task
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Post `make()` every `period`, first after one full period
    pub fn repeating<F>(period: Duration, tx: mpsc::UnboundedSender<SessionEvent>, make: F) -> Self
    where
        F: Fn() -> SessionEvent + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(make()).is_err() {
                    break;
                }
            }
        });
        Self { task }
    }

    /// Post `event` once after `delay`
    pub fn once(delay: Duration, tx: mpsc::UnboundedSender<SessionEvent>, event: SessionEvent) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
        Self { task }
    }

    /// Whether the task has ended (fired, for one-shot timers)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The session's three timers
#[derive(Debug, Default)]
pub struct SessionTimers {
    summary_refresh: Option<TimerHandle>,
    active_poll: Option<(String, TimerHandle)>,
    reconnect: Option<TimerHandle>,
}

impl SessionTimers {
    /// (Re)start the summary refresh timer
    pub fn start_summary_refresh(&mut self, period: Duration, tx: mpsc::UnboundedSender<SessionEvent>) {
        self.summary_refresh = Some(TimerHandle::repeating(period, tx, || SessionEvent::SummaryRefreshDue));
    }

    /// Stop the summary refresh timer
    pub fn cancel_summary_refresh(&mut self) {
        self.summary_refresh = None;
    }

    /// Whether the summary refresh timer is running
    pub fn is_refreshing(&self) -> bool {
        self.summary_refresh.is_some()
    }

    /// (Re)start the poller for `partner_id`, replacing any previous poller
    pub fn start_active_poll(
        &mut self,
        partner_id: &str,
        period: Duration,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) {
        let partner = partner_id.to_string();
        let handle = TimerHandle::repeating(period, tx, move || SessionEvent::ActivePollDue {
            partner_id: partner.clone(),
        });
        self.active_poll = Some((partner_id.to_string(), handle));
    }

    /// Stop the poller
    pub fn cancel_active_poll(&mut self) {
        self.active_poll = None;
    }

    /// Partner currently being polled
    pub fn polling(&self) -> Option<&str> {
        self.active_poll.as_ref().map(|(partner, _)| partner.as_str())
    }

    /// Schedule a single reconnect, replacing any pending one
    pub fn schedule_reconnect(&mut self, delay: Duration, tx: mpsc::UnboundedSender<SessionEvent>) {
        self.reconnect = Some(TimerHandle::once(delay, tx, SessionEvent::ReconnectDue));
    }

    /// Drop a pending reconnect
    pub fn cancel_reconnect(&mut self) {
        self.reconnect = None;
    }

    /// Whether a reconnect is pending
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Stop the refresh and poll timers
    pub fn cancel_periodic(&mut self) {
        self.cancel_summary_refresh();
        self.cancel_active_poll();
    }

    /// Stop every timer
    pub fn cancel_all(&mut self) {
        self.cancel_periodic();
        self.cancel_reconnect();
    }
}
