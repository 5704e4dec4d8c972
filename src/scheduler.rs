use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::PlayerId;

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    FightRound,
    BotAction { player_id: PlayerId },
    TurnEnd { player_id: PlayerId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerFired {
    pub key: TimerKey,
    pub ticket: u64,
}

pub trait Scheduler: Send {
    fn arm(&mut self, key: TimerKey, delay_ms: u64) -> u64;
    fn cancel(&mut self, key: &TimerKey);
    fn cancel_all(&mut self);
    fn is_armed(&self, key: &TimerKey) -> bool;
    fn armed_count(&self) -> usize;
    /// Accepts a fired timer once. Returns false for cancelled, re-armed or
    /// foreign tickets.
    fn settle(&mut self, fired: &TimerFired) -> bool;
}

pub trait SchedulerSource {
    fn scheduler(&self) -> Box<dyn Scheduler>;
}

fn next_ticket() -> u64 {
    NEXT_TICKET.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Default)]
struct ManualQueue {
    now_ms: u64,
    pending: BTreeMap<(u64, u64), TimerKey>,
}

#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    queue: Arc<Mutex<ManualQueue>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.lock().now_ms
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn advance(&self) -> Option<TimerFired> {
        let mut queue = self.lock();
        let ((due_ms, ticket), key) = queue.pending.pop_first()?;
        queue.now_ms = queue.now_ms.max(due_ms);
        Some(TimerFired { key, ticket })
    }

    pub fn advance_by(&self, delta_ms: u64) -> Vec<TimerFired> {
        let mut queue = self.lock();
        let target = queue.now_ms.saturating_add(delta_ms);
        let due: Vec<(u64, u64)> = queue
            .pending
            .range(..=(target, u64::MAX))
            .map(|(slot, _)| *slot)
            .collect();
        let mut fired = Vec::with_capacity(due.len());
        for slot in due {
            if let Some(key) = queue.pending.remove(&slot) {
                fired.push(TimerFired {
                    key,
                    ticket: slot.1,
                });
            }
        }
        queue.now_ms = target;
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SchedulerSource for ManualClock {
    fn scheduler(&self) -> Box<dyn Scheduler> {
        Box::new(ManualScheduler {
            clock: self.clone(),
            armed: HashMap::new(),
        })
    }
}

#[derive(Debug)]
pub struct ManualScheduler {
    clock: ManualClock,
    armed: HashMap<TimerKey, (u64, u64)>,
}

impl Scheduler for ManualScheduler {
    fn arm(&mut self, key: TimerKey, delay_ms: u64) -> u64 {
        self.cancel(&key);
        let ticket = next_ticket();
        let mut queue = self.clock.lock();
        let due_ms = queue.now_ms.saturating_add(delay_ms);
        queue.pending.insert((due_ms, ticket), key.clone());
        drop(queue);
        self.armed.insert(key, (due_ms, ticket));
        ticket
    }

    fn cancel(&mut self, key: &TimerKey) {
        if let Some(slot) = self.armed.remove(key) {
            self.clock.lock().pending.remove(&slot);
        }
    }

    fn cancel_all(&mut self) {
        let mut queue = self.clock.lock();
        for (_, slot) in self.armed.drain() {
            queue.pending.remove(&slot);
        }
    }

    fn is_armed(&self, key: &TimerKey) -> bool {
        self.armed.contains_key(key)
    }

    fn armed_count(&self) -> usize {
        self.armed.len()
    }

    fn settle(&mut self, fired: &TimerFired) -> bool {
        match self.armed.get(&fired.key) {
            Some((_, ticket)) if *ticket == fired.ticket => {
                self.armed.remove(&fired.key);
                true
            }
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TokioTimers {
    tx: mpsc::UnboundedSender<TimerFired>,
}

impl TokioTimers {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SchedulerSource for TokioTimers {
    fn scheduler(&self) -> Box<dyn Scheduler> {
        Box::new(TokioScheduler {
            tx: self.tx.clone(),
            armed: HashMap::new(),
        })
    }
}

#[derive(Debug)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    armed: HashMap<TimerKey, (u64, JoinHandle<()>)>,
}

impl Scheduler for TokioScheduler {
    fn arm(&mut self, key: TimerKey, delay_ms: u64) -> u64 {
        self.cancel(&key);
        let ticket = next_ticket();
        let tx = self.tx.clone();
        let fired = TimerFired {
            key: key.clone(),
            ticket,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = tx.send(fired);
        });
        self.armed.insert(key, (ticket, handle));
        ticket
    }

    fn cancel(&mut self, key: &TimerKey) {
        if let Some((_, handle)) = self.armed.remove(key) {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.abort();
        }
    }

    fn is_armed(&self, key: &TimerKey) -> bool {
        self.armed.contains_key(key)
    }

    fn armed_count(&self) -> usize {
        self.armed.len()
    }

    fn settle(&mut self, fired: &TimerFired) -> bool {
        match self.armed.get(&fired.key) {
            Some((ticket, _)) if *ticket == fired.ticket => {
                self.armed.remove(&fired.key);
                true
            }
            _ => false,
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
