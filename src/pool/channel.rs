//! Bounded connection pool with FIFO waiter queueing.
//!
//! # Responsibilities
//! - Hand out idle connections, re-validating them lazily on acquisition
//! - Create new connections while below `max_active`
//! - Park callers in a FIFO queue once the ceiling is reached
//! - Close surplus connections instead of blocking when the idle queue is full
//!
//! # Locking
//! All bookkeeping (`opening`, the waiter queue, pushing to and popping from
//! the idle queue) happens under one `Mutex` that is never held across an
//! `.await`. Factory I/O always runs with the lock released.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::observability::metrics;
use crate::pool::error::{PoolError, PoolResult};
use crate::pool::factory::ConnectionFactory;

/// A connection sitting in the idle queue.
#[derive(Debug)]
struct IdleEntry<C> {
    conn: C,
    returned_at: Instant,
}

impl<C> IdleEntry<C> {
    fn new(conn: C) -> Self {
        Self {
            conn,
            returned_at: Instant::now(),
        }
    }

    fn is_expired(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.returned_at.elapsed() > timeout)
    }
}

/// Single-slot delivery handle of a caller blocked in `get`.
type Waiter<C> = oneshot::Sender<IdleEntry<C>>;

struct PoolState<F: ConnectionFactory> {
    /// `None` once the pool has been released.
    idle: Option<Arc<ArrayQueue<IdleEntry<F::Connection>>>>,
    /// Cleared at the end of `release`.
    factory: Option<Arc<F>>,
    /// Connections created and not yet closed.
    opening: usize,
    waiters: VecDeque<Waiter<F::Connection>>,
    released: bool,
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub idle: usize,
    pub opening: usize,
    pub waiting: usize,
    pub max_active: usize,
}

/// Bounded pool of reusable connections.
pub struct ChannelPool<F: ConnectionFactory> {
    state: Mutex<PoolState<F>>,
    max_active: usize,
    idle_timeout: Option<Duration>,
}

enum Acquire<F: ConnectionFactory> {
    Idle(IdleEntry<F::Connection>),
    Wait(oneshot::Receiver<IdleEntry<F::Connection>>),
    Create(Arc<F>),
}

enum PutOutcome<C> {
    Delivered,
    Pooled,
    Overflow(C),
    Released(C),
    FactoryMissing,
}

impl<F: ConnectionFactory> PoolState<F> {
    /// Deliver to the oldest live waiter, else queue as idle.
    fn recycle(
        &mut self,
        idle: &ArrayQueue<IdleEntry<F::Connection>>,
        mut entry: IdleEntry<F::Connection>,
    ) -> PutOutcome<F::Connection> {
        loop {
            match self.waiters.pop_front() {
                Some(waiter) => match waiter.send(entry) {
                    Ok(()) => break PutOutcome::Delivered,
                    // Caller stopped waiting; try the next one.
                    Err(returned) => entry = returned,
                },
                None => {
                    break match idle.push(entry) {
                        Ok(()) => PutOutcome::Pooled,
                        Err(entry) => PutOutcome::Overflow(entry.conn),
                    }
                }
            }
        }
    }
}

/// Gives an `opening` slot back if dropped while armed.
///
/// Covers a cancelled `get` between taking the slot and handing the
/// connection to the caller.
struct Reservation<'a, F: ConnectionFactory> {
    pool: &'a ChannelPool<F>,
    armed: bool,
}

impl<'a, F: ConnectionFactory> Reservation<'a, F> {
    fn new(pool: &'a ChannelPool<F>) -> Self {
        Self { pool, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl<F: ConnectionFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut state) = self.pool.state.lock() {
                state.opening = state.opening.saturating_sub(1);
            }
        }
    }
}

/// A parked `get`. If the caller goes away after a connection was already
/// handed over, the connection is passed on instead of being lost.
struct Waiting<'a, F: ConnectionFactory> {
    pool: &'a ChannelPool<F>,
    rx: oneshot::Receiver<IdleEntry<F::Connection>>,
}

impl<F: ConnectionFactory> Drop for Waiting<'_, F> {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(entry) = self.rx.try_recv() {
            self.pool.reclaim(entry);
        }
    }
}

impl<F: ConnectionFactory> ChannelPool<F> {
    /// Create a pool and fill it with `initial_cap` connections.
    pub async fn new(config: &PoolConfig, factory: F) -> PoolResult<Self> {
        let valid = config.max_idle > 0
            && config.initial_cap <= config.max_idle
            && config.max_idle <= config.max_active;
        if !valid {
            return Err(PoolError::InvalidCapacity {
                initial_cap: config.initial_cap,
                max_idle: config.max_idle,
                max_active: config.max_active,
            });
        }

        let factory = Arc::new(factory);
        let idle = Arc::new(ArrayQueue::new(config.max_idle));
        let pool = Self {
            state: Mutex::new(PoolState {
                idle: Some(idle.clone()),
                factory: Some(factory.clone()),
                opening: 0,
                waiters: VecDeque::new(),
                released: false,
            }),
            max_active: config.max_active,
            idle_timeout: config.idle_timeout(),
        };

        for _ in 0..config.initial_cap {
            match factory.create().await {
                Ok(conn) => {
                    let mut state = pool.lock();
                    // initial_cap <= max_idle, so the queue always has room here.
                    if idle.push(IdleEntry::new(conn)).is_ok() {
                        state.opening += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fill connection pool");
                    pool.release().await;
                    return Err(PoolError::Fill(e));
                }
            }
        }

        tracing::debug!(
            initial = config.initial_cap,
            max_idle = config.max_idle,
            max_active = config.max_active,
            "Connection pool created"
        );
        pool.publish();
        Ok(pool)
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<F>> {
        self.state.lock().expect("pool state mutex poisoned")
    }

    /// Borrow a connection, waiting in line if the pool is saturated.
    pub async fn get(&self) -> PoolResult<F::Connection> {
        loop {
            let acquire = {
                let mut state = self.lock();
                let Some(idle) = state.idle.clone() else {
                    return Err(PoolError::PoolClosed);
                };
                if let Some(entry) = idle.pop() {
                    Acquire::Idle(entry)
                } else if state.opening >= self.max_active {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    Acquire::Wait(rx)
                } else {
                    let Some(factory) = state.factory.clone() else {
                        return Err(PoolError::PoolClosed);
                    };
                    state.opening += 1;
                    Acquire::Create(factory)
                }
            };

            match acquire {
                Acquire::Idle(mut entry) => {
                    if entry.is_expired(self.idle_timeout) {
                        self.discard(entry.conn, "idle_timeout").await;
                        continue;
                    }
                    let reservation = Reservation::new(self);
                    if let Err(e) = self.ping(&mut entry.conn).await {
                        reservation.keep();
                        tracing::debug!(error = %e, "Idle connection failed probe, discarding");
                        self.discard(entry.conn, "probe_failed").await;
                        continue;
                    }
                    reservation.keep();
                    self.publish();
                    return Ok(entry.conn);
                }
                Acquire::Wait(rx) => {
                    tracing::trace!("Pool saturated, waiting for a returned connection");
                    let mut waiting = Waiting { pool: self, rx };
                    let received = (&mut waiting.rx).await;
                    drop(waiting);
                    match received {
                        Ok(entry) => {
                            if entry.is_expired(self.idle_timeout) {
                                self.discard(entry.conn, "idle_timeout").await;
                                continue;
                            }
                            return Ok(entry.conn);
                        }
                        Err(_) => {
                            let released = self.lock().released;
                            return Err(if released {
                                PoolError::PoolClosed
                            } else {
                                PoolError::MaxActiveReached
                            });
                        }
                    }
                }
                Acquire::Create(factory) => {
                    let reservation = Reservation::new(self);
                    match factory.create().await {
                        Ok(conn) => {
                            reservation.keep();
                            self.publish();
                            return Ok(conn);
                        }
                        Err(e) => {
                            drop(reservation);
                            tracing::warn!(error = %e, "Factory failed to create connection");
                            return Err(PoolError::Factory(e));
                        }
                    }
                }
            }
        }
    }

    /// Return a borrowed connection.
    ///
    /// The oldest waiter receives it directly; otherwise it goes back to the
    /// idle queue, or is closed when that queue is full.
    pub async fn put(&self, conn: F::Connection) -> PoolResult<()> {
        let outcome = {
            let mut state = self.lock();
            match (state.idle.clone(), state.factory.is_some()) {
                (Some(idle), true) => state.recycle(&idle, IdleEntry::new(conn)),
                (_, true) => PutOutcome::Released(conn),
                (_, false) => PutOutcome::FactoryMissing,
            }
        };

        let result = match outcome {
            PutOutcome::Delivered | PutOutcome::Pooled => Ok(()),
            PutOutcome::Overflow(conn) => {
                tracing::debug!("Idle queue full, closing surplus connection");
                metrics::record_pool_discard("idle_full");
                self.close(conn).await
            }
            PutOutcome::Released(conn) => {
                self.close(conn).await?;
                Err(PoolError::PoolReleased)
            }
            PutOutcome::FactoryMissing => Err(PoolError::FactoryMissing),
        };
        self.publish();
        result
    }

    /// Close a single connection and stop counting it.
    pub async fn close(&self, conn: F::Connection) -> PoolResult<()> {
        let factory = {
            let mut state = self.lock();
            state.opening = state.opening.saturating_sub(1);
            state.factory.clone()
        };
        let factory = factory.ok_or(PoolError::FactoryMissing)?;
        factory.close(conn).await?;
        Ok(())
    }

    /// Close every idle connection and shut the pool.
    ///
    /// Waiting callers are woken with an error. Later `get`/`put` calls fail.
    pub async fn release(&self) {
        let (idle, waiters, factory) = {
            let mut state = self.lock();
            state.released = true;
            (
                state.idle.take(),
                std::mem::take(&mut state.waiters),
                state.factory.clone(),
            )
        };
        drop(waiters);

        if let (Some(idle), Some(factory)) = (idle, factory) {
            let mut closed = 0;
            while let Some(entry) = idle.pop() {
                if let Err(e) = factory.close(entry.conn).await {
                    tracing::debug!(error = %e, "Failed to close idle connection on release");
                }
                closed += 1;
            }
            let mut state = self.lock();
            state.opening = state.opening.saturating_sub(closed);
            tracing::info!(closed, "Connection pool released");
        }

        self.lock().factory = None;
        self.publish();
    }

    /// Probe a connection through the factory.
    pub async fn ping(&self, conn: &mut F::Connection) -> PoolResult<()> {
        let factory = self.lock().factory.clone().ok_or(PoolError::FactoryMissing)?;
        factory.probe(conn).await?;
        Ok(())
    }

    /// Idle connections currently queued. Only an estimate under concurrency.
    pub fn len(&self) -> usize {
        self.lock().idle.as_ref().map_or(0, |idle| idle.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the pool counters.
    pub fn status(&self) -> PoolStatus {
        let state = self.lock();
        PoolStatus {
            idle: state.idle.as_ref().map_or(0, |idle| idle.len()),
            opening: state.opening,
            waiting: state.waiters.len(),
            max_active: self.max_active,
        }
    }

    /// Return an entry whose borrower went away before taking it. Never awaits.
    fn reclaim(&self, entry: IdleEntry<F::Connection>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let outcome = match (state.idle.clone(), state.factory.is_some()) {
            (Some(idle), true) => state.recycle(&idle, entry),
            _ => PutOutcome::Overflow(entry.conn),
        };
        let PutOutcome::Overflow(conn) = outcome else {
            return;
        };
        state.opening = state.opening.saturating_sub(1);
        let factory = state.factory.clone();
        drop(state);

        tracing::debug!("Closing connection left behind by a cancelled caller");
        metrics::record_pool_discard("abandoned");
        if let (Some(factory), Ok(runtime)) = (factory, tokio::runtime::Handle::try_current()) {
            runtime.spawn(async move {
                if let Err(e) = factory.close(conn).await {
                    tracing::debug!(error = %e, "Failed to close abandoned connection");
                }
            });
        }
    }

    async fn discard(&self, conn: F::Connection, reason: &'static str) {
        tracing::debug!(reason, "Discarding pooled connection");
        metrics::record_pool_discard(reason);
        if let Err(e) = self.close(conn).await {
            tracing::debug!(error = %e, reason, "Failed to close discarded connection");
        }
    }

    fn publish(&self) {
        metrics::record_pool_status(&self.status());
    }
}
