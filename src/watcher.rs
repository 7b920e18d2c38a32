//! Live feed of new messages.
//!
//! Each watch session owns one worker thread. The worker holds the store
//! connection and the cursor, stats the store file and its `-wal` and `-shm`
//! companions for changes, debounces bursts of changes into a single poll,
//! and pushes every new content message onto a channel read through
//! [`WatchHandle`].
//!
//! Scheduling lives in [`WatchMachine`], a plain state machine with no I/O.
//! The worker loop only turns time and file stamps into [`WatchEvent`]s and
//! executes the [`WatchAction`]s the machine returns, so two polls for one
//! session can never overlap.

use crate::error::{ChatDbError, Result, ResultExt};
use crate::model::{Message, StartFrom};
use crate::store::MessageStore;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, trace};

/// Default delay between the last observed change and the poll it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);
/// Default number of raw rows read per poll.
pub const DEFAULT_BATCH_LIMIT: usize = 100;
/// Default interval between file stamp checks.
pub const DEFAULT_STAT_INTERVAL: Duration = Duration::from_millis(200);
/// Default interval of the unconditional re-check poll.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(30);
/// Checks faster than this would spin.
const MIN_STAT_INTERVAL: Duration = Duration::from_millis(10);

/// Session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Restrict the feed to one chat.
    pub chat_id: Option<i64>,
    pub start: StartFrom,
    pub debounce: Duration,
    pub batch_limit: usize,
    pub stat_interval: Duration,
    /// Poll this often even without a change. `Duration::ZERO` disables it.
    pub recheck_interval: Duration,
    /// Poll again at once when a batch came back full instead of waiting for
    /// the next change.
    pub repoll_on_full_batch: bool,
    /// Close the feed with [`CloseReason::Completed`] after this many messages.
    pub max_messages: Option<usize>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            chat_id: None,
            start: StartFrom::Latest,
            debounce: DEFAULT_DEBOUNCE,
            batch_limit: DEFAULT_BATCH_LIMIT,
            stat_interval: DEFAULT_STAT_INTERVAL,
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
            repoll_on_full_batch: false,
            max_messages: None,
        }
    }
}

/// Why a feed ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The requested number of messages was delivered.
    Completed,
    /// A store query failed. The session is not retried.
    Failed { message: String },
    Cancelled,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed { message } => write!(f, "failed: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One item on the feed. `Closed` is always the last item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Message(Message),
    Closed(CloseReason),
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Seeding,
    /// Watching with no poll scheduled.
    Polling,
    /// A poll is scheduled for `deadline`.
    Debouncing { deadline: Instant },
    Stopped,
}

/// Inputs to [`WatchMachine::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    NotificationReceived,
    TimerFired,
    RecheckDue,
    CancelReceived,
}

/// What the worker must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Wait,
    Poll,
}

impl WatchAction {
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Wait, Self::Wait) => Self::Wait,
            _ => Self::Poll,
        }
    }
}

/// Debounce and poll scheduling for one session.
#[derive(Debug, Clone)]
pub struct WatchMachine {
    state: WatchState,
    debounce: Duration,
    repoll_on_full_batch: bool,
}

impl WatchMachine {
    #[must_use]
    pub const fn new(debounce: Duration, repoll_on_full_batch: bool) -> Self {
        Self {
            state: WatchState::Idle,
            debounce,
            repoll_on_full_batch,
        }
    }

    #[must_use]
    pub const fn state(&self) -> WatchState {
        self.state
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self.state, WatchState::Stopped)
    }

    /// Deadline of the scheduled poll, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        match self.state {
            WatchState::Debouncing { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// `Idle -> Seeding`.
    pub fn begin_seeding(&mut self) {
        if self.state == WatchState::Idle {
            self.state = WatchState::Seeding;
        }
    }

    /// `Seeding -> Polling`. The first poll runs immediately.
    pub fn seeded(&mut self) -> WatchAction {
        if self.state == WatchState::Seeding {
            self.state = WatchState::Polling;
            WatchAction::Poll
        } else {
            WatchAction::Wait
        }
    }

    /// Apply an event observed at `now`.
    pub fn handle(&mut self, event: WatchEvent, now: Instant) -> WatchAction {
        use WatchEvent::{CancelReceived, NotificationReceived, RecheckDue, TimerFired};

        let (next, action) = match (self.state, event) {
            (WatchState::Stopped, _) => (WatchState::Stopped, WatchAction::Wait),
            (_, CancelReceived) => (WatchState::Stopped, WatchAction::Wait),
            (WatchState::Polling | WatchState::Debouncing { .. }, NotificationReceived) => (
                WatchState::Debouncing {
                    deadline: now + self.debounce,
                },
                WatchAction::Wait,
            ),
            (WatchState::Debouncing { deadline }, TimerFired) if now >= deadline => {
                (WatchState::Polling, WatchAction::Poll)
            }
            (WatchState::Polling, RecheckDue) => (WatchState::Polling, WatchAction::Poll),
            (state, _) => (state, WatchAction::Wait),
        };

        if next != self.state {
            trace!(from = ?self.state, to = ?next, ?event, "Watch state transition");
        }
        self.state = next;
        action
    }

    /// Decide what follows a completed poll.
    pub const fn poll_finished(&self, full_batch: bool) -> WatchAction {
        if full_batch && self.repoll_on_full_batch && matches!(self.state, WatchState::Polling) {
            WatchAction::Poll
        } else {
            WatchAction::Wait
        }
    }

    /// A poll failed; nothing else runs for this session.
    pub fn fail(&mut self) {
        self.state = WatchState::Stopped;
    }
}

/// Length and modification time of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Change detector for the store file and its companions.
#[derive(Debug)]
struct FileStamps {
    paths: [PathBuf; 3],
    stamps: [Option<FileStamp>; 3],
}

impl FileStamps {
    fn new(store_path: &Path) -> Self {
        let paths = [
            store_path.to_path_buf(),
            companion(store_path, "-wal"),
            companion(store_path, "-shm"),
        ];
        let stamps = [stamp(&paths[0]), stamp(&paths[1]), stamp(&paths[2])];
        Self { paths, stamps }
    }

    /// True when any file appeared, vanished, or changed since the last call.
    fn changed(&mut self) -> bool {
        let mut changed = false;
        for (path, previous) in self.paths.iter().zip(self.stamps.iter_mut()) {
            let current = stamp(path);
            if current != *previous {
                trace!(path = %path.display(), "Store file changed");
                *previous = current;
                changed = true;
            }
        }
        changed
    }
}

fn companion(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn stamp(path: &Path) -> Option<FileStamp> {
    let meta = std::fs::metadata(path).ok()?;
    Some(FileStamp {
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

enum Control {
    Cancel,
}

/// Starts watch sessions.
pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Open the store at `path` and start a session on it.
    ///
    /// # Errors
    ///
    /// Returns the open error for an unreadable store, or
    /// [`ChatDbError::InvalidArgument`] for a zero batch limit.
    pub fn watch(path: impl AsRef<Path>, options: WatchOptions) -> Result<WatchHandle> {
        let store = MessageStore::open(path)?;
        Self::start(store, options)
    }

    /// Start a session on an open store. The store moves to the worker.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDbError::InvalidArgument`] for a zero batch limit and
    /// [`ChatDbError::WithContext`] if the worker thread cannot be spawned.
    pub fn start(store: MessageStore, options: WatchOptions) -> Result<WatchHandle> {
        if options.batch_limit == 0 {
            return Err(ChatDbError::invalid_argument("batch limit must be at least 1"));
        }

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (control_tx, control_rx) = crossbeam_channel::bounded(1);

        let worker = Worker {
            store,
            options,
            events: event_tx,
            control: control_rx,
            delivered: 0,
        };
        let join = thread::Builder::new()
            .name("chatdb-watch".into())
            .spawn(move || worker.run())
            .context("Failed to spawn watch worker")?;

        Ok(WatchHandle {
            events: event_rx,
            control: control_tx,
            join: Some(join),
        })
    }
}

struct Worker {
    store: MessageStore,
    options: WatchOptions,
    events: Sender<FeedEvent>,
    control: Receiver<Control>,
    delivered: usize,
}

/// How a poll ended.
enum PollOutcome {
    /// Batch delivered. `full` is set when the batch hit the limit.
    Delivered { full: bool },
    /// The feed must close with this reason.
    Close(CloseReason),
}

impl Worker {
    fn run(mut self) {
        let reason = self.session();
        info!(reason = %reason, "Watch session ended");
        let _ = self.events.send(FeedEvent::Closed(reason));
    }

    fn session(&mut self) -> CloseReason {
        let mut machine = WatchMachine::new(self.options.debounce, self.options.repoll_on_full_batch);

        machine.begin_seeding();
        let mut cursor = match self.seed() {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(error = %e, "Failed to seed watch cursor");
                return CloseReason::Failed {
                    message: e.to_string(),
                };
            }
        };
        info!(
            path = %self.store.path().display(),
            chat_id = ?self.options.chat_id,
            cursor,
            "Watch session started"
        );

        let stat_interval = self.options.stat_interval.max(MIN_STAT_INTERVAL);
        let recheck_interval =
            (!self.options.recheck_interval.is_zero()).then_some(self.options.recheck_interval);
        let mut stamps = FileStamps::new(self.store.path());
        let now = Instant::now();
        let mut next_stat = now + stat_interval;
        let mut next_recheck = recheck_interval.map(|interval| now + interval);

        let mut action = machine.seeded();
        loop {
            while action == WatchAction::Poll {
                match self.poll(&mut cursor) {
                    PollOutcome::Delivered { full } => action = machine.poll_finished(full),
                    PollOutcome::Close(reason) => {
                        machine.fail();
                        return reason;
                    }
                }
                // Back-to-back repolls still honour a pending cancel.
                if action == WatchAction::Poll && self.cancel_pending() {
                    machine.handle(WatchEvent::CancelReceived, Instant::now());
                    return CloseReason::Cancelled;
                }
            }

            let now = Instant::now();
            let wake = [Some(next_stat), machine.deadline(), next_recheck]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(next_stat);
            match self.control.recv_timeout(wake.saturating_duration_since(now)) {
                Ok(Control::Cancel) | Err(RecvTimeoutError::Disconnected) => {
                    machine.handle(WatchEvent::CancelReceived, Instant::now());
                    return CloseReason::Cancelled;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            let now = Instant::now();
            if now >= next_stat {
                if stamps.changed() {
                    action = action.or(machine.handle(WatchEvent::NotificationReceived, now));
                }
                next_stat = now + stat_interval;
            }
            if machine.deadline().is_some_and(|deadline| now >= deadline) {
                action = action.or(machine.handle(WatchEvent::TimerFired, now));
            }
            if let (Some(due), Some(interval)) = (next_recheck, recheck_interval) {
                if now >= due {
                    action = action.or(machine.handle(WatchEvent::RecheckDue, now));
                    next_recheck = Some(now + interval);
                }
            }
        }
    }

    fn cancel_pending(&self) -> bool {
        match self.control.try_recv() {
            Ok(Control::Cancel) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    fn seed(&self) -> Result<i64> {
        match self.options.start {
            StartFrom::Latest => self.store.max_row_id(),
            StartFrom::RowId(row_id) => Ok(row_id),
            StartFrom::Beginning => Ok(0),
        }
    }

    fn poll(&mut self, cursor: &mut i64) -> PollOutcome {
        let batch = match self.store.messages_after(
            *cursor,
            self.options.chat_id,
            self.options.batch_limit,
        ) {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, cursor = *cursor, "Watch poll failed");
                return PollOutcome::Close(CloseReason::Failed {
                    message: e.to_string(),
                });
            }
        };

        debug!(
            cursor = *cursor,
            scanned = batch.scanned,
            delivered = batch.messages.len(),
            "Watch poll"
        );
        if let Some(last) = batch.last_row_id {
            *cursor = last;
        }

        for message in batch.messages {
            if self.events.send(FeedEvent::Message(message)).is_err() {
                return PollOutcome::Close(CloseReason::Cancelled);
            }
            self.delivered += 1;
            if self
                .options
                .max_messages
                .is_some_and(|max| self.delivered >= max)
            {
                return PollOutcome::Close(CloseReason::Completed);
            }
        }

        PollOutcome::Delivered {
            full: batch.scanned >= self.options.batch_limit,
        }
    }
}

/// Consumer side of a watch session.
///
/// Dropping the handle cancels the session.
pub struct WatchHandle {
    events: Receiver<FeedEvent>,
    control: Sender<Control>,
    join: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Block for the next event. `None` once the feed is closed and drained.
    #[must_use]
    pub fn recv(&self) -> Option<FeedEvent> {
        self.events.recv().ok()
    }

    /// Block for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RecvTimeoutError::Timeout`] when nothing arrived in time and
    /// [`RecvTimeoutError::Disconnected`] once the feed is closed and drained.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<FeedEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Stop the session and wait for the worker to exit.
    ///
    /// Undelivered messages are discarded. Returns how the feed ended, which
    /// is [`CloseReason::Cancelled`] unless it had already completed or
    /// failed. Calling it again returns `None`.
    pub fn cancel(&mut self) -> Option<CloseReason> {
        let join = self.join.take()?;
        let _ = self.control.try_send(Control::Cancel);
        let _ = join.join();

        let reason = self
            .events
            .try_iter()
            .find_map(|event| match event {
                FeedEvent::Closed(reason) => Some(reason),
                FeedEvent::Message(_) => None,
            })
            .unwrap_or(CloseReason::Cancelled);
        debug!(reason = %reason, "Watch handle cancelled");
        Some(reason)
    }
}

impl Iterator for WatchHandle {
    type Item = FeedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(100);

    fn polling_machine(repoll: bool) -> WatchMachine {
        let mut machine = WatchMachine::new(DEBOUNCE, repoll);
        machine.begin_seeding();
        assert_eq!(machine.state(), WatchState::Seeding);
        assert_eq!(machine.seeded(), WatchAction::Poll);
        assert_eq!(machine.state(), WatchState::Polling);
        machine
    }

    #[test]
    fn seeding_only_from_idle() {
        let mut machine = WatchMachine::new(DEBOUNCE, false);
        assert_eq!(machine.seeded(), WatchAction::Wait);
        assert_eq!(machine.state(), WatchState::Idle);
    }

    #[test]
    fn notification_arms_debounce() {
        let mut machine = polling_machine(false);
        let now = Instant::now();
        assert_eq!(
            machine.handle(WatchEvent::NotificationReceived, now),
            WatchAction::Wait
        );
        assert_eq!(machine.deadline(), Some(now + DEBOUNCE));
    }

    #[test]
    fn burst_resets_the_timer_and_polls_once() {
        let mut machine = polling_machine(false);
        let t0 = Instant::now();
        machine.handle(WatchEvent::NotificationReceived, t0);
        let t1 = t0 + Duration::from_millis(60);
        machine.handle(WatchEvent::NotificationReceived, t1);
        assert_eq!(machine.deadline(), Some(t1 + DEBOUNCE));

        // Original deadline passes without a poll.
        assert_eq!(
            machine.handle(WatchEvent::TimerFired, t0 + DEBOUNCE),
            WatchAction::Wait
        );
        assert_eq!(
            machine.handle(WatchEvent::TimerFired, t1 + DEBOUNCE),
            WatchAction::Poll
        );
        assert_eq!(machine.state(), WatchState::Polling);
        assert_eq!(
            machine.handle(WatchEvent::TimerFired, t1 + DEBOUNCE * 2),
            WatchAction::Wait
        );
    }

    #[test]
    fn recheck_polls_only_when_nothing_is_scheduled() {
        let mut machine = polling_machine(false);
        let now = Instant::now();
        assert_eq!(machine.handle(WatchEvent::RecheckDue, now), WatchAction::Poll);

        machine.handle(WatchEvent::NotificationReceived, now);
        assert_eq!(machine.handle(WatchEvent::RecheckDue, now), WatchAction::Wait);
        assert!(machine.deadline().is_some());
    }

    #[test]
    fn cancel_stops_everything() {
        let mut machine = polling_machine(false);
        let now = Instant::now();
        machine.handle(WatchEvent::NotificationReceived, now);
        machine.handle(WatchEvent::CancelReceived, now);
        assert!(machine.is_stopped());
        assert_eq!(machine.deadline(), None);

        for event in [
            WatchEvent::NotificationReceived,
            WatchEvent::TimerFired,
            WatchEvent::RecheckDue,
        ] {
            assert_eq!(machine.handle(event, now + DEBOUNCE * 10), WatchAction::Wait);
            assert!(machine.is_stopped());
        }
    }

    #[test]
    fn full_batch_waits_unless_repoll_enabled() {
        let machine = polling_machine(false);
        assert_eq!(machine.poll_finished(true), WatchAction::Wait);

        let machine = polling_machine(true);
        assert_eq!(machine.poll_finished(true), WatchAction::Poll);
        assert_eq!(machine.poll_finished(false), WatchAction::Wait);
    }

    #[test]
    fn failure_stops_machine() {
        let mut machine = polling_machine(false);
        machine.fail();
        assert!(machine.is_stopped());
        assert_eq!(machine.poll_finished(true), WatchAction::Wait);
    }

    #[test]
    fn action_or() {
        assert_eq!(WatchAction::Wait.or(WatchAction::Wait), WatchAction::Wait);
        assert_eq!(WatchAction::Wait.or(WatchAction::Poll), WatchAction::Poll);
        assert_eq!(WatchAction::Poll.or(WatchAction::Wait), WatchAction::Poll);
    }

    #[test]
    fn companion_paths() {
        let path = Path::new("/tmp/chat.db");
        assert_eq!(companion(path, "-wal"), PathBuf::from("/tmp/chat.db-wal"));
        assert_eq!(companion(path, "-shm"), PathBuf::from("/tmp/chat.db-shm"));
    }

    #[test]
    fn stamps_detect_writes_and_new_companions() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("chat.db");
        std::fs::write(&db, b"one").unwrap();

        let mut stamps = FileStamps::new(&db);
        assert!(!stamps.changed());

        std::fs::write(&db, b"one two").unwrap();
        assert!(stamps.changed());
        assert!(!stamps.changed());

        std::fs::write(companion(&db, "-wal"), b"wal").unwrap();
        assert!(stamps.changed());
    }

    fn store_with_rows(dir: &tempfile::TempDir, rows: usize) -> MessageStore {
        let path = dir.path().join("chat.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT);
             CREATE TABLE chat (ROWID INTEGER PRIMARY KEY, guid TEXT);
             CREATE TABLE message (ROWID INTEGER PRIMARY KEY, guid TEXT, text TEXT,
                 handle_id INTEGER, date INTEGER, is_from_me INTEGER, service TEXT);
             CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
             CREATE TABLE attachment (ROWID INTEGER PRIMARY KEY, filename TEXT);
             CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);",
        )
        .unwrap();
        for i in 0..rows {
            conn.execute(
                "INSERT INTO message (guid, text, handle_id, date, is_from_me, service)
                 VALUES (?1, 'x', 0, 0, 0, 'iMessage')",
                [format!("G{i}")],
            )
            .unwrap();
        }
        MessageStore::open(&path).unwrap()
    }

    #[test]
    fn pending_cancel_interrupts_full_batch_catch_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_with_rows(&dir, 50);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (control_tx, control_rx) = crossbeam_channel::bounded(1);
        control_tx.send(Control::Cancel).unwrap();

        let worker = Worker {
            store,
            options: WatchOptions {
                start: StartFrom::Beginning,
                batch_limit: 1,
                repoll_on_full_batch: true,
                ..WatchOptions::default()
            },
            events: event_tx,
            control: control_rx,
            delivered: 0,
        };
        worker.run();

        let events: Vec<FeedEvent> = event_rx.try_iter().collect();
        assert_eq!(events.len(), 2, "one batch, then the close");
        assert!(matches!(events[0], FeedEvent::Message(_)));
        assert_eq!(events[1], FeedEvent::Closed(CloseReason::Cancelled));
    }

    #[test]
    fn dropped_handle_interrupts_full_batch_catch_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = store_with_rows(&dir, 50);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (control_tx, control_rx) = crossbeam_channel::bounded::<Control>(1);
        drop(control_tx);

        let worker = Worker {
            store,
            options: WatchOptions {
                start: StartFrom::Beginning,
                batch_limit: 5,
                repoll_on_full_batch: true,
                ..WatchOptions::default()
            },
            events: event_tx,
            control: control_rx,
            delivered: 0,
        };
        worker.run();

        let delivered = event_rx
            .try_iter()
            .filter(|e| matches!(e, FeedEvent::Message(_)))
            .count();
        assert_eq!(delivered, 5);
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(CloseReason::Cancelled.to_string(), "cancelled");
        assert_eq!(
            CloseReason::Failed {
                message: "disk I/O error".into()
            }
            .to_string(),
            "failed: disk I/O error"
        );
    }
}
