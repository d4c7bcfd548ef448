use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex as StdMutex, MutexGuard,
    },
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    log_error, log_info,
    models::Session,
    settings::AppSettings,
    store::{CompletionRecord, FocusStore, StorageWarning},
};

use super::{Completion, TimerMode, TimerState};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub formatted_time: String,
    pub growth: f64,
}

impl From<&TimerState> for TimerSnapshot {
    fn from(state: &TimerState) -> Self {
        Self {
            formatted_time: state.formatted_time(),
            growth: state.growth(),
            state: state.clone(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompletedEvent {
    pub mode: TimerMode,
    /// Subject credited at completion, "General Focus" when none was active.
    pub subject_name: String,
    pub session: Session,
}

impl SessionCompletedEvent {
    pub fn title(&self) -> &'static str {
        match self.mode {
            TimerMode::Work => "Focus Complete!",
            TimerMode::ShortBreak | TimerMode::LongBreak => "Break Over!",
        }
    }

    pub fn body(&self) -> String {
        match self.mode {
            TimerMode::Work => {
                let subject = if self.session.is_general() {
                    "your task"
                } else {
                    self.subject_name.as_str()
                };
                format!("Great job! You focused on {subject}.")
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => {
                "Your break is over. Ready to focus again?".to_string()
            }
        }
    }
}

/// Everything the presentation layer hears from the timer.
#[derive(Debug, Clone)]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    Tick(TimerSnapshot),
    SessionCompleted(SessionCompletedEvent),
    StorageWarning(StorageWarning),
}

/// Pending background work: the running ticker, a scheduled auto-start, or a
/// skipped block whose completion is still being recorded. All share one slot
/// so any manual transition cancels whichever is pending.
struct Scheduled {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Break proposed after the `completed_work`-th work session.
pub fn break_after(completed_work: u32, long_break_interval: u32) -> TimerMode {
    if long_break_interval > 0 && completed_work > 0 && completed_work % long_break_interval == 0 {
        TimerMode::LongBreak
    } else {
        TimerMode::ShortBreak
    }
}

#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    store: Arc<Mutex<FocusStore>>,
    events: mpsc::UnboundedSender<TimerEvent>,
    scheduled: Arc<StdMutex<Option<Scheduled>>>,
    pending_note: Arc<Mutex<Option<String>>>,
    completed_work: Arc<AtomicU32>,
    tick_interval: Duration,
    auto_chain_delay: Duration,
}

impl TimerController {
    pub fn new(
        store: FocusStore,
        config: &AppConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let state = TimerState::new(store.timer_config());

        let controller = Self {
            state: Arc::new(Mutex::new(state)),
            store: Arc::new(Mutex::new(store)),
            events,
            scheduled: Arc::new(StdMutex::new(None)),
            pending_note: Arc::new(Mutex::new(None)),
            completed_work: Arc::new(AtomicU32::new(0)),
            tick_interval: config.tick_interval,
            auto_chain_delay: config.auto_chain_delay,
        };

        (controller, receiver)
    }

    pub fn store(&self) -> Arc<Mutex<FocusStore>> {
        self.store.clone()
    }

    pub async fn get_state(&self) -> TimerState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from(&*self.state.lock().await)
    }

    /// Note attached to the next recorded session.
    pub async fn set_note(&self, note: Option<String>) {
        *self.pending_note.lock().await = note;
    }

    pub async fn switch_mode(&self, mode: TimerMode) -> TimerSnapshot {
        let config = *self.store.lock().await.timer_config();

        let snapshot = {
            let mut guard = self.state.lock().await;
            self.cancel_scheduled();
            guard.switch_mode(mode, &config);
            TimerSnapshot::from(&*guard)
        };

        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    pub async fn start(&self) -> TimerSnapshot {
        let snapshot = {
            let mut guard = self.state.lock().await;
            if !guard.is_running {
                self.cancel_scheduled();
                if guard.start() {
                    self.spawn_ticker();
                }
            }
            TimerSnapshot::from(&*guard)
        };

        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    pub async fn pause(&self) -> TimerSnapshot {
        let snapshot = {
            let mut guard = self.state.lock().await;
            self.cancel_scheduled();
            guard.pause();
            TimerSnapshot::from(&*guard)
        };

        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    pub async fn reset(&self) -> TimerSnapshot {
        let config = *self.store.lock().await.timer_config();

        let snapshot = {
            let mut guard = self.state.lock().await;
            self.cancel_scheduled();
            guard.reset(&config);
            TimerSnapshot::from(&*guard)
        };

        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    /// Ends the current block now and credits it as completed.
    pub async fn skip(&self) -> SessionCompletedEvent {
        let origin = CancellationToken::new();

        let (completion, snapshot) = {
            let mut guard = self.state.lock().await;
            let completion = guard.skip();
            self.replace_scheduled(Scheduled {
                token: origin.clone(),
                handle: None,
            });
            (completion, TimerSnapshot::from(&*guard))
        };

        self.emit(TimerEvent::StateChanged(snapshot));
        self.handle_completion(completion, &origin).await
    }

    pub async fn add_time(&self, delta_minutes: i64) -> TimerSnapshot {
        let snapshot = {
            let mut guard = self.state.lock().await;
            if guard.add_time(delta_minutes) {
                self.cancel_scheduled();
            }
            TimerSnapshot::from(&*guard)
        };

        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    /// Cancels the ticker or pending auto-start and waits for it to exit.
    pub async fn shutdown(&self) {
        let pending = self.take_scheduled();
        if let Some(Scheduled { token, handle }) = pending {
            token.cancel();
            let Some(handle) = handle else { return };
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    log_error!("Timer task failed during shutdown: {err}");
                }
            }
        }
    }

    fn spawn_ticker(&self) {
        let token = CancellationToken::new();
        let controller = self.clone();
        let task_token = token.clone();

        let handle = tokio::spawn(async move { controller.run_ticker(task_token).await });
        self.replace_scheduled(Scheduled {
            token,
            handle: Some(handle),
        });
    }

    async fn run_ticker(self, token: CancellationToken) {
        let mut interval = time::interval_at(
            time::Instant::now() + self.tick_interval,
            self.tick_interval,
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            let (completion, snapshot) = {
                let mut guard = self.state.lock().await;
                // A transition may have superseded this countdown while we waited.
                if token.is_cancelled() || !guard.is_running {
                    break;
                }
                let completion = guard.tick();
                (completion, TimerSnapshot::from(&*guard))
            };

            self.emit(TimerEvent::Tick(snapshot));

            if let Some(completion) = completion {
                self.handle_completion(completion, &token).await;
                break;
            }
        }
    }

    /// Records the block and proposes the next one. `origin` is the token of the
    /// countdown that produced it; once cancelled, no auto-start is scheduled.
    async fn handle_completion(
        &self,
        completion: Completion,
        origin: &CancellationToken,
    ) -> SessionCompletedEvent {
        let note = self.pending_note.lock().await.take();

        let (event, settings, warnings) = {
            let mut store = self.store.lock().await;
            let credited = store.timer_config().duration_for(completion.mode);
            let record = CompletionRecord::for_active_subject(
                &store,
                completion.mode,
                credited,
                completion.growth,
                note,
            );
            let session = store.record_completion(record);
            let event = SessionCompletedEvent {
                mode: completion.mode,
                subject_name: session.subject_name.clone(),
                session,
            };
            (event, store.settings().clone(), store.take_warnings())
        };

        for warning in warnings {
            self.emit(TimerEvent::StorageWarning(warning));
        }

        log_info!(
            "{} block completed for {}",
            completion.mode.label(),
            event.subject_name
        );
        self.emit(TimerEvent::SessionCompleted(event.clone()));

        if let Some(next) = self.next_mode(completion.mode, &settings) {
            self.schedule_auto_chain(next, origin);
        }

        event
    }

    fn next_mode(&self, completed: TimerMode, settings: &AppSettings) -> Option<TimerMode> {
        match completed {
            TimerMode::Work => {
                let count = self.completed_work.fetch_add(1, Ordering::SeqCst) + 1;
                settings
                    .auto_start_breaks
                    .then(|| break_after(count, settings.long_break_interval))
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => {
                settings.auto_start_pomodoros.then_some(TimerMode::Work)
            }
        }
    }

    fn schedule_auto_chain(&self, mode: TimerMode, origin: &CancellationToken) {
        let mut slot = self.lock_scheduled();
        // A manual transition since the completion owns the timer now.
        if origin.is_cancelled() {
            log_info!("Auto-start of {} dropped after manual transition", mode.label());
            return;
        }

        let token = CancellationToken::new();
        let controller = self.clone();
        let task_token = token.clone();
        let delay = self.auto_chain_delay;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => return,
                _ = time::sleep(delay) => {}
            }
            controller.auto_chain(mode, task_token).await;
        });

        let next = Scheduled {
            token,
            handle: Some(handle),
        };
        if let Some(previous) = slot.replace(next) {
            previous.token.cancel();
        }
    }

    async fn auto_chain(&self, mode: TimerMode, token: CancellationToken) {
        let config = *self.store.lock().await.timer_config();

        let snapshot = {
            let mut guard = self.state.lock().await;
            if token.is_cancelled() {
                return;
            }
            guard.switch_mode(mode, &config);
            if guard.start() {
                self.spawn_ticker();
            }
            TimerSnapshot::from(&*guard)
        };

        log_info!("Auto-started {}", mode.label());
        self.emit(TimerEvent::StateChanged(snapshot));
    }

    fn replace_scheduled(&self, next: Scheduled) {
        if let Some(previous) = self.lock_scheduled().replace(next) {
            previous.token.cancel();
        }
    }

    /// Cancels while holding the slot, so a concurrent completion either sees
    /// its origin cancelled or has its auto-start cancelled here.
    fn cancel_scheduled(&self) {
        let mut slot = self.lock_scheduled();
        if let Some(previous) = slot.take() {
            previous.token.cancel();
        }
    }

    fn take_scheduled(&self) -> Option<Scheduled> {
        self.lock_scheduled().take()
    }

    fn lock_scheduled(&self) -> MutexGuard<'_, Option<Scheduled>> {
        match self.scheduled.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: TimerEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::Scope,
        settings::{AppSettings, TimerConfig},
        store::MemoryBackend,
    };

    fn controller_with(
        timer_config: TimerConfig,
        settings: AppSettings,
    ) -> (TimerController, mpsc::UnboundedReceiver<TimerEvent>) {
        let mut store = FocusStore::open(Arc::new(MemoryBackend::new()), Scope::Anonymous);
        store.save_timer_config(timer_config).unwrap();
        store.save_settings(settings);
        TimerController::new(store, &AppConfig::default())
    }

    fn default_controller() -> (TimerController, mpsc::UnboundedReceiver<TimerEvent>) {
        controller_with(TimerConfig::default(), AppSettings::default())
    }

    fn completions(rx: &mut mpsc::UnboundedReceiver<TimerEvent>) -> Vec<SessionCompletedEvent> {
        let mut found = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let TimerEvent::SessionCompleted(done) = event {
                found.push(done);
            }
        }
        found
    }

    async fn advance_secs(secs: f64) {
        time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_work_block_completes_once() {
        let (controller, mut rx) = default_controller();
        controller.start().await;

        advance_secs(1500.5).await;
        // Nothing more may fire once exhausted.
        advance_secs(30.0).await;

        let done = completions(&mut rx);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].mode, TimerMode::Work);
        assert_eq!(done[0].session.duration, 1500);
        assert_eq!(done[0].subject_name, "General Focus");

        let state = controller.get_state().await;
        assert_eq!(state.time_left, 0);
        assert!(!state.is_running);

        let store = controller.store();
        let store = store.lock().await;
        assert_eq!(store.stats().total_focus_time, 1500);
        assert_eq!(store.stats().trees_grown, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_break_credits_configured_duration() {
        let (controller, mut rx) = default_controller();
        controller.switch_mode(TimerMode::ShortBreak).await;
        controller.start().await;
        advance_secs(10.5).await;

        let event = controller.skip().await;
        assert_eq!(event.mode, TimerMode::ShortBreak);
        assert_eq!(event.session.duration, 300);
        assert_eq!(event.title(), "Break Over!");

        advance_secs(5.0).await;
        assert_eq!(completions(&mut rx).len(), 1);
        let state = controller.get_state().await;
        assert_eq!(state.time_left, 0);
        assert!(!state.is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_the_tick() {
        let (controller, _rx) = default_controller();
        controller.start().await;
        advance_secs(10.5).await;

        let paused = controller.pause().await;
        assert_eq!(paused.state.time_left, 1490);

        advance_secs(100.0).await;
        assert_eq!(controller.get_state().await.time_left, 1490);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_keeps_a_single_ticker() {
        let (controller, _rx) = default_controller();
        controller.start().await;
        controller.start().await;
        advance_secs(0.5).await;
        controller.start().await;

        advance_secs(10.0).await;
        assert_eq!(controller.get_state().await.time_left, 1490);
    }

    #[tokio::test(start_paused = true)]
    async fn mode_switch_stops_a_running_countdown() {
        let (controller, _rx) = default_controller();
        controller.start().await;
        advance_secs(5.5).await;

        let switched = controller.switch_mode(TimerMode::LongBreak).await;
        assert_eq!(switched.state.time_left, 900);
        assert_eq!(switched.state.progress, 100.0);
        assert!(!switched.state.is_running);

        advance_secs(20.0).await;
        assert_eq!(controller.get_state().await.time_left, 900);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_start_breaks_chains_into_short_break() {
        let settings = AppSettings {
            auto_start_breaks: true,
            ..AppSettings::default()
        };
        let config = TimerConfig::from_minutes(1, 1, 2).unwrap();
        let (controller, mut rx) = controller_with(config, settings);
        controller.start().await;

        advance_secs(60.5).await;
        assert_eq!(completions(&mut rx).len(), 1);

        advance_secs(1.0).await;
        let state = controller.get_state().await;
        assert_eq!(state.mode, TimerMode::ShortBreak);
        assert!(state.is_running);

        advance_secs(10.0).await;
        assert_eq!(controller.get_state().await.time_left, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn long_break_follows_every_nth_work_session() {
        let settings = AppSettings {
            auto_start_breaks: true,
            long_break_interval: 2,
            ..AppSettings::default()
        };
        let config = TimerConfig::from_minutes(1, 1, 2).unwrap();
        let (controller, _rx) = controller_with(config, settings);

        controller.skip().await;
        advance_secs(1.5).await;
        assert_eq!(controller.get_state().await.mode, TimerMode::ShortBreak);

        controller.switch_mode(TimerMode::Work).await;
        controller.skip().await;
        advance_secs(1.5).await;
        let state = controller.get_state().await;
        assert_eq!(state.mode, TimerMode::LongBreak);
        assert_eq!(state.initial_time, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_switch_during_delay_cancels_auto_start() {
        let settings = AppSettings {
            auto_start_breaks: true,
            ..AppSettings::default()
        };
        let (controller, _rx) = controller_with(TimerConfig::default(), settings);

        controller.skip().await;
        controller.switch_mode(TimerMode::Work).await;
        advance_secs(5.0).await;

        let state = controller.get_state().await;
        assert_eq!(state.mode, TimerMode::Work);
        assert!(!state.is_running);
        assert_eq!(state.time_left, 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_switch_while_completion_is_recorded_wins() {
        let settings = AppSettings {
            auto_start_breaks: true,
            ..AppSettings::default()
        };
        let config = TimerConfig::from_minutes(1, 1, 2).unwrap();
        let (controller, mut rx) = controller_with(config, settings);
        controller.start().await;

        // Hold the recorder back so the switch lands between exhaustion and scheduling.
        let note = controller.pending_note.lock().await;
        advance_secs(60.5).await;
        assert_eq!(controller.get_state().await.time_left, 0);
        controller.switch_mode(TimerMode::Work).await;
        drop(note);

        advance_secs(5.0).await;
        assert_eq!(completions(&mut rx).len(), 1);
        let state = controller.get_state().await;
        assert_eq!(state.mode, TimerMode::Work);
        assert!(!state.is_running);
        assert_eq!(state.time_left, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_while_skip_is_recorded_wins() {
        let settings = AppSettings {
            auto_start_breaks: true,
            ..AppSettings::default()
        };
        let config = TimerConfig::from_minutes(1, 1, 2).unwrap();
        let (controller, _rx) = controller_with(config, settings);

        let note = controller.pending_note.lock().await;
        let skipping = tokio::spawn({
            let controller = controller.clone();
            async move { controller.skip().await }
        });
        advance_secs(0.1).await;
        controller.reset().await;
        drop(note);

        let event = skipping.await.unwrap();
        assert_eq!(event.mode, TimerMode::Work);
        advance_secs(5.0).await;

        let state = controller.get_state().await;
        assert_eq!(state.mode, TimerMode::Work);
        assert!(!state.is_running);
        assert_eq!(state.time_left, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn break_completion_chains_back_to_work_when_enabled() {
        let settings = AppSettings {
            auto_start_pomodoros: true,
            ..AppSettings::default()
        };
        let (controller, _rx) = controller_with(TimerConfig::default(), settings);

        controller.switch_mode(TimerMode::ShortBreak).await;
        controller.skip().await;
        advance_secs(1.5).await;

        let state = controller.get_state().await;
        assert_eq!(state.mode, TimerMode::Work);
        assert!(state.is_running);
        controller.shutdown().await;
        assert!(controller.get_state().await.is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn note_and_active_subject_land_on_the_session() {
        let (controller, _rx) = default_controller();
        {
            let store = controller.store();
            let mut store = store.lock().await;
            let subject = store.add_subject("Physics", None).unwrap();
            store.set_active_subject(Some(subject.id.as_str())).unwrap();
        }
        controller.set_note(Some("kinematics".into())).await;

        let event = controller.skip().await;
        assert_eq!(event.subject_name, "Physics");
        assert_eq!(event.session.note.as_deref(), Some("kinematics"));
        assert_eq!(event.body(), "Great job! You focused on Physics.");
        // Skipped before any tick: no growth, no tree.
        assert_eq!(event.session.tree_growth, 0.0);

        let store = controller.store();
        let store = store.lock().await;
        assert_eq!(store.active_subject().unwrap().total_focus_time, 1500);
        assert_eq!(store.stats().trees_grown, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn add_time_extends_a_paused_countdown() {
        let (controller, _rx) = default_controller();
        let snapshot = controller.add_time(5).await;
        assert_eq!(snapshot.state.time_left, 1800);
        assert_eq!(snapshot.state.initial_time, 1800);
        assert_eq!(snapshot.formatted_time, "30:00");
    }

    #[test]
    fn break_cadence() {
        assert_eq!(break_after(1, 4), TimerMode::ShortBreak);
        assert_eq!(break_after(4, 4), TimerMode::LongBreak);
        assert_eq!(break_after(8, 4), TimerMode::LongBreak);
        assert_eq!(break_after(4, 0), TimerMode::ShortBreak);
    }
}
