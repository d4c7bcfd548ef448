use crate::{
    timer::{SessionCompletedEvent, TimerController, TimerMode, TimerSnapshot},
    AppState,
};

fn controller_from_state(state: &AppState) -> TimerController {
    state.timer.clone()
}

pub async fn get_timer_state(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.get_snapshot().await)
}

pub async fn switch_mode(state: &AppState, mode: TimerMode) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.switch_mode(mode).await)
}

pub async fn start_timer(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    let snapshot = controller.start().await;
    if snapshot.state.is_finished() {
        return Err("Timer has finished; switch mode or reset before starting".into());
    }
    Ok(snapshot)
}

pub async fn pause_timer(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.pause().await)
}

pub async fn reset_timer(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.reset().await)
}

pub async fn skip_timer(state: &AppState) -> Result<SessionCompletedEvent, String> {
    let controller = controller_from_state(state);
    Ok(controller.skip().await)
}

pub async fn add_time(state: &AppState, minutes: i64) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    let before = controller.get_state().await;
    if before.is_running {
        return Err("Pause the timer before adjusting its duration".into());
    }
    Ok(controller.add_time(minutes).await)
}

pub async fn set_session_note(state: &AppState, note: Option<String>) -> Result<(), String> {
    let controller = controller_from_state(state);
    let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    controller.set_note(note).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, store::MemoryBackend};

    #[tokio::test(start_paused = true)]
    async fn finished_timer_refuses_to_start_until_reset() {
        let (state, _events) =
            AppState::with_backend(AppConfig::default(), Arc::new(MemoryBackend::new()));

        skip_timer(&state).await.unwrap();
        assert!(start_timer(&state).await.is_err());

        reset_timer(&state).await.unwrap();
        let started = start_timer(&state).await.unwrap();
        assert!(started.state.is_running);
        state.timer().shutdown().await;
    }
}
