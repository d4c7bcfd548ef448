use crate::{identity::User, log_info, AppState};

const ENABLE_LOGS: bool = true;

pub async fn current_user(state: &AppState) -> Result<Option<User>, String> {
    let identity = state.identity.lock().await;
    Ok(identity.current().cloned())
}

pub async fn signup(state: &AppState, username: String, password: String) -> Result<User, String> {
    let user = {
        let mut identity = state.identity.lock().await;
        identity
            .signup(&username, &password)
            .map_err(|e| e.to_string())?
    };
    reload_scope(state).await;
    Ok(user)
}

pub async fn login(state: &AppState, username: String, password: String) -> Result<User, String> {
    let user = {
        let mut identity = state.identity.lock().await;
        identity
            .login(&username, &password)
            .map_err(|e| e.to_string())?
    };
    reload_scope(state).await;
    Ok(user)
}

pub async fn login_as_guest(state: &AppState) -> Result<User, String> {
    let user = {
        let mut identity = state.identity.lock().await;
        identity.login_as_guest().map_err(|e| e.to_string())?
    };
    reload_scope(state).await;
    Ok(user)
}

pub async fn logout(state: &AppState) -> Result<(), String> {
    {
        let mut identity = state.identity.lock().await;
        identity.logout();
    }
    reload_scope(state).await;
    Ok(())
}

/// Points the store at the current identity's domain and resets the countdown to
/// that domain's durations.
async fn reload_scope(state: &AppState) {
    let scope = state.identity.lock().await.scope();
    {
        let store = state.store();
        let mut store = store.lock().await;
        store.switch_scope(scope);
    }
    state.timer.reset().await;
    log_info!("Storage scope reloaded");
}
