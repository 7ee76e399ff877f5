use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::sync::Mutex;

use super::{Effect, WizardError, WizardMode, WizardState};
use crate::api::{ApiClient, ApiError, CreateCampaignResponse};
use crate::selection::{EmailFilters, QuickSelect};
use crate::targeting::{CriteriaInput, Debouncer, LoadOutcome, PoolRequest, TargetingMode};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Async driver pairing a [`WizardState`] with the API client. It runs the
/// effects returned by each transition and owns the criteria debouncer.
pub struct WizardSession {
    state: Arc<Mutex<WizardState>>,
    api: ApiClient,
    debouncer: Debouncer,
}

impl WizardSession {
    pub fn new(api: ApiClient, mode: WizardMode, debounce: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(WizardState::new(mode))),
            api,
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn state(&self) -> Arc<Mutex<WizardState>> {
        self.state.clone()
    }

    pub async fn snapshot(&self) -> WizardState {
        self.state.lock().await.clone()
    }

    /// Applies `f` to the state and runs whatever effects it requested.
    pub async fn update<F>(&self, f: F) -> Result<(), WizardError>
    where
        F: FnOnce(&mut WizardState) -> Result<Vec<Effect>, WizardError>,
    {
        let effects = {
            let mut state = self.state.lock().await;
            f(&mut state)?
        };
        run_effects(&self.state, &self.api, effects).await;
        Ok(())
    }

    pub async fn open(&self) {
        let effects = self.state.lock().await.open();
        run_effects(&self.state, &self.api, effects).await;
    }

    pub async fn close(&mut self) {
        self.debouncer.cancel();
        self.state.lock().await.close();
    }

    pub async fn switch_mode(&self, mode: TargetingMode) -> Result<(), WizardError> {
        self.update(|s| s.switch_mode(mode)).await
    }

    pub async fn select_objective(&self, id: &str) -> Result<(), WizardError> {
        self.update(|s| s.select_objective(id)).await
    }

    pub async fn select_segment(&self, id: i64) -> Result<(), WizardError> {
        self.update(|s| s.select_segment(id)).await
    }

    pub async fn toggle_group(&self, id: i64, checked: bool) -> Result<(), WizardError> {
        self.update(|s| s.toggle_group(id, checked)).await
    }

    /// Stores the criteria and (re)arms the debounced load. The load only
    /// goes out if criteria are still the active mode when the timer fires.
    pub async fn edit_criteria(&mut self, input: CriteriaInput) -> Result<(), WizardError> {
        self.state.lock().await.edit_criteria(input)?;
        let state = self.state.clone();
        let api = self.api.clone();
        self.debouncer.schedule(async move {
            let request = state.lock().await.criteria_request();
            if let Some(request) = request {
                load_pool(&state, &api, request).await;
            }
        });
        Ok(())
    }

    /// Waits for a pending debounced load.
    pub async fn settle(&mut self) {
        self.debouncer.flush().await;
    }

    pub async fn toggle_company(&self, id: i64, checked: bool) -> Result<(), WizardError> {
        self.state.lock().await.toggle_company(id, checked)
    }

    pub async fn quick_select_companies(&self, mode: QuickSelect) -> Result<(), WizardError> {
        self.state.lock().await.quick_select_companies(mode)
    }

    pub async fn set_email_filters(&self, filters: EmailFilters) {
        self.state.lock().await.set_email_filters(filters);
    }

    pub async fn quick_select_recipients(&self, mode: QuickSelect) -> Result<(), WizardError> {
        self.state.lock().await.quick_select_recipients(mode)
    }

    pub async fn next(&self) -> Result<(), WizardError> {
        self.update(|s| s.next()).await
    }

    pub async fn prev(&self) {
        self.state.lock().await.prev();
    }

    pub async fn go_to(&self, number: u8) -> Result<(), WizardError> {
        self.update(|s| s.go_to(number)).await
    }

    /// Validates against the local clock, posts the campaign and resets the
    /// wizard on success. Nothing is sent when validation fails.
    pub async fn submit(&mut self) -> Result<CreateCampaignResponse, SubmitError> {
        let draft = self.state.lock().await.build_draft(&Local::now())?;
        let response = self.api.create_campaign(&draft).await?;
        tracing::info!(
            campagne_id = ?response.campagne_id,
            recipients = draft.recipients.len(),
            "campaign created"
        );
        self.close().await;
        Ok(response)
    }
}

async fn run_effects(state: &Arc<Mutex<WizardState>>, api: &ApiClient, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::LoadOptions => load_options(state, api).await,
            Effect::LoadPool(request) => load_pool(state, api, request).await,
            Effect::LoadTemplates => match api.templates().await {
                Ok(templates) => state.lock().await.set_templates(templates),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load templates");
                    state.lock().await.set_templates(Vec::new());
                }
            },
            Effect::ResetScheduleToNow => {
                state.lock().await.reset_schedule(Local::now().naive_local());
            }
        }
    }
}

async fn load_options(state: &Arc<Mutex<WizardState>>, api: &ApiClient) {
    let (objectives, segments, groups, suggestions) = futures::join!(
        api.objectives(),
        api.segments(),
        api.groups(),
        api.suggestions()
    );
    let mut state = state.lock().await;
    match objectives {
        Ok(v) => state.set_objectives(v),
        Err(e) => tracing::warn!(error = %e, "failed to load objectives"),
    }
    match segments {
        Ok(v) => state.set_segments(v),
        Err(e) => tracing::warn!(error = %e, "failed to load segments"),
    }
    match groups {
        Ok(v) => state.set_groups(v),
        Err(e) => tracing::warn!(error = %e, "failed to load groups"),
    }
    match suggestions {
        Ok(v) => state.set_suggestions(v),
        Err(e) => tracing::warn!(error = %e, "failed to load criteria suggestions"),
    }
}

// The lock is released while the request is in flight so that newer
// transitions can supersede it.
async fn load_pool(state: &Arc<Mutex<WizardState>>, api: &ApiClient, request: PoolRequest) {
    let result = api.fetch_companies(&request.query).await;
    let outcome = state.lock().await.apply_pool(request.ticket, result);
    if let LoadOutcome::Applied { count } = outcome {
        tracing::info!(count, "candidate pool loaded");
    }
}
