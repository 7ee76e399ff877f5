pub mod compose;
pub mod naming;
pub mod session;

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use thiserror::Error;

use crate::api::ApiError;
use crate::model::{
    Company, CompanyGroup, CompanyId, CriteriaSuggestions, GroupId, Objective, Segment, SegmentId,
    Template,
};
use crate::schedule::{self, ScheduleSlot, SuggestionKind};
use crate::selection::{
    apply_email_filters, CompanySelection, EmailFilters, QuickSelect, RecipientSelection,
    SelectionMiss,
};
use crate::targeting::{
    self, CompanyPool, CriteriaInput, LoadOutcome, LoadTicket, PoolRequest, Resolution,
    TargetingMode, TargetingOptions, TargetingQuery, TargetingSource,
};

pub use compose::{CampaignDraft, ComposeForm, SendMode};
pub use naming::{campaign_context, generate_campaign_name, CampaignContext};
pub use session::{SubmitError, WizardSession};

/// Layout of the wizard, fixed for its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WizardMode {
    /// Targeting and recipients share step 1, step 2 composes.
    TwoStep,
    #[default]
    ThreeStep,
}

impl WizardMode {
    pub fn step_count(&self) -> u8 {
        match self {
            Self::TwoStep => 2,
            Self::ThreeStep => 3,
        }
    }

    /// Header number of `step`, `None` when the layout has no such screen.
    pub fn number(&self, step: Step) -> Option<u8> {
        match (self, step) {
            (_, Step::Targeting) => Some(1),
            (Self::ThreeStep, Step::Recipients) => Some(2),
            (Self::TwoStep, Step::Recipients) => None,
            (Self::ThreeStep, Step::Compose) => Some(3),
            (Self::TwoStep, Step::Compose) => Some(2),
        }
    }

    pub fn step_at(&self, number: u8) -> Option<Step> {
        match (self, number) {
            (_, 1) => Some(Step::Targeting),
            (Self::ThreeStep, 2) => Some(Step::Recipients),
            (Self::ThreeStep, 3) | (Self::TwoStep, 2) => Some(Step::Compose),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Targeting = 1,
    Recipients = 2,
    Compose = 3,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Targeting => "targeting",
            Step::Recipients => "recipients",
            Step::Compose => "compose",
        };
        f.write_str(name)
    }
}

/// Side effects requested by a state transition. The caller performs them
/// and feeds the results back through the matching setter.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Objectives, segments, groups and criteria suggestions.
    LoadOptions,
    LoadPool(PoolRequest),
    LoadTemplates,
    ResetScheduleToNow,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("select at least one company before continuing")]
    NoCompanySelected,
    #[error("step {to} cannot be reached from step {from}")]
    StepLocked { from: u8, to: u8 },
    #[error("this wizard has no step {step}")]
    StepUnavailable { step: u8 },
    #[error("targeting can only change on the targeting step")]
    NotOnTargetingStep,
    #[error("recipients can only change on the recipient step")]
    NotOnRecipientStep,
    #[error("the message can only change on the compose step")]
    NotOnComposeStep,
    #[error("unknown objective '{id}'")]
    UnknownObjective { id: String },
    #[error("unknown segment {id}")]
    UnknownSegment { id: SegmentId },
    #[error("unknown group {id}")]
    UnknownGroup { id: GroupId },
    #[error("company {id} is not in the current view")]
    UnknownCompany { id: CompanyId },
    #[error("company {company_id} has no email #{index} in the current view")]
    UnknownEmail { company_id: CompanyId, index: usize },
    #[error("unknown template '{id}'")]
    UnknownTemplate { id: String },
    #[error("the email subject is required")]
    MissingSubject,
    #[error("choose a date and a time to schedule the campaign")]
    MissingSchedule,
    #[error("the scheduled time does not exist in the local time zone")]
    InvalidScheduleTime,
    #[error("the scheduled time must be in the future")]
    ScheduleInPast,
    #[error("select at least one recipient")]
    NoRecipients,
    #[error("select a template or write a custom message")]
    MissingMessage,
}

impl From<SelectionMiss> for WizardError {
    fn from(miss: SelectionMiss) -> Self {
        match miss {
            SelectionMiss::Company(id) => WizardError::UnknownCompany { id },
            SelectionMiss::Email { company_id, index } => {
                WizardError::UnknownEmail { company_id, index }
            }
        }
    }
}

/// Whole campaign-creation state. Every transition is a method returning
/// the effects to run; nothing here performs I/O.
#[derive(Clone, Debug)]
pub struct WizardState {
    mode: WizardMode,
    step: Step,
    source: TargetingSource,
    options: TargetingOptions,
    pool: CompanyPool,
    search: String,
    companies: CompanySelection,
    email_filters: EmailFilters,
    displayed: Vec<Company>,
    recipients: RecipientSelection,
    templates: Vec<Template>,
    compose: ComposeForm,
}

impl WizardState {
    pub fn new(mode: WizardMode) -> Self {
        Self {
            mode,
            step: Step::Targeting,
            source: TargetingSource::Toutes,
            options: TargetingOptions::default(),
            pool: CompanyPool::default(),
            search: String::new(),
            companies: CompanySelection::default(),
            email_filters: EmailFilters::default(),
            displayed: Vec::new(),
            recipients: RecipientSelection::default(),
            templates: Vec::new(),
            compose: ComposeForm::default(),
        }
    }

    pub fn open(&mut self) -> Vec<Effect> {
        *self = Self::new(self.mode);
        let ticket = self.pool.begin();
        vec![
            Effect::LoadOptions,
            Effect::LoadPool(PoolRequest {
                ticket,
                query: TargetingQuery::All,
            }),
        ]
    }

    /// Cancel or post-submit reset. Loaded option lists are kept.
    pub fn close(&mut self) {
        let options = std::mem::take(&mut self.options);
        *self = Self::new(self.mode);
        self.options = options;
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn step_number(&self) -> u8 {
        self.mode.number(self.step).unwrap_or(1)
    }

    pub fn source(&self) -> &TargetingSource {
        &self.source
    }

    pub fn options(&self) -> &TargetingOptions {
        &self.options
    }

    pub fn pool(&self) -> &CompanyPool {
        &self.pool
    }

    pub fn company_selection(&self) -> &CompanySelection {
        &self.companies
    }

    pub fn email_filters(&self) -> &EmailFilters {
        &self.email_filters
    }

    pub fn displayed(&self) -> &[Company] {
        &self.displayed
    }

    pub fn recipients(&self) -> &RecipientSelection {
        &self.recipients
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn compose(&self) -> &ComposeForm {
        &self.compose
    }

    pub fn set_objectives(&mut self, objectives: Vec<Objective>) {
        self.options.objectives = objectives;
    }

    pub fn set_segments(&mut self, segments: Vec<Segment>) {
        self.options.segments = segments;
    }

    pub fn set_groups(&mut self, groups: Vec<CompanyGroup>) {
        self.options.groups = groups;
    }

    pub fn set_suggestions(&mut self, suggestions: CriteriaSuggestions) {
        self.options.suggestions = suggestions;
    }

    pub fn set_templates(&mut self, templates: Vec<Template>) {
        self.templates = templates;
    }

    // ---- targeting ----

    /// Replaces the active source with an empty one of `mode`. Only modes
    /// without an input of their own reload right away.
    pub fn switch_mode(&mut self, mode: TargetingMode) -> Result<Vec<Effect>, WizardError> {
        self.require_step(Step::Targeting, WizardError::NotOnTargetingStep)?;
        if self.source.mode() == mode {
            return Ok(Vec::new());
        }
        self.source = TargetingSource::empty(mode);
        match mode {
            TargetingMode::Toutes | TargetingMode::Groupes => Ok(self.reload()),
            _ => Ok(Vec::new()),
        }
    }

    pub fn select_objective(&mut self, id: &str) -> Result<Vec<Effect>, WizardError> {
        self.require_step(Step::Targeting, WizardError::NotOnTargetingStep)?;
        if !self.options.objectives.iter().any(|o| o.id == id) {
            return Err(WizardError::UnknownObjective { id: id.to_string() });
        }
        self.source = TargetingSource::Objectif(Some(id.to_string()));
        Ok(self.reload())
    }

    pub fn select_segment(&mut self, id: SegmentId) -> Result<Vec<Effect>, WizardError> {
        self.require_step(Step::Targeting, WizardError::NotOnTargetingStep)?;
        if !self.options.segments.iter().any(|s| s.id == id) {
            return Err(WizardError::UnknownSegment { id });
        }
        self.source = TargetingSource::Segment(Some(id));
        Ok(self.reload())
    }

    pub fn toggle_group(&mut self, id: GroupId, checked: bool) -> Result<Vec<Effect>, WizardError> {
        self.require_step(Step::Targeting, WizardError::NotOnTargetingStep)?;
        if !self.options.groups.iter().any(|g| g.id == id) {
            return Err(WizardError::UnknownGroup { id });
        }
        let mut ids = match std::mem::take(&mut self.source) {
            TargetingSource::Groupes(ids) => ids,
            _ => Vec::new(),
        };
        match (checked, ids.iter().position(|g| *g == id)) {
            (true, None) => ids.push(id),
            (false, Some(pos)) => {
                ids.remove(pos);
            }
            _ => {}
        }
        self.source = TargetingSource::Groupes(ids);
        Ok(self.reload())
    }

    /// Stores the typed criteria. The load itself is debounced by the
    /// caller and issued through [`WizardState::criteria_request`].
    pub fn edit_criteria(&mut self, input: CriteriaInput) -> Result<(), WizardError> {
        self.require_step(Step::Targeting, WizardError::NotOnTargetingStep)?;
        self.source = TargetingSource::Criteres(input);
        Ok(())
    }

    /// Load for the current criteria, if criteria are still the active
    /// source.
    pub fn criteria_request(&mut self) -> Option<PoolRequest> {
        if self.step != Step::Targeting || self.source.mode() != TargetingMode::Criteres {
            tracing::debug!(mode = self.source.mode().as_str(), "criteria load dropped");
            return None;
        }
        match self.reload().into_iter().next() {
            Some(Effect::LoadPool(request)) => Some(request),
            _ => None,
        }
    }

    /// Resolves the active source against the loaded options.
    pub fn reload(&mut self) -> Vec<Effect> {
        match targeting::resolve(&self.source, &self.options) {
            Resolution::Query(query) => {
                let ticket = self.pool.begin();
                tracing::debug!(mode = self.source.mode().as_str(), "loading candidate companies");
                vec![Effect::LoadPool(PoolRequest { ticket, query })]
            }
            Resolution::Notice(notice) => {
                self.pool.show_notice(notice);
                self.companies.clear();
                self.refresh_view();
                Vec::new()
            }
            Resolution::Skip => Vec::new(),
        }
    }

    pub fn apply_pool(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Company>, ApiError>,
    ) -> LoadOutcome {
        let outcome = self.pool.finish(ticket, result);
        if let LoadOutcome::Applied { .. } = outcome {
            self.companies.clear();
            self.refresh_view();
        }
        outcome
    }

    // ---- step 1 ----

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.trim().to_lowercase();
        if self.mode == WizardMode::TwoStep {
            self.refresh_view();
        }
    }

    /// Companies rendered on step 1: the pool narrowed by the search term,
    /// limited to companies with at least one email.
    pub fn visible_companies(&self) -> Vec<&Company> {
        if self.pool.notice().is_some() {
            return Vec::new();
        }
        let term = self.search.as_str();
        self.pool
            .companies()
            .iter()
            .filter(|c| !c.emails.is_empty())
            .filter(|c| {
                term.is_empty()
                    || c.nom.to_lowercase().contains(term)
                    || c.sector().map(|s| s.to_lowercase().contains(term)).unwrap_or(false)
                    || c.emails.iter().any(|e| e.email.to_lowercase().contains(term))
            })
            .collect()
    }

    pub fn toggle_company(&mut self, id: CompanyId, checked: bool) -> Result<(), WizardError> {
        self.require_visible_company(id)?;
        self.companies.toggle(id, checked);
        self.drop_deselected_recipients();
        Ok(())
    }

    pub fn click_company_card(&mut self, id: CompanyId) -> Result<bool, WizardError> {
        self.require_visible_company(id)?;
        let checked = self.companies.flip(id);
        self.drop_deselected_recipients();
        Ok(checked)
    }

    pub fn quick_select_companies(&mut self, mode: QuickSelect) -> Result<(), WizardError> {
        self.require_step(Step::Targeting, WizardError::NotOnTargetingStep)?;
        let visible: Vec<CompanyId> = self.visible_companies().iter().map(|c| c.id).collect();
        self.companies.quick_select(&visible, mode);
        self.drop_deselected_recipients();
        Ok(())
    }

    /// Drops recipients whose company is no longer checked.
    fn drop_deselected_recipients(&mut self) {
        if self.mode == WizardMode::ThreeStep {
            let companies = &self.companies;
            let selected = self.pool.companies().iter().filter(|c| companies.contains(c.id));
            self.recipients.retain_listed(selected);
        }
    }

    fn require_visible_company(&self, id: CompanyId) -> Result<(), WizardError> {
        self.require_step(Step::Targeting, WizardError::NotOnTargetingStep)?;
        if self.visible_companies().iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(WizardError::UnknownCompany { id })
        }
    }

    // ---- recipients ----

    /// Whether recipient checkboxes are on screen for the current step.
    pub fn recipient_view_active(&self) -> bool {
        match self.mode {
            WizardMode::ThreeStep => self.step == Step::Recipients,
            WizardMode::TwoStep => self.step == Step::Targeting,
        }
    }

    pub fn set_email_filters(&mut self, filters: EmailFilters) {
        self.email_filters = filters;
        if self.recipient_view_active() {
            self.refresh_view();
        }
    }

    pub fn toggle_email(
        &mut self,
        company_id: CompanyId,
        index: usize,
        checked: bool,
    ) -> Result<(), WizardError> {
        self.require_recipient_view()?;
        self.recipients
            .toggle_email(&self.displayed, company_id, index, checked)?;
        Ok(())
    }

    pub fn click_email(&mut self, company_id: CompanyId, index: usize) -> Result<bool, WizardError> {
        self.require_recipient_view()?;
        Ok(self.recipients.flip_email(&self.displayed, company_id, index)?)
    }

    pub fn toggle_company_emails(&mut self, company_id: CompanyId, checked: bool) -> Result<(), WizardError> {
        self.require_recipient_view()?;
        self.recipients
            .toggle_company(&self.displayed, company_id, checked)?;
        Ok(())
    }

    pub fn click_recipient_card(&mut self, company_id: CompanyId) -> Result<bool, WizardError> {
        self.require_recipient_view()?;
        Ok(self.recipients.flip_company(&self.displayed, company_id)?)
    }

    pub fn quick_select_recipients(&mut self, mode: QuickSelect) -> Result<(), WizardError> {
        self.require_recipient_view()?;
        self.recipients.quick_select(&self.displayed, mode);
        Ok(())
    }

    fn require_recipient_view(&self) -> Result<(), WizardError> {
        if self.recipient_view_active() {
            Ok(())
        } else {
            Err(WizardError::NotOnRecipientStep)
        }
    }

    /// Recomputes the recipient view and drops selections that fell out of
    /// it.
    fn refresh_view(&mut self) {
        let view = match self.mode {
            WizardMode::ThreeStep => {
                let selected = self
                    .pool
                    .companies()
                    .iter()
                    .filter(|c| self.companies.contains(c.id));
                apply_email_filters(selected, &self.email_filters)
            }
            WizardMode::TwoStep => {
                apply_email_filters(self.visible_companies(), &self.email_filters)
            }
        };
        self.recipients.retain_visible(&view);
        self.displayed = view;
    }

    // ---- navigation ----

    pub fn next(&mut self) -> Result<Vec<Effect>, WizardError> {
        match (self.mode, self.step) {
            (WizardMode::ThreeStep, Step::Targeting) => {
                if self.companies.is_empty() {
                    return Err(self.refuse(WizardError::NoCompanySelected));
                }
                self.recipients.clear();
                self.step = Step::Recipients;
                self.refresh_view();
                Ok(Vec::new())
            }
            (WizardMode::TwoStep, Step::Targeting) | (_, Step::Recipients) => {
                Ok(self.enter_compose())
            }
            (_, Step::Compose) => Ok(Vec::new()),
        }
    }

    pub fn prev(&mut self) {
        self.step = match (self.mode, self.step) {
            (WizardMode::ThreeStep, Step::Compose) => Step::Recipients,
            _ => Step::Targeting,
        };
    }

    /// Header click on step `number`.
    pub fn go_to(&mut self, number: u8) -> Result<Vec<Effect>, WizardError> {
        let target = self
            .mode
            .step_at(number)
            .ok_or_else(|| self.refuse(WizardError::StepUnavailable { step: number }))?;
        match target {
            Step::Targeting => {
                self.step = Step::Targeting;
                Ok(Vec::new())
            }
            Step::Recipients => {
                if self.companies.is_empty() {
                    return Err(self.refuse(WizardError::NoCompanySelected));
                }
                self.step = Step::Recipients;
                self.refresh_view();
                Ok(Vec::new())
            }
            Step::Compose if self.step == Step::Compose => Ok(Vec::new()),
            Step::Compose => {
                if self.mode == WizardMode::ThreeStep && self.step < Step::Recipients {
                    return Err(self.refuse(WizardError::StepLocked {
                        from: self.step_number(),
                        to: number,
                    }));
                }
                Ok(self.enter_compose())
            }
        }
    }

    fn enter_compose(&mut self) -> Vec<Effect> {
        self.step = Step::Compose;
        vec![Effect::LoadTemplates, Effect::ResetScheduleToNow]
    }

    fn refuse(&self, err: WizardError) -> WizardError {
        tracing::debug!(step = %self.step, error = %err, "transition refused");
        err
    }

    fn require_step(&self, step: Step, err: WizardError) -> Result<(), WizardError> {
        if self.step == step {
            Ok(())
        } else {
            Err(err)
        }
    }

    // ---- compose ----

    pub fn compose_mut(&mut self) -> Result<&mut ComposeForm, WizardError> {
        self.require_step(Step::Compose, WizardError::NotOnComposeStep)?;
        Ok(&mut self.compose)
    }

    pub fn reset_schedule(&mut self, now: NaiveDateTime) {
        self.compose.reset_schedule_to(now);
    }

    /// Picks a template, or the custom message when `id` is `None`. A
    /// template fills the subject, a plain-text one also fills the body.
    pub fn select_template(&mut self, id: Option<&str>) -> Result<(), WizardError> {
        self.require_step(Step::Compose, WizardError::NotOnComposeStep)?;
        let id = match id.map(str::trim).filter(|i| !i.is_empty()) {
            Some(id) => id,
            None => {
                self.compose.template_id = None;
                return Ok(());
            }
        };
        let template = self
            .templates
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| WizardError::UnknownTemplate { id: id.to_string() })?;
        self.compose.template_id = Some(template.id.clone());
        self.compose.sujet = template.subject.clone().unwrap_or_default();
        self.compose.custom_message = if template.is_html {
            String::new()
        } else {
            template.content.clone().unwrap_or_default()
        };
        Ok(())
    }

    pub fn apply_suggestion(
        &mut self,
        kind: SuggestionKind,
        now: NaiveDateTime,
    ) -> Result<ScheduleSlot, WizardError> {
        self.require_step(Step::Compose, WizardError::NotOnComposeStep)?;
        let slot = schedule::suggested_slot(kind, now);
        self.compose.apply_slot(&slot);
        Ok(slot)
    }

    /// Sector and company used to name the campaign. Falls back to the
    /// owners of the selected recipients when no company is checked.
    pub fn campaign_context(&self) -> CampaignContext {
        if !self.companies.is_empty() {
            return naming::campaign_context(self.pool.companies(), self.companies.ids());
        }
        let mut owners: Vec<CompanyId> = Vec::new();
        for r in self.recipients.recipients() {
            if !owners.contains(&r.entreprise_id) {
                owners.push(r.entreprise_id);
            }
        }
        naming::campaign_context(self.pool.companies(), &owners)
    }

    pub fn campaign_name(&self) -> String {
        if let Some(nom) = self.compose.nom.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return nom.to_string();
        }
        let template_name = self
            .compose
            .template_id
            .as_deref()
            .and_then(|id| self.templates.iter().find(|t| t.id == id))
            .map(|t| t.label());
        let ctx = self.campaign_context();
        generate_campaign_name(
            template_name,
            self.recipients.len(),
            ctx.sector_label.as_deref(),
            ctx.company_label.as_deref(),
        )
    }

    /// Validated request body for the submit endpoint.
    pub fn build_draft<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<CampaignDraft, WizardError> {
        self.require_step(Step::Compose, WizardError::NotOnComposeStep)?;
        self.compose
            .build_draft(self.campaign_name(), self.recipients.recipients(), now)
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new(WizardMode::default())
    }
}
