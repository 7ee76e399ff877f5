pub mod debounce;

use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::model::{Company, CompanyGroup, CompanyId, CriteriaSuggestions, GroupId, Objective, Segment, SegmentId};
use crate::utils;

pub use debounce::Debouncer;

pub const NO_GROUP_SELECTED: &str = "Sélectionnez au moins un groupe";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetingMode {
    #[default]
    Toutes,
    Objectif,
    Criteres,
    Groupes,
    Segment,
}

impl TargetingMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "toutes" | "all" => Some(Self::Toutes),
            "objectif" | "objective" => Some(Self::Objectif),
            "criteres" | "critères" | "criteria" => Some(Self::Criteres),
            "groupes" | "groups" => Some(Self::Groupes),
            "segment" => Some(Self::Segment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toutes => "toutes",
            Self::Objectif => "objectif",
            Self::Criteres => "criteres",
            Self::Groupes => "groupes",
            Self::Segment => "segment",
        }
    }
}

/// Sparse filter record understood by `/api/ciblage/entreprises`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TargetingCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secteur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secteur_contains: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_string_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub opportunite: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statut: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_contains: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::model::de_loose_bool",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub favori: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_loose_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub score_securite_max: Option<i64>,
    #[serde(
        default,
        deserialize_with = "crate::model::de_loose_bool",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub exclude_already_contacted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groupe_ids: Vec<GroupId>,
}

impl TargetingCriteria {
    pub fn is_empty(&self) -> bool {
        self.to_query_pairs().is_empty()
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = Vec::new();
        if let Some(v) = utils::non_empty(self.secteur.as_deref()) {
            pairs.push(("secteur", v));
        }
        if let Some(v) = utils::non_empty(self.secteur_contains.as_deref()) {
            pairs.push(("secteur_contains", v));
        }
        if !self.opportunite.is_empty() {
            pairs.push(("opportunite", self.opportunite.join(",")));
        }
        if let Some(v) = utils::non_empty(self.statut.as_deref()) {
            pairs.push(("statut", v));
        }
        if let Some(v) = utils::non_empty(self.tags_contains.as_deref()) {
            pairs.push(("tags_contains", v));
        }
        if self.favori {
            pairs.push(("favori", "1".to_string()));
        }
        if let Some(v) = utils::non_empty(self.search.as_deref()) {
            pairs.push(("search", v));
        }
        if let Some(score) = self.score_securite_max {
            pairs.push(("score_securite_max", score.to_string()));
        }
        if self.exclude_already_contacted {
            pairs.push(("exclude_already_contacted", "1".to_string()));
        }
        if !self.groupe_ids.is_empty() {
            let ids: Vec<String> = self.groupe_ids.iter().map(|id| id.to_string()).collect();
            pairs.push(("groupe_ids", ids.join(",")));
        }
        pairs
    }
}

/// Raw text of the free-text criteria fields, as typed (autocomplete hints
/// included).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CriteriaInput {
    pub secteur: String,
    pub opportunite: String,
    pub statut: String,
    pub tags: String,
    pub score_max: String,
    pub exclude_already_contacted: bool,
}

impl CriteriaInput {
    pub fn to_criteria(&self) -> TargetingCriteria {
        let text = |raw: &str| {
            let v = utils::strip_count_suffix(raw.trim());
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        };
        let opportunite = self
            .opportunite
            .split(',')
            .map(|s| utils::strip_count_suffix(s.trim()))
            .filter(|s| !s.is_empty())
            .collect();
        TargetingCriteria {
            secteur_contains: text(&self.secteur),
            opportunite,
            statut: text(&self.statut),
            tags_contains: text(&self.tags),
            score_securite_max: self.score_max.trim().parse::<i64>().ok(),
            exclude_already_contacted: self.exclude_already_contacted,
            ..Default::default()
        }
    }
}

/// The single active source of truth for the candidate pool. Switching
/// source replaces it, criteria of different modes are never merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TargetingSource {
    #[default]
    Toutes,
    Objectif(Option<String>),
    Criteres(CriteriaInput),
    Groupes(Vec<GroupId>),
    Segment(Option<SegmentId>),
}

impl TargetingSource {
    pub fn empty(mode: TargetingMode) -> Self {
        match mode {
            TargetingMode::Toutes => Self::Toutes,
            TargetingMode::Objectif => Self::Objectif(None),
            TargetingMode::Criteres => Self::Criteres(CriteriaInput::default()),
            TargetingMode::Groupes => Self::Groupes(Vec::new()),
            TargetingMode::Segment => Self::Segment(None),
        }
    }

    pub fn mode(&self) -> TargetingMode {
        match self {
            Self::Toutes => TargetingMode::Toutes,
            Self::Objectif(_) => TargetingMode::Objectif,
            Self::Criteres(_) => TargetingMode::Criteres,
            Self::Groupes(_) => TargetingMode::Groupes,
            Self::Segment(_) => TargetingMode::Segment,
        }
    }
}

/// Option lists the targeting modes resolve against.
#[derive(Clone, Debug, Default)]
pub struct TargetingOptions {
    pub objectives: Vec<Objective>,
    pub segments: Vec<Segment>,
    pub groups: Vec<CompanyGroup>,
    pub suggestions: CriteriaSuggestions,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TargetingQuery {
    All,
    Filtered(TargetingCriteria),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Query(TargetingQuery),
    Notice(String),
    Skip,
}

pub fn resolve(source: &TargetingSource, options: &TargetingOptions) -> Resolution {
    match source {
        TargetingSource::Toutes => Resolution::Query(TargetingQuery::All),
        TargetingSource::Objectif(None) => Resolution::Skip,
        TargetingSource::Objectif(Some(id)) => {
            match options
                .objectives
                .iter()
                .find(|o| &o.id == id)
                .and_then(|o| o.filters.clone())
            {
                Some(filters) => Resolution::Query(TargetingQuery::Filtered(filters)),
                None => Resolution::Skip,
            }
        }
        TargetingSource::Criteres(input) => {
            Resolution::Query(TargetingQuery::Filtered(input.to_criteria()))
        }
        TargetingSource::Groupes(ids) if ids.is_empty() => {
            Resolution::Notice(NO_GROUP_SELECTED.to_string())
        }
        TargetingSource::Groupes(ids) => Resolution::Query(TargetingQuery::Filtered(TargetingCriteria {
            groupe_ids: ids.clone(),
            ..Default::default()
        })),
        TargetingSource::Segment(None) => Resolution::Skip,
        TargetingSource::Segment(Some(id)) => match options.segments.iter().find(|s| s.id == *id) {
            Some(segment) => Resolution::Query(TargetingQuery::Filtered(
                segment.criteres.clone().unwrap_or_default(),
            )),
            None => Resolution::Skip,
        },
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PoolRequest {
    pub ticket: LoadTicket,
    pub query: TargetingQuery,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { count: usize },
    Failed { message: String },
    Stale,
}

/// Candidate companies for the wizard. Each load carries a generation
/// ticket and only the latest one may replace the pool.
#[derive(Clone, Debug, Default)]
pub struct CompanyPool {
    companies: Vec<Company>,
    generation: u64,
    loading: bool,
    error: Option<String>,
    notice: Option<String>,
}

impl CompanyPool {
    pub fn begin(&mut self) -> LoadTicket {
        self.generation += 1;
        self.loading = true;
        LoadTicket {
            generation: self.generation,
        }
    }

    pub fn finish(&mut self, ticket: LoadTicket, result: Result<Vec<Company>, ApiError>) -> LoadOutcome {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                latest = self.generation,
                "discarding stale company load"
            );
            return LoadOutcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(companies) => {
                self.error = None;
                self.notice = None;
                self.companies = companies;
                LoadOutcome::Applied {
                    count: self.companies.len(),
                }
            }
            Err(e) => {
                let message = format!("failed to load companies: {e}");
                tracing::warn!(error = %e, "company load failed, keeping previous pool");
                self.error = Some(message.clone());
                LoadOutcome::Failed { message }
            }
        }
    }

    /// Shows an inline notice instead of results. Any in-flight load is
    /// superseded.
    pub fn show_notice(&mut self, notice: String) {
        self.generation += 1;
        self.loading = false;
        self.error = None;
        self.notice = Some(notice);
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub fn get(&self, id: CompanyId) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }
}

fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => utils::split_csv(&s),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

fn de_loose_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}
