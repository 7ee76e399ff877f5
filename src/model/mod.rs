use serde::{Deserialize, Serialize};

use crate::targeting::TargetingCriteria;

pub type CompanyId = i64;
pub type GroupId = i64;
pub type SegmentId = i64;
pub type CampaignId = i64;

// placeholder the server uses for contacts without a known name
const MISSING_NAME: &str = "N/A";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct EmailContact {
    pub email: String,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "de_loose_bool")]
    pub is_person: bool,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub entreprise_id: Option<CompanyId>,
}

impl EmailContact {
    /// Display name, ignoring blanks and the server's "N/A" placeholder.
    pub fn display_name(&self) -> Option<&str> {
        self.nom
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty() && *n != MISSING_NAME)
    }

    pub fn domain_lowercase(&self) -> String {
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.trim().is_empty()) {
            return domain.trim().to_lowercase();
        }
        self.email
            .split('@')
            .nth(1)
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Company {
    pub id: CompanyId,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub secteur: Option<String>,
    #[serde(default)]
    pub emails: Vec<EmailContact>,
}

impl Company {
    pub fn sector(&self) -> Option<&str> {
        self.secteur.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Owning company of a contact, falling back to this company when the
    /// payload omits `entreprise_id`.
    pub fn owner_of(&self, contact: &EmailContact) -> CompanyId {
        contact.entreprise_id.unwrap_or(self.id)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Recipient {
    pub email: String,
    pub nom: Option<String>,
    pub entreprise: String,
    pub entreprise_id: CompanyId,
}

impl Recipient {
    pub fn from_contact(company: &Company, contact: &EmailContact) -> Self {
        Self {
            email: contact.email.clone(),
            nom: contact.nom.clone().filter(|n| !n.trim().is_empty()),
            entreprise: company.nom.clone(),
            entreprise_id: company.owner_of(contact),
        }
    }

    pub fn key(&self) -> (&str, CompanyId) {
        (self.email.as_str(), self.entreprise_id)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "de_loose_bool")]
    pub is_html: bool,
}

impl Template {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Objective {
    pub id: String,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Option<TargetingCriteria>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub criteres: Option<TargetingCriteria>,
}

impl Segment {
    pub fn label(&self) -> String {
        match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(desc) => format!("{} - {}", self.nom, desc),
            None => self.nom.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CompanyGroup {
    pub id: GroupId,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub entreprises_count: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct SuggestionValue {
    pub value: String,
    #[serde(default)]
    pub count: u64,
}

impl SuggestionValue {
    /// Autocomplete hint as shown to the user, e.g. `Technologie (12)`.
    pub fn hint(&self) -> String {
        if self.count > 0 {
            format!("{} ({})", self.value, self.count)
        } else {
            self.value.clone()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CriteriaSuggestions {
    #[serde(default)]
    pub secteurs: Vec<SuggestionValue>,
    #[serde(default)]
    pub opportunites: Vec<SuggestionValue>,
    #[serde(default)]
    pub statuts: Vec<SuggestionValue>,
    #[serde(default)]
    pub tags: Vec<SuggestionValue>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CampaignSummary {
    pub id: CampaignId,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub sujet: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub statut: Option<String>,
    #[serde(default)]
    pub date_creation: Option<String>,
    #[serde(default)]
    pub total_destinataires: u64,
    #[serde(default)]
    pub total_envoyes: u64,
    #[serde(default)]
    pub total_reussis: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RecipientStats {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nom_destinataire: Option<String>,
    #[serde(default)]
    pub entreprise: Option<String>,
    #[serde(default)]
    pub statut: Option<String>,
    #[serde(default)]
    pub date_envoi: Option<String>,
    #[serde(default)]
    pub opens: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default, deserialize_with = "de_loose_bool")]
    pub has_opened: bool,
    #[serde(default, deserialize_with = "de_loose_bool")]
    pub has_clicked: bool,
    #[serde(default)]
    pub last_open: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CampaignStats {
    #[serde(default)]
    pub total_emails: u64,
    #[serde(default)]
    pub total_opens: u64,
    #[serde(default)]
    pub total_clicks: u64,
    #[serde(default)]
    pub open_rate: Option<f64>,
    #[serde(default)]
    pub click_rate: Option<f64>,
    #[serde(default)]
    pub avg_read_time: Option<f64>,
    #[serde(default)]
    pub emails: Vec<RecipientStats>,
}

// The API serializes sqlite flags as 0/1 as often as true/false.
pub(crate) fn de_loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        Some(serde_json::Value::String(s)) => matches!(s.as_str(), "1" | "true" | "True"),
        _ => false,
    })
}
