use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::WizardError;
use crate::model::Recipient;
use crate::schedule::ScheduleSlot;

pub const DEFAULT_DELAY_SECS: u32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    #[default]
    Now,
    Scheduled,
}

impl SendMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "now" => Some(Self::Now),
            "scheduled" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComposeForm {
    /// Explicit campaign name; generated from the template and context when
    /// absent.
    pub nom: Option<String>,
    pub sujet: String,
    pub template_id: Option<String>,
    pub custom_message: String,
    pub delay: Option<u32>,
    pub send_mode: SendMode,
    pub schedule_date: Option<NaiveDate>,
    pub schedule_time: Option<NaiveTime>,
}

impl ComposeForm {
    pub fn effective_delay(&self) -> u32 {
        match self.delay {
            Some(d) if d > 0 => d,
            _ => DEFAULT_DELAY_SECS,
        }
    }

    pub fn reset_schedule_to(&mut self, now: NaiveDateTime) {
        self.schedule_date = Some(now.date());
        self.schedule_time = NaiveTime::from_hms_opt(
            chrono::Timelike::hour(&now),
            chrono::Timelike::minute(&now),
            0,
        );
    }

    pub fn apply_slot(&mut self, slot: &ScheduleSlot) {
        self.schedule_date = Some(slot.date);
        self.schedule_time = NaiveTime::from_hms_opt(slot.hour, slot.minute, 0);
        self.send_mode = SendMode::Scheduled;
    }

    fn message(&self) -> Option<String> {
        let trimmed = self.custom_message.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(self.custom_message.clone())
        }
    }

    fn template(&self) -> Option<String> {
        self.template_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// Scheduled instant in UTC, the form fields read as local time in the
    /// zone of `now`.
    pub fn scheduled_instant<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Utc>, WizardError> {
        let (date, time) = match (self.schedule_date, self.schedule_time) {
            (Some(d), Some(t)) => (d, t),
            _ => return Err(WizardError::MissingSchedule),
        };
        let local = now
            .timezone()
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .ok_or(WizardError::InvalidScheduleTime)?;
        if local.timestamp_millis() <= now.timestamp_millis() {
            return Err(WizardError::ScheduleInPast);
        }
        Ok(local.with_timezone(&Utc))
    }

    /// Validates the form and builds the request body. Checks run in the
    /// order the user fills the form: subject, schedule, recipients, body.
    pub fn build_draft<Tz: TimeZone>(
        &self,
        nom: String,
        recipients: &[Recipient],
        now: &DateTime<Tz>,
    ) -> Result<CampaignDraft, WizardError> {
        let sujet = self.sujet.trim();
        if sujet.is_empty() {
            return Err(WizardError::MissingSubject);
        }
        let scheduled_at_iso = match self.send_mode {
            SendMode::Scheduled => Some(
                self.scheduled_instant(now)?
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            SendMode::Now => None,
        };
        if recipients.is_empty() {
            return Err(WizardError::NoRecipients);
        }
        let template_id = self.template();
        let custom_message = self.message();
        if template_id.is_none() && custom_message.is_none() {
            return Err(WizardError::MissingMessage);
        }
        Ok(CampaignDraft {
            nom,
            template_id,
            sujet: sujet.to_string(),
            recipients: recipients.to_vec(),
            custom_message,
            delay: self.effective_delay(),
            send_mode: self.send_mode,
            scheduled_at_iso,
        })
    }
}

/// Body of `POST /api/campagnes`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CampaignDraft {
    pub nom: String,
    pub template_id: Option<String>,
    pub sujet: String,
    pub recipients: Vec<Recipient>,
    pub custom_message: Option<String>,
    pub delay: u32,
    pub send_mode: SendMode,
    pub scheduled_at_iso: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn recipient() -> Recipient {
        Recipient {
            email: "jean@acme.fr".to_string(),
            nom: Some("Jean".to_string()),
            entreprise: "Acme".to_string(),
            entreprise_id: 1,
        }
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 15, 10, 30, 0)
            .unwrap()
    }

    fn form() -> ComposeForm {
        ComposeForm {
            sujet: "Bonjour".to_string(),
            template_id: Some("audit".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn subject_is_checked_first() {
        let mut form = form();
        form.sujet = "  ".to_string();
        form.send_mode = SendMode::Scheduled;
        assert_eq!(
            form.build_draft("x".to_string(), &[], &now()),
            Err(WizardError::MissingSubject)
        );
    }

    #[test]
    fn past_schedule_is_rejected() {
        let mut form = form();
        form.send_mode = SendMode::Scheduled;
        form.schedule_date = NaiveDate::from_ymd_opt(2024, 5, 15);
        form.schedule_time = NaiveTime::from_hms_opt(10, 30, 0);
        assert_eq!(
            form.build_draft("x".to_string(), &[recipient()], &now()),
            Err(WizardError::ScheduleInPast)
        );
        form.schedule_time = None;
        assert_eq!(
            form.build_draft("x".to_string(), &[recipient()], &now()),
            Err(WizardError::MissingSchedule)
        );
    }

    #[test]
    fn scheduled_draft_carries_utc_instant() {
        let mut form = form();
        form.send_mode = SendMode::Scheduled;
        form.schedule_date = NaiveDate::from_ymd_opt(2024, 5, 16);
        form.schedule_time = NaiveTime::from_hms_opt(9, 0, 0);
        let draft = form
            .build_draft("Audit digital".to_string(), &[recipient()], &now())
            .unwrap();
        assert_eq!(
            draft.scheduled_at_iso.as_deref(),
            Some("2024-05-16T07:00:00.000Z")
        );
        assert_eq!(draft.delay, DEFAULT_DELAY_SECS);
        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["send_mode"], "scheduled");
        assert_eq!(body["recipients"][0]["entreprise_id"], 1);
    }

    #[test]
    fn body_requires_template_or_message() {
        let mut form = form();
        form.template_id = Some(" ".to_string());
        assert_eq!(
            form.build_draft("x".to_string(), &[recipient()], &now()),
            Err(WizardError::MissingMessage)
        );
        form.custom_message = "Bonjour {nom}".to_string();
        form.delay = Some(0);
        let draft = form
            .build_draft("x".to_string(), &[recipient()], &now())
            .unwrap();
        assert_eq!(draft.template_id, None);
        assert_eq!(draft.delay, DEFAULT_DELAY_SECS);
        assert_eq!(draft.send_mode, SendMode::Now);
        assert_eq!(draft.scheduled_at_iso, None);
    }

    #[test]
    fn empty_recipients_are_rejected() {
        assert_eq!(
            form().build_draft("x".to_string(), &[], &now()),
            Err(WizardError::NoRecipients)
        );
    }
}
