use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::CampaignSummary;

/// In-memory filter over the campaign list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    pub search: String,
    pub statut: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl CampaignFilter {
    pub fn new(
        search: Option<&str>,
        statut: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Self {
        Self {
            search: search.unwrap_or_default().trim().to_lowercase(),
            statut: statut
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            date_from,
            date_to,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.search.is_empty()
            || self.statut.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
    }

    pub fn matches(&self, campaign: &CampaignSummary) -> bool {
        if !self.search.is_empty() {
            let haystack = format!(
                "{} {} {}",
                campaign.nom,
                campaign.sujet.as_deref().unwrap_or_default(),
                campaign.template_id.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if !haystack.contains(&self.search) {
                return false;
            }
        }
        if let Some(statut) = &self.statut {
            if campaign.statut.as_deref() != Some(statut.as_str()) {
                return false;
            }
        }
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let created = match campaign.date_creation.as_deref().and_then(parse_timestamp) {
            Some(ts) => ts,
            None => return false,
        };
        if let Some(from) = self.date_from {
            if created < from.and_time(NaiveTime::MIN) {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
            if created > to.and_time(end) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, campaigns: &'a [CampaignSummary]) -> Vec<&'a CampaignSummary> {
        campaigns.iter().filter(|c| self.matches(c)).collect()
    }
}

/// Creation timestamps come back as SQL datetimes in server local time,
/// occasionally as RFC 3339.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Share of recipients already sent, in percent.
pub fn send_progress(campaign: &CampaignSummary) -> u32 {
    let total = campaign.total_destinataires.max(1) as f64;
    ((campaign.total_envoyes as f64 / total) * 100.0).round() as u32
}

pub fn count_label(count: usize) -> String {
    if count > 1 {
        format!("{} campagnes", count)
    } else {
        format!("{} campagne", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(id: i64, nom: &str, statut: &str, created: Option<&str>) -> CampaignSummary {
        CampaignSummary {
            id,
            nom: nom.to_string(),
            statut: Some(statut.to_string()),
            date_creation: created.map(|c| c.to_string()),
            ..Default::default()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn search_covers_name_subject_and_template() {
        let mut c = campaign(1, "Relance", "completed", None);
        c.template_id = Some("audit_site".to_string());
        let filter = CampaignFilter::new(Some(" AUDIT "), None, None, None);
        assert!(filter.matches(&c));
        let filter = CampaignFilter::new(Some("newsletter"), None, None, None);
        assert!(!filter.matches(&c));
    }

    #[test]
    fn date_bounds_are_inclusive_days() {
        let list = vec![
            campaign(1, "a", "completed", Some("2024-05-01 00:00:00")),
            campaign(2, "b", "completed", Some("2024-05-03 23:59:59")),
            campaign(3, "c", "completed", Some("2024-05-04 00:00:01")),
            campaign(4, "d", "completed", None),
        ];
        let filter = CampaignFilter::new(None, None, Some(day(2024, 5, 1)), Some(day(2024, 5, 3)));
        let ids: Vec<i64> = filter.apply(&list).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn status_must_match_exactly() {
        let list = vec![
            campaign(1, "a", "running", None),
            campaign(2, "b", "completed", None),
        ];
        let filter = CampaignFilter::new(None, Some("running"), None, None);
        assert_eq!(filter.apply(&list).len(), 1);
        assert!(!CampaignFilter::default().is_active());
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2024-05-01T10:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00.123").is_some());
        assert_eq!(
            parse_timestamp("2024-05-01"),
            Some(day(2024, 5, 1).and_time(NaiveTime::MIN))
        );
        assert_eq!(parse_timestamp("hier"), None);
    }

    #[test]
    fn progress_and_labels() {
        let mut c = campaign(1, "a", "running", None);
        c.total_destinataires = 3;
        c.total_envoyes = 2;
        assert_eq!(send_progress(&c), 67);
        assert_eq!(count_label(1), "1 campagne");
        assert_eq!(count_label(4), "4 campagnes");
    }
}
