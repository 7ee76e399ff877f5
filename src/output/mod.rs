use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;

use crate::campaigns;
use crate::model::{CampaignStats, CampaignSummary, Company};
use crate::schedule::ScheduleSlot;
use crate::wizard::CampaignDraft;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"null".to_vec());
    out.push(b'\n');
    out
}

fn rate(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.1}%"),
        _ => "-".to_string(),
    }
}

/// One line per company: id, name, sector and its emails.
pub fn render_companies_text(companies: &[&Company]) -> Vec<u8> {
    let mut out = String::new();
    for c in companies {
        out.push_str(&format!(
            "{:>6}  {}  [{}]  {}\n",
            c.id,
            c.nom,
            c.sector().unwrap_or("-"),
            c.emails.iter().map(|e| e.email.as_str()).join(", ")
        ));
    }
    let emails: usize = companies.iter().map(|c| c.emails.len()).sum();
    out.push_str(&format!("{} entreprises, {} emails\n", companies.len(), emails));
    out.into_bytes()
}

pub fn render_campaigns_text(campaigns: &[&CampaignSummary]) -> Vec<u8> {
    let mut out = String::new();
    for c in campaigns {
        out.push_str(&format!(
            "{:>6}  {:<10}  {:>3}%  {}/{}  {}  {}\n",
            c.id,
            c.statut.as_deref().unwrap_or("-"),
            campaigns::send_progress(c),
            c.total_envoyes,
            c.total_destinataires,
            c.date_creation.as_deref().unwrap_or("-"),
            c.nom
        ));
    }
    out.push_str(&campaigns::count_label(campaigns.len()));
    out.push('\n');
    out.into_bytes()
}

pub fn render_stats_text(stats: &CampaignStats) -> Vec<u8> {
    let mut out = format!(
        "emails: {}  ouvertures: {} ({})  clics: {} ({})\n",
        stats.total_emails,
        stats.total_opens,
        rate(stats.open_rate),
        stats.total_clicks,
        rate(stats.click_rate)
    );
    if let Some(avg) = stats.avg_read_time.filter(|a| a.is_finite()) {
        out.push_str(&format!("lecture moyenne: {avg:.0}s\n"));
    }
    for r in &stats.emails {
        let flags = [
            r.has_opened.then_some("ouvert"),
            r.has_clicked.then_some("cliqué"),
        ]
        .into_iter()
        .flatten()
        .join(",");
        out.push_str(&format!(
            "  {:<40} {:<10} {:>3} {:>3}  {}\n",
            r.email,
            r.statut.as_deref().unwrap_or("-"),
            r.opens,
            r.clicks,
            if flags.is_empty() { "-" } else { flags.as_str() }
        ));
    }
    out.into_bytes()
}

pub fn render_slots_text(slots: &[ScheduleSlot]) -> Vec<u8> {
    slots
        .iter()
        .map(|s| format!("{}  {}  {}\n", s.date.format("%Y-%m-%d"), s.time_label, s.label))
        .collect::<String>()
        .into_bytes()
}

pub fn render_holidays_text(days: &[NaiveDate]) -> Vec<u8> {
    days.iter()
        .map(|d| format!("{}\n", d.format("%Y-%m-%d %A")))
        .collect::<String>()
        .into_bytes()
}

pub fn render_draft_text(draft: &CampaignDraft) -> Vec<u8> {
    let mut out = format!(
        "nom: {}\nsujet: {}\ntemplate: {}\ndestinataires: {}\ndélai: {}s\n",
        draft.nom,
        draft.sujet,
        draft.template_id.as_deref().unwrap_or("-"),
        draft.recipients.len(),
        draft.delay
    );
    if let Some(at) = draft.scheduled_at_iso.as_deref() {
        out.push_str(&format!("programmée: {at}\n"));
    }
    for r in &draft.recipients {
        out.push_str(&format!("  {} ({})\n", r.email, r.entreprise));
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmailContact, RecipientStats};

    #[test]
    fn formats() {
        assert_eq!(OutputFormat::parse(" JSON "), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("txt"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("html"), None);
    }

    #[test]
    fn company_lines_list_emails() {
        let c = Company {
            id: 7,
            nom: "Acme".to_string(),
            secteur: Some("Technologie".to_string()),
            emails: vec![
                EmailContact {
                    email: "a@acme.fr".to_string(),
                    ..Default::default()
                },
                EmailContact {
                    email: "b@acme.fr".to_string(),
                    ..Default::default()
                },
            ],
        };
        let text = String::from_utf8(render_companies_text(&[&c])).unwrap();
        assert!(text.contains("Acme  [Technologie]  a@acme.fr, b@acme.fr"));
        assert!(text.ends_with("1 entreprises, 2 emails\n"));
    }

    #[test]
    fn stats_show_rates_and_flags() {
        let stats = CampaignStats {
            total_emails: 2,
            total_opens: 1,
            open_rate: Some(50.0),
            emails: vec![RecipientStats {
                email: "a@acme.fr".to_string(),
                has_opened: true,
                has_clicked: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        let text = String::from_utf8(render_stats_text(&stats)).unwrap();
        assert!(text.contains("ouvertures: 1 (50.0%)"));
        assert!(text.contains("clics: 0 (-)"));
        assert!(text.contains("ouvert,cliqué"));
    }

    #[test]
    fn json_is_newline_terminated() {
        let out = render_json(&vec![1, 2]);
        assert_eq!(out.last(), Some(&b'\n'));
        let parsed: Vec<i32> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, vec![1, 2]);
    }
}
