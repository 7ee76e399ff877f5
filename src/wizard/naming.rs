use crate::model::{Company, CompanyId};
use crate::utils;

pub const DEFAULT_CAMPAIGN_NAME: &str = "Campagne email";

// checked in order, first hit wins
const KEYWORD_LABELS: [(&str, &str); 5] = [
    ("modernisation", "Modernisation présence"),
    ("optimisation", "Optimisation conversion"),
    ("sécurité", "Sécurité & fiabilité"),
    ("présence", "Présence en ligne"),
    ("audit", "Audit digital"),
];

const MAX_SECTOR_CHARS: usize = 16;
const MAX_COMPANY_CHARS: usize = 18;

pub fn template_label(template_name: Option<&str>) -> String {
    let name = match template_name {
        Some(n) => n,
        None => return DEFAULT_CAMPAIGN_NAME.to_string(),
    };
    let lower = name.to_lowercase();
    KEYWORD_LABELS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| name.trim().to_string())
}

/// Builds a campaign name such as `Présence en ligne Technologie`.
pub fn generate_campaign_name(
    template_name: Option<&str>,
    _recipient_count: usize,
    sector: Option<&str>,
    company: Option<&str>,
) -> String {
    let label = template_label(template_name);
    let context = match (
        sector.map(str::trim).filter(|s| !s.is_empty()),
        company.map(str::trim).filter(|c| !c.is_empty()),
    ) {
        (Some(s), _) => utils::shorten_label(s, MAX_SECTOR_CHARS),
        (None, Some(c)) => utils::shorten_label(c, MAX_COMPANY_CHARS),
        (None, None) => String::new(),
    };
    [label, context]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CampaignContext {
    pub sector_label: Option<String>,
    pub company_label: Option<String>,
}

/// Dominant sector and a representative company among `selected`, using
/// pool order.
pub fn campaign_context(pool: &[Company], selected: &[CompanyId]) -> CampaignContext {
    let chosen: Vec<&Company> = pool.iter().filter(|c| selected.contains(&c.id)).collect();
    let first = match chosen.first() {
        Some(c) => *c,
        None => return CampaignContext::default(),
    };

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for sector in chosen.iter().filter_map(|c| c.sector()) {
        match counts.iter_mut().find(|(s, _)| *s == sector) {
            Some((_, n)) => *n += 1,
            None => counts.push((sector, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (sector, n) in counts {
        if best.map(|(_, max)| n > max).unwrap_or(true) {
            best = Some((sector, n));
        }
    }

    CampaignContext {
        sector_label: best.map(|(s, _)| s.to_string()),
        company_label: Some(first.nom.trim().to_string()).filter(|n| !n.is_empty()),
    }
}
