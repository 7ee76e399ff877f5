use crate::model::{Company, EmailContact};
use crate::utils;

/// Recipient-level filters applied when entering the recipient step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmailFilters {
    pub person_only: bool,
    pub with_name: bool,
    pub exclude_domains: Vec<String>,
    pub exclude_contains: String,
}

impl EmailFilters {
    pub fn from_raw(
        person_only: bool,
        with_name: bool,
        exclude_domains: &str,
        exclude_contains: &str,
    ) -> Self {
        Self {
            person_only,
            with_name,
            exclude_domains: utils::split_csv_lowercase(exclude_domains),
            exclude_contains: exclude_contains.trim().to_lowercase(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.person_only
            || self.with_name
            || !self.exclude_domains.is_empty()
            || !self.exclude_contains.is_empty()
    }

    pub fn accepts(&self, contact: &EmailContact) -> bool {
        if self.person_only && !contact.is_person {
            return false;
        }
        if self.with_name && contact.display_name().is_none() {
            return false;
        }
        let domain = contact.domain_lowercase();
        if !domain.is_empty() && self.excludes_domain(&domain) {
            return false;
        }
        if !self.exclude_contains.is_empty()
            && contact.email.to_lowercase().contains(&self.exclude_contains)
        {
            return false;
        }
        true
    }

    fn excludes_domain(&self, domain: &str) -> bool {
        self.exclude_domains.iter().any(|d| {
            domain == d
                || domain
                    .strip_suffix(d.as_str())
                    .map(|head| head.ends_with('.'))
                    .unwrap_or(false)
        })
    }
}

/// Copies `companies` keeping only contacts accepted by `filters`;
/// companies left without any contact are dropped.
pub fn apply_email_filters<'a, I>(companies: I, filters: &EmailFilters) -> Vec<Company>
where
    I: IntoIterator<Item = &'a Company>,
{
    companies
        .into_iter()
        .filter_map(|company| {
            let emails: Vec<EmailContact> = company
                .emails
                .iter()
                .filter(|e| filters.accepts(e))
                .cloned()
                .collect();
            if emails.is_empty() {
                None
            } else {
                Some(Company {
                    id: company.id,
                    nom: company.nom.clone(),
                    secteur: company.secteur.clone(),
                    emails,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: &str, nom: Option<&str>, is_person: bool) -> EmailContact {
        EmailContact {
            email: email.to_string(),
            nom: nom.map(|n| n.to_string()),
            is_person,
            ..Default::default()
        }
    }

    #[test]
    fn domain_exclusion_covers_subdomains_only() {
        let filters = EmailFilters::from_raw(false, false, " Gmail.com, ,acme.fr", "");
        assert!(!filters.accepts(&contact("a@gmail.com", None, true)));
        assert!(!filters.accepts(&contact("a@mail.acme.fr", None, true)));
        assert!(filters.accepts(&contact("a@notacme.fr", None, true)));
    }

    #[test]
    fn name_and_person_filters() {
        let filters = EmailFilters::from_raw(true, true, "", "");
        assert!(filters.accepts(&contact("jean@acme.fr", Some("Jean"), true)));
        assert!(!filters.accepts(&contact("info@acme.fr", Some("Jean"), false)));
        assert!(!filters.accepts(&contact("jean@acme.fr", Some("N/A"), true)));
        assert!(!filters.accepts(&contact("jean@acme.fr", Some("  "), true)));
    }

    #[test]
    fn substring_exclusion_is_case_insensitive() {
        let filters = EmailFilters::from_raw(false, false, "", " NoReply ");
        assert!(!filters.accepts(&contact("noreply@acme.fr", None, false)));
        assert!(filters.accepts(&contact("contact@acme.fr", None, false)));
    }

    #[test]
    fn companies_without_passing_emails_disappear() {
        let companies = vec![
            Company {
                id: 1,
                nom: "Acme".to_string(),
                emails: vec![contact("info@acme.fr", None, false)],
                ..Default::default()
            },
            Company {
                id: 2,
                nom: "Beta".to_string(),
                emails: vec![
                    contact("info@beta.fr", None, false),
                    contact("paul@beta.fr", Some("Paul"), true),
                ],
                ..Default::default()
            },
        ];
        let filters = EmailFilters::from_raw(true, false, "", "");
        let out = apply_email_filters(&companies, &filters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
        assert_eq!(out[0].emails.len(), 1);
        assert_eq!(out[0].emails[0].email, "paul@beta.fr");
    }
}
