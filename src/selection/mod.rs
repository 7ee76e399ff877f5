pub mod filters;

use crate::model::{Company, CompanyId, EmailContact, Recipient};

pub use filters::{apply_email_filters, EmailFilters};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuickSelect {
    All,
    None,
    Invert,
}

impl QuickSelect {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" => Some(Self::All),
            "none" => Some(Self::None),
            "invert" => Some(Self::Invert),
            _ => None,
        }
    }

    fn target(&self, currently: bool) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Invert => !currently,
        }
    }
}

/// Company ids checked on the targeting step, in selection order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompanySelection {
    ids: Vec<CompanyId>,
}

impl CompanySelection {
    pub fn toggle(&mut self, id: CompanyId, checked: bool) {
        let pos = self.ids.iter().position(|x| *x == id);
        match (checked, pos) {
            (true, None) => self.ids.push(id),
            (false, Some(idx)) => {
                self.ids.remove(idx);
            }
            _ => {}
        }
    }

    /// Card click: flips the current state and returns the new one.
    pub fn flip(&mut self, id: CompanyId) -> bool {
        let checked = !self.contains(id);
        self.toggle(id, checked);
        checked
    }

    /// Applies a quick action over `visible` only.
    pub fn quick_select(&mut self, visible: &[CompanyId], mode: QuickSelect) {
        for id in visible {
            let checked = mode.target(self.contains(*id));
            self.toggle(*id, checked);
        }
    }

    pub fn contains(&self, id: CompanyId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[CompanyId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionMiss {
    Company(CompanyId),
    Email { company_id: CompanyId, index: usize },
}

/// Canonical recipient list, keyed by `(email, entreprise_id)`.
///
/// Every mutation goes through the single-email `set` against a contact of
/// the current view, so per-email checked state and the list never diverge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipientSelection {
    selected: Vec<Recipient>,
}

impl RecipientSelection {
    pub fn toggle_email(
        &mut self,
        view: &[Company],
        company_id: CompanyId,
        index: usize,
        checked: bool,
    ) -> Result<(), SelectionMiss> {
        let company = find(view, company_id)?;
        let contact = company.emails.get(index).ok_or(SelectionMiss::Email {
            company_id,
            index,
        })?;
        self.set(company, contact, checked);
        Ok(())
    }

    fn set(&mut self, company: &Company, contact: &EmailContact, checked: bool) {
        let recipient = Recipient::from_contact(company, contact);
        if checked {
            if !self.contains_key(recipient.key()) {
                self.selected.push(recipient);
            }
        } else {
            self.selected.retain(|r| r.key() != recipient.key());
        }
    }

    /// Row click: flips one email and returns its new state.
    pub fn flip_email(
        &mut self,
        view: &[Company],
        company_id: CompanyId,
        index: usize,
    ) -> Result<bool, SelectionMiss> {
        if find(view, company_id)?.emails.get(index).is_none() {
            return Err(SelectionMiss::Email { company_id, index });
        }
        let checked = !self.is_checked(view, company_id, index);
        self.toggle_email(view, company_id, index, checked)?;
        Ok(checked)
    }

    /// Header checkbox: replays the single-email toggle for every visible
    /// email of the company.
    pub fn toggle_company(
        &mut self,
        view: &[Company],
        company_id: CompanyId,
        checked: bool,
    ) -> Result<(), SelectionMiss> {
        let count = find(view, company_id)?.emails.len();
        for index in 0..count {
            self.toggle_email(view, company_id, index, checked)?;
        }
        Ok(())
    }

    /// Card click: selects every visible email unless they are all
    /// selected already, in which case clears them.
    pub fn flip_company(&mut self, view: &[Company], company_id: CompanyId) -> Result<bool, SelectionMiss> {
        let checked = !self.all_checked(view, company_id)?;
        self.toggle_company(view, company_id, checked)?;
        Ok(checked)
    }

    pub fn quick_select(&mut self, view: &[Company], mode: QuickSelect) {
        for company in view {
            for contact in &company.emails {
                let was = self.contains_key((contact.email.as_str(), company.owner_of(contact)));
                self.set(company, contact, mode.target(was));
            }
        }
    }

    /// Drops recipients that are no longer visible in `view`.
    pub fn retain_visible(&mut self, view: &[Company]) {
        self.retain_listed(view.iter());
    }

    /// Keeps only recipients that are a contact of one of `companies`.
    pub fn retain_listed<'a>(&mut self, companies: impl Iterator<Item = &'a Company> + Clone) {
        self.selected.retain(|r| {
            companies.clone().any(|c| {
                c.emails
                    .iter()
                    .any(|e| e.email == r.email && c.owner_of(e) == r.entreprise_id)
            })
        });
    }

    pub fn is_checked(&self, view: &[Company], company_id: CompanyId, index: usize) -> bool {
        find(view, company_id)
            .ok()
            .and_then(|c| c.emails.get(index).map(|e| (c, e)))
            .map(|(c, e)| self.contains_key((e.email.as_str(), c.owner_of(e))))
            .unwrap_or(false)
    }

    pub fn all_checked(&self, view: &[Company], company_id: CompanyId) -> Result<bool, SelectionMiss> {
        let company = find(view, company_id)?;
        Ok((0..company.emails.len()).all(|i| self.is_checked(view, company_id, i)))
    }

    pub fn any_checked(&self, view: &[Company], company_id: CompanyId) -> bool {
        find(view, company_id)
            .map(|c| (0..c.emails.len()).any(|i| self.is_checked(view, company_id, i)))
            .unwrap_or(false)
    }

    /// Number of checked emails in `view`.
    pub fn checked_in(&self, view: &[Company]) -> usize {
        view.iter()
            .map(|c| {
                (0..c.emails.len())
                    .filter(|i| self.is_checked(view, c.id, *i))
                    .count()
            })
            .sum()
    }

    pub fn contains_key(&self, key: (&str, CompanyId)) -> bool {
        self.selected.iter().any(|r| r.key() == key)
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }
}

fn find(view: &[Company], company_id: CompanyId) -> Result<&Company, SelectionMiss> {
    view.iter()
        .find(|c| c.id == company_id)
        .ok_or(SelectionMiss::Company(company_id))
}
