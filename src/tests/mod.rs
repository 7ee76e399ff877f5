use chrono::{Duration, Local, NaiveDate, NaiveTime};

use crate::api::{ApiClient, ClientOptions};
use crate::model::{Company, EmailContact};
use crate::schedule::{self, SuggestionKind};
use crate::selection::{EmailFilters, QuickSelect};
use crate::wizard::{
    self, Effect, SendMode, Step, SubmitError, WizardError, WizardMode, WizardSession,
    WizardState,
};

fn contact(email: &str, nom: Option<&str>) -> EmailContact {
    EmailContact {
        email: email.to_string(),
        nom: nom.map(|n| n.to_string()),
        is_person: nom.is_some(),
        ..Default::default()
    }
}

fn pool() -> Vec<Company> {
    vec![
        Company {
            id: 10,
            nom: "Atelier Dumas".to_string(),
            secteur: Some("Artisanat".to_string()),
            emails: vec![
                contact("contact@dumas.fr", None),
                contact("paul@dumas.fr", Some("Paul Dumas")),
            ],
        },
        Company {
            id: 20,
            nom: "Nébula Tech".to_string(),
            secteur: Some("Technologie".to_string()),
            emails: vec![
                contact("hello@nebula.io", None),
                contact("lea@mail.nebula.io", Some("Léa")),
            ],
        },
        Company {
            id: 30,
            nom: "Garage Martin".to_string(),
            secteur: Some("Automobile".to_string()),
            emails: vec![contact("martin@garage.fr", Some("M. Martin"))],
        },
    ]
}

fn loaded(mode: WizardMode) -> WizardState {
    let mut state = WizardState::new(mode);
    let ticket = state
        .open()
        .into_iter()
        .find_map(|e| match e {
            Effect::LoadPool(req) => Some(req.ticket),
            _ => None,
        })
        .unwrap();
    state.apply_pool(ticket, Ok(pool()));
    state
}

fn selected_emails(state: &WizardState) -> Vec<String> {
    let mut emails: Vec<String> = state
        .recipients()
        .recipients()
        .iter()
        .map(|r| r.email.clone())
        .collect();
    emails.sort();
    emails
}

#[test]
fn step_one_toggles_are_idempotent() {
    let mut state = loaded(WizardMode::ThreeStep);
    state.toggle_company(20, true).unwrap();
    state.toggle_company(20, true).unwrap();
    state.toggle_company(10, true).unwrap();
    state.toggle_company(30, false).unwrap();
    assert_eq!(state.company_selection().ids(), &[20, 10]);
    state.toggle_company(20, false).unwrap();
    state.toggle_company(20, false).unwrap();
    assert_eq!(state.company_selection().ids(), &[10]);
}

#[test]
fn recipient_step_shows_filtered_emails_of_selected_companies() {
    let mut state = loaded(WizardMode::ThreeStep);
    state.toggle_company(10, true).unwrap();
    state.toggle_company(20, true).unwrap();
    state.set_email_filters(EmailFilters::from_raw(false, true, "nebula.io", ""));
    state.next().unwrap();
    assert_eq!(state.step(), Step::Recipients);

    let shown: Vec<&str> = state
        .displayed()
        .iter()
        .flat_map(|c| c.emails.iter().map(|e| e.email.as_str()))
        .collect();
    // subdomain excluded with its parent, nameless contacts dropped
    assert_eq!(shown, vec!["paul@dumas.fr"]);

    state.toggle_company_emails(10, true).unwrap();
    assert_eq!(selected_emails(&state), vec!["paul@dumas.fr"]);
    assert_eq!(
        state.toggle_company_emails(20, true),
        Err(WizardError::UnknownCompany { id: 20 })
    );
}

#[test]
fn header_toggle_selects_exactly_one_company_pool() {
    let mut state = loaded(WizardMode::ThreeStep);
    state.quick_select_companies(QuickSelect::All).unwrap();
    state.next().unwrap();
    assert!(state.click_recipient_card(20).unwrap());
    assert_eq!(
        selected_emails(&state),
        vec!["hello@nebula.io", "lea@mail.nebula.io"]
    );
    assert!(!state.click_recipient_card(20).unwrap());
    assert!(state.recipients().is_empty());
}

#[test]
fn campaign_name_from_template_and_sector() {
    assert_eq!(
        wizard::generate_campaign_name(Some("Présence digitale"), 12, Some("Technologie"), None),
        "Présence en ligne Technologie"
    );
}

#[test]
fn generated_name_uses_the_dominant_sector() {
    let mut state = loaded(WizardMode::ThreeStep);
    state.toggle_company(20, true).unwrap();
    state.next().unwrap();
    state.quick_select_recipients(QuickSelect::All).unwrap();
    state.next().unwrap();
    assert_eq!(state.campaign_name(), "Campagne email Technologie");
    state.compose_mut().unwrap().nom = Some("Relance Q3".to_string());
    assert_eq!(state.campaign_name(), "Relance Q3");
}

#[test]
fn suggested_slots_fall_on_business_days() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for offset in 0..(366 * 2) {
        let day = start + Duration::days(offset);
        for hour in [0, 10, 23] {
            let now = day.and_time(NaiveTime::from_hms_opt(hour, 30, 0).unwrap());
            for kind in SuggestionKind::ALL {
                let slot = schedule::suggested_slot(kind, now);
                assert!(schedule::is_business_day(slot.date), "{kind:?} from {now}");
                assert!(slot.date > day);
            }
        }
    }
}

#[test]
fn labour_day_is_not_a_business_day() {
    assert_eq!(schedule::is_business_day_str("2024-05-01"), Ok(false));
    assert_eq!(schedule::is_business_day_str("2024-05-02"), Ok(true));
    assert!(schedule::is_business_day_str("02/05/2024").is_err());
}

fn composing_with_past_schedule() -> WizardState {
    let mut state = loaded(WizardMode::ThreeStep);
    state.toggle_company(30, true).unwrap();
    state.next().unwrap();
    state.quick_select_recipients(QuickSelect::All).unwrap();
    state.next().unwrap();
    let form = state.compose_mut().unwrap();
    form.sujet = "Votre site".to_string();
    form.custom_message = "Bonjour".to_string();
    form.send_mode = SendMode::Scheduled;
    form.schedule_date = NaiveDate::from_ymd_opt(2000, 1, 3);
    form.schedule_time = NaiveTime::from_hms_opt(9, 0, 0);
    state
}

#[test]
fn past_schedule_is_rejected() {
    let state = composing_with_past_schedule();
    assert_eq!(
        state.build_draft(&Local::now()),
        Err(WizardError::ScheduleInPast)
    );
}

#[tokio::test]
async fn past_schedule_never_reaches_the_server() {
    // nothing listens on the discard port: any request would fail as an api error
    let api = ApiClient::new(&ClientOptions {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 1,
        ..Default::default()
    })
    .unwrap();
    let mut session = WizardSession::new(api, WizardMode::ThreeStep, std::time::Duration::ZERO);
    *session.state().lock().await = composing_with_past_schedule();

    match session.submit().await {
        Err(SubmitError::Wizard(WizardError::ScheduleInPast)) => {}
        other => panic!("unexpected submit result: {:?}", other),
    }
    // the wizard is not reset on a refused submit
    assert_eq!(session.snapshot().await.step(), Step::Compose);
}

#[test]
fn deselected_company_recipients_never_come_back() {
    let mut state = loaded(WizardMode::ThreeStep);
    state.toggle_company(10, true).unwrap();
    state.toggle_company(20, true).unwrap();
    state.next().unwrap();
    state.quick_select_recipients(QuickSelect::All).unwrap();
    assert_eq!(state.recipients().len(), 4);

    // back through the header, then deselect
    state.go_to(1).unwrap();
    state.toggle_company(10, false).unwrap();
    state.go_to(2).unwrap();
    assert!(selected_emails(&state).iter().all(|e| e.ends_with("nebula.io")));
    assert_eq!(state.recipients().len(), 2);

    state.prev();
    state.toggle_company(20, false).unwrap();
    state.toggle_company(10, true).unwrap();
    state.next().unwrap();
    assert!(state.recipients().is_empty());
    assert!(state.displayed().iter().all(|c| c.id == 10));
}

#[test]
fn reselected_company_starts_without_recipients() {
    let mut state = loaded(WizardMode::ThreeStep);
    state.toggle_company(10, true).unwrap();
    state.next().unwrap();
    state.toggle_company_emails(10, true).unwrap();
    assert_eq!(selected_emails(&state), vec!["contact@dumas.fr", "paul@dumas.fr"]);

    state.go_to(1).unwrap();
    state.toggle_company(10, false).unwrap();
    state.toggle_company(10, true).unwrap();
    state.go_to(2).unwrap();
    assert!(state.recipients().is_empty(), "resurrected {:?}", selected_emails(&state));
    assert!(state.displayed().iter().any(|c| c.id == 10));
}

#[test]
fn card_and_quick_deselects_drop_recipients_too() {
    let mut state = loaded(WizardMode::ThreeStep);
    state.quick_select_companies(QuickSelect::All).unwrap();
    state.next().unwrap();
    state.quick_select_recipients(QuickSelect::All).unwrap();
    assert_eq!(state.recipients().len(), 5);

    state.go_to(1).unwrap();
    assert!(!state.click_company_card(30).unwrap());
    assert!(state.click_company_card(30).unwrap());
    state.quick_select_companies(QuickSelect::Invert).unwrap();
    state.quick_select_companies(QuickSelect::Invert).unwrap();
    state.go_to(2).unwrap();
    assert!(state.recipients().is_empty());
}

#[test]
fn two_step_wizard_picks_recipients_on_the_first_step() {
    let mut state = loaded(WizardMode::TwoStep);
    assert!(state.recipient_view_active());
    state.set_search("garage");
    state.quick_select_recipients(QuickSelect::All).unwrap();
    assert_eq!(selected_emails(&state), vec!["martin@garage.fr"]);
    assert_eq!(
        state.go_to(3),
        Err(WizardError::StepUnavailable { step: 3 })
    );
    assert_eq!(
        state.next(),
        Ok(vec![Effect::LoadTemplates, Effect::ResetScheduleToNow])
    );
    assert_eq!(state.step_number(), 2);
}
