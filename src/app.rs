use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use crate::api::{ApiClient, ClientOptions, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::campaigns::CampaignFilter;
use crate::cli::args::{
    CliArgs, Command, CompaniesArgs, CreateArgs, ListArgs, ResultsArgs, TargetingArgs,
};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::model::CampaignStats;
use crate::output::{self, OutputFormat};
use crate::progress::{self, DEFAULT_POLL_INTERVAL};
use crate::schedule::{self, SuggestionKind};
use crate::selection::{EmailFilters, QuickSelect};
use crate::targeting::{CriteriaInput, TargetingMode};
use crate::wizard::compose::DEFAULT_DELAY_SECS;
use crate::wizard::{SendMode, WizardMode, WizardSession};

const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Clone, Copy)]
enum Level {
    Info,
    Warn,
    Error,
}

fn print_status(level: Level, message: &str) {
    let tag = match level {
        Level::Info => "INF".bold().blue(),
        Level::Warn => "WRN".bold().yellow(),
        Level::Error => "ERR".bold().red(),
    };
    eprintln!("{}{}{} {}", "[".bold().white(), tag, "]".bold().white(), message);
}

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<10}: {}", label, value);
}

fn spinner(message: &str) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} [{elapsed}]")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

fn write_stdout(bytes: &[u8]) -> Result<(), String> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|_| stdout.flush())
        .map_err(|e| format!("failed to write output: {e}"))
}

#[derive(Debug, Clone)]
struct RunConfig {
    command: Command,
    config_path: Option<PathBuf>,
    api: ClientOptions,
    format: OutputFormat,
    no_color: bool,
    verbose: u8,
    delay: u32,
    debounce: Duration,
    poll_interval: Duration,
}

fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    config_path: Option<PathBuf>,
) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let format = match args.format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text or json"))?,
        None => OutputFormat::Text,
    };
    let timeout_seconds = args.timeout.or(cfg.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }
    let api = ClientOptions {
        base_url: args
            .base_url
            .or(cfg.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_token: args.api_token.or(cfg.api_token).filter(|t| !t.trim().is_empty()),
        timeout_seconds,
        proxy: args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty()),
    };
    let poll_secs = match &args.command {
        Command::Results(r) => r.interval,
        _ => None,
    }
    .or(cfg.poll_interval);

    Ok(RunConfig {
        command: args.command,
        config_path,
        api,
        format,
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
        verbose: args.verbose,
        delay: cfg.delay.filter(|d| *d > 0).unwrap_or(DEFAULT_DELAY_SECS),
        debounce: Duration::from_millis(cfg.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
        poll_interval: poll_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL),
    })
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prospectlab={level}")));
    // a second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn client(run: &RunConfig) -> Result<ApiClient, String> {
    ApiClient::new(&run.api).map_err(|e| e.to_string())
}

fn criteria_input(t: &TargetingArgs) -> CriteriaInput {
    CriteriaInput {
        secteur: t.secteur.clone().unwrap_or_default(),
        opportunite: t.opportunite.clone().unwrap_or_default(),
        statut: t.statut.clone().unwrap_or_default(),
        tags: t.tags.clone().unwrap_or_default(),
        score_max: t.score_max.clone().unwrap_or_default(),
        exclude_already_contacted: t.exclude_contacted,
    }
}

/// Opens the wizard and drives its targeting step from the flags. Returns
/// the resolved mode.
async fn apply_targeting(
    session: &mut WizardSession,
    t: &TargetingArgs,
) -> Result<TargetingMode, String> {
    let mode = validation::targeting_mode(t)?;
    session.open().await;
    session.switch_mode(mode).await.map_err(|e| e.to_string())?;
    match mode {
        TargetingMode::Toutes => {}
        TargetingMode::Objectif => {
            let id = t.objective.as_deref().unwrap_or_default();
            session.select_objective(id).await.map_err(|e| e.to_string())?;
        }
        TargetingMode::Segment => {
            let id = t.segment.unwrap_or_default();
            session.select_segment(id).await.map_err(|e| e.to_string())?;
        }
        TargetingMode::Groupes => {
            let ids = crate::utils::parse_i64_list_csv(t.groups.as_deref().unwrap_or_default())?;
            for id in ids {
                session.toggle_group(id, true).await.map_err(|e| e.to_string())?;
            }
        }
        TargetingMode::Criteres => {
            session
                .edit_criteria(criteria_input(t))
                .await
                .map_err(|e| e.to_string())?;
            session.settle().await;
        }
    }
    if let Some(term) = t.search.as_deref() {
        session
            .update(|s| {
                s.set_search(term);
                Ok(Vec::new())
            })
            .await
            .map_err(|e| e.to_string())?;
    }

    let state = session.snapshot().await;
    if let Some(err) = state.pool().error() {
        return Err(err.to_string());
    }
    if let Some(notice) = state.pool().notice() {
        print_status(Level::Warn, notice);
    }
    Ok(mode)
}

async fn run_companies(run: &RunConfig, args: &CompaniesArgs) -> Result<(), String> {
    let api = client(run)?;
    let mut session = WizardSession::new(api.clone(), WizardMode::ThreeStep, run.debounce);
    let pb = spinner("Loading companies")?;
    let mode = apply_targeting(&mut session, &args.targeting).await;
    pb.finish_and_clear();
    let mode = mode?;

    let state = session.snapshot().await;
    let visible = state.visible_companies();
    match run.format {
        OutputFormat::Text => write_stdout(&output::render_companies_text(&visible))?,
        OutputFormat::Json => write_stdout(&output::render_json(&visible))?,
    }

    if let Some(nom) = args.save_segment.as_deref() {
        if mode != TargetingMode::Criteres {
            return Err("--save only applies to criteria targeting".to_string());
        }
        let criteres = criteria_input(&args.targeting).to_criteria();
        let created = api
            .save_segment(nom, args.segment_description.as_deref(), &criteres)
            .await
            .map_err(|e| format!("failed to save segment: {e}"))?;
        print_status(
            Level::Info,
            &format!("segment '{}' saved (id {})", created.nom, created.id),
        );
    }
    Ok(())
}

fn email_filters(args: &CreateArgs) -> EmailFilters {
    EmailFilters::from_raw(
        args.person_only,
        args.with_name,
        args.exclude_domains.as_deref().unwrap_or_default(),
        args.exclude_contains.as_deref().unwrap_or_default(),
    )
}

async fn select_recipients(session: &WizardSession, args: &CreateArgs) -> Result<(), String> {
    let emails = match args.emails.as_deref() {
        Some(raw) => crate::utils::split_csv_lowercase(raw),
        None => {
            let mode = args
                .select
                .as_deref()
                .and_then(QuickSelect::parse)
                .unwrap_or(QuickSelect::All);
            return session
                .quick_select_recipients(mode)
                .await
                .map_err(|e| e.to_string());
        }
    };
    let state = session.state();
    let mut state = state.lock().await;
    let view = state.displayed().to_vec();
    let mut missing = emails.clone();
    for company in &view {
        for (index, contact) in company.emails.iter().enumerate() {
            let email = contact.email.to_lowercase();
            if emails.contains(&email) {
                state
                    .toggle_email(company.id, index, true)
                    .map_err(|e| e.to_string())?;
                missing.retain(|m| *m != email);
            }
        }
    }
    if !missing.is_empty() {
        return Err(format!("not in the recipient list: {}", missing.join(", ")));
    }
    Ok(())
}

async fn fill_compose(session: &WizardSession, run: &RunConfig, args: &CreateArgs) -> Result<(), String> {
    let state = session.state();
    let mut state = state.lock().await;
    if let Some(id) = args.template.as_deref() {
        state.select_template(Some(id)).map_err(|e| e.to_string())?;
    }
    let form = state.compose_mut().map_err(|e| e.to_string())?;
    if let Some(subject) = args.subject.as_deref() {
        form.sujet = subject.to_string();
    }
    if let Some(message) = args.message.as_deref() {
        form.custom_message = message.to_string();
    }
    form.nom = args.name.clone();
    form.delay = Some(args.delay.unwrap_or(run.delay));
    if let (Some(date), Some(time)) = (args.date.as_deref(), args.time.as_deref()) {
        form.send_mode = SendMode::Scheduled;
        form.schedule_date = Some(validation::parse_date(date)?);
        form.schedule_time = Some(validation::parse_time(time)?);
    }
    if let Some(kind) = args.suggest.as_deref().and_then(SuggestionKind::parse) {
        let slot = state
            .apply_suggestion(kind, Local::now().naive_local())
            .map_err(|e| e.to_string())?;
        print_status(
            Level::Info,
            &format!("{} : {} {}", slot.label, slot.date.format("%d/%m/%Y"), slot.time_label),
        );
    }
    Ok(())
}

async fn run_create(run: &RunConfig, args: &CreateArgs) -> Result<(), String> {
    let api = client(run)?;
    let mode = if args.two_step {
        WizardMode::TwoStep
    } else {
        WizardMode::ThreeStep
    };
    let mut session = WizardSession::new(api, mode, run.debounce);
    format_kv_line("Server", &run.api.base_url);

    let pb = spinner("Loading companies")?;
    let targeted = apply_targeting(&mut session, &args.targeting).await;
    pb.finish_and_clear();
    let targeting_mode = targeted?;
    format_kv_line("Targeting", targeting_mode.as_str());

    if mode == WizardMode::ThreeStep {
        if args.all {
            session
                .quick_select_companies(QuickSelect::All)
                .await
                .map_err(|e| e.to_string())?;
        } else {
            let raw = args
                .companies
                .as_deref()
                .ok_or_else(|| "select companies with --companies or --all".to_string())?;
            for id in crate::utils::parse_i64_list_csv(raw)? {
                session.toggle_company(id, true).await.map_err(|e| e.to_string())?;
            }
        }
    }
    session.set_email_filters(email_filters(args)).await;
    if mode == WizardMode::ThreeStep {
        session.next().await.map_err(|e| e.to_string())?;
    }
    select_recipients(&session, args).await?;

    let pb = spinner("Loading templates")?;
    let entered = session.next().await;
    pb.finish_and_clear();
    entered.map_err(|e| e.to_string())?;
    fill_compose(&session, run, args).await?;

    let state = session.snapshot().await;
    format_kv_line("Companies", &state.company_selection().len().to_string());
    format_kv_line("Recipients", &state.recipients().len().to_string());

    if args.dry_run {
        let draft = state.build_draft(&Local::now()).map_err(|e| e.to_string())?;
        match run.format {
            OutputFormat::Text => write_stdout(&output::render_draft_text(&draft))?,
            OutputFormat::Json => write_stdout(&output::render_json(&draft))?,
        }
        return Ok(());
    }

    let pb = spinner("Creating campaign")?;
    let submitted = session.submit().await;
    pb.finish_and_clear();
    let response = submitted.map_err(|e| e.to_string())?;
    match run.format {
        OutputFormat::Json => write_stdout(&output::render_json(&response))?,
        OutputFormat::Text => {
            let id = response
                .campagne_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            match response.scheduled_at.as_deref() {
                Some(at) => print_status(Level::Info, &format!("campaign {id} scheduled for {at}")),
                None => print_status(Level::Info, &format!("campaign {id} started")),
            }
            if let Some(task) = response.task_id.as_deref() {
                format_kv_line("Task", task);
            }
        }
    }
    Ok(())
}

async fn run_list(run: &RunConfig, args: &ListArgs) -> Result<(), String> {
    let api = client(run)?;
    let filter = CampaignFilter::new(
        args.search.as_deref(),
        args.statut.as_deref(),
        args.from.as_deref().map(validation::parse_date).transpose()?,
        args.until.as_deref().map(validation::parse_date).transpose()?,
    );
    let campaigns = api
        .campaigns(filter.statut.as_deref())
        .await
        .map_err(|e| format!("failed to load campaigns: {e}"))?;
    let shown = filter.apply(&campaigns);
    match run.format {
        OutputFormat::Text => write_stdout(&output::render_campaigns_text(&shown)),
        OutputFormat::Json => write_stdout(&output::render_json(&shown)),
    }
}

fn print_stats(format: OutputFormat, stats: &CampaignStats) -> Result<(), String> {
    match format {
        OutputFormat::Text => write_stdout(&output::render_stats_text(stats)),
        OutputFormat::Json => write_stdout(&output::render_json(stats)),
    }
}

async fn run_results(run: &RunConfig, args: &ResultsArgs) -> Result<(), String> {
    let api = client(run)?;
    let id = args.id;
    let stats = api
        .campaign_stats(id)
        .await
        .map_err(|e| format!("failed to load results of campaign {id}: {e}"))?;
    print_stats(run.format, &stats)?;
    if !args.follow {
        return Ok(());
    }

    print_status(
        Level::Info,
        &format!(
            "refreshing every {}s, Ctrl-C to stop",
            run.poll_interval.as_secs()
        ),
    );
    let (visible_tx, visible_rx) = watch::channel(true);
    let (tx, mut rx) = mpsc::channel::<CampaignStats>(4);
    let fetch = move || {
        let api = api.clone();
        async move { api.campaign_stats(id).await }
    };
    let handle = progress::spawn_poller(run.poll_interval, visible_rx, fetch, tx);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(stats) => {
                    if run.format == OutputFormat::Text {
                        eprintln!(":: {}", Local::now().format("%H:%M:%S"));
                    }
                    print_stats(run.format, &stats)?;
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                let _ = visible_tx.send(false);
                break;
            }
        }
    }
    handle
        .await
        .map_err(|e| format!("results poller failed: {e}"))
}

async fn run_delete(run: &RunConfig, id: i64) -> Result<(), String> {
    let api = client(run)?;
    api.delete_campaign(id)
        .await
        .map_err(|e| format!("failed to delete campaign {id}: {e}"))?;
    print_status(Level::Info, &format!("campaign {id} deleted"));
    Ok(())
}

fn run_suggest(run: &RunConfig, now: Option<&str>) -> Result<(), String> {
    let now = match now {
        Some(raw) => validation::parse_local_datetime(raw)?,
        None => Local::now().naive_local(),
    };
    let slots: Vec<_> = SuggestionKind::ALL
        .iter()
        .map(|kind| schedule::suggested_slot(*kind, now))
        .collect();
    match run.format {
        OutputFormat::Text => write_stdout(&output::render_slots_text(&slots)),
        OutputFormat::Json => write_stdout(&output::render_json(&slots)),
    }
}

fn run_holidays(run: &RunConfig, year: i32) -> Result<(), String> {
    let days = schedule::french_holidays(year);
    match run.format {
        OutputFormat::Text => write_stdout(&output::render_holidays_text(&days)),
        OutputFormat::Json => write_stdout(&output::render_json(&days)),
    }
}

fn run_init_config(run: &RunConfig) -> Result<(), String> {
    let path = run
        .config_path
        .clone()
        .or_else(config::default_config_path)
        .ok_or_else(|| "cannot locate the home directory, pass --config".to_string())?;
    if config::ensure_default_config_file(&path)? {
        print_status(Level::Info, &format!("config written to {}", path.display()));
    } else {
        print_status(Level::Warn, &format!("config already exists at {}", path.display()));
    }
    Ok(())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    match &run.command {
        Command::Companies(args) => run_companies(&run, args).await,
        Command::Create(args) => run_create(&run, args).await,
        Command::List(args) => run_list(&run, args).await,
        Command::Results(args) => run_results(&run, args).await,
        Command::Delete(args) => run_delete(&run, args.id).await,
        Command::Suggest(args) => run_suggest(&run, args.now.as_deref()),
        Command::Holidays(args) => run_holidays(&run, args.year),
        Command::InitConfig => run_init_config(&run),
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let explicit_config = args.config.as_deref().map(config::expand_tilde);
    let cfg = match explicit_config.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg, explicit_config)?;
    init_tracing(run.verbose);
    tracing::debug!(base_url = %run.api.base_url, "configuration loaded");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    let result = rt.block_on(run_async(run));
    if let Err(e) = &result {
        print_status(Level::Error, e);
    }
    result
}
