use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "prospectlab",
    version,
    about = "ProspectLab campaign client",
    long_about = "Command-line client for the ProspectLab prospecting server: target companies, pick recipients, schedule email campaigns and follow their results.\n\nExamples:\n  prospectlab companies --mode objectif --objective audit_securite\n  prospectlab create --secteur Technologie --all --template relance --schedule-suggest tomorrow-morning\n  prospectlab results 42 --follow\n\nTip: run `prospectlab init-config` once and keep the server URL and token in ~/.prospectlab/config.yml."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "nc",
        visible_alias = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'f',
        long = "fmt",
        visible_alias = "format",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub format: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Server",
        help = "Path to config file (defaults to ~/.prospectlab/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'u',
        long = "url",
        visible_alias = "base-url",
        value_name = "URL",
        env = "PROSPECTLAB_URL",
        global = true,
        help_heading = "Server",
        help = "ProspectLab server URL."
    )]
    pub base_url: Option<String>,

    #[arg(
        long = "tk",
        visible_alias = "token",
        value_name = "TOKEN",
        env = "PROSPECTLAB_TOKEN",
        hide_env_values = true,
        global = true,
        help_heading = "Server",
        help = "API token sent as a bearer token."
    )]
    pub api_token: Option<String>,

    #[arg(
        long = "to",
        visible_alias = "timeout",
        value_name = "SECS",
        global = true,
        help_heading = "Server",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "Server",
        help = "HTTP(S) proxy for API requests."
    )]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve a targeting mode and list the candidate companies.
    Companies(CompaniesArgs),
    /// Walk the campaign wizard from flags and submit the campaign.
    Create(CreateArgs),
    /// List campaigns.
    List(ListArgs),
    /// Show the tracking results of a campaign.
    Results(ResultsArgs),
    /// Delete a campaign.
    Delete(DeleteArgs),
    /// Print the suggested send slots.
    Suggest(SuggestArgs),
    /// Print the French public holidays of a year.
    Holidays(HolidaysArgs),
    /// Write the default config file if none exists.
    InitConfig,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetingArgs {
    #[arg(
        short = 'm',
        long = "mode",
        value_name = "MODE",
        help_heading = "Targeting",
        help = "toutes, objectif, criteres, groupes or segment (inferred from the other flags when omitted)."
    )]
    pub mode: Option<String>,

    #[arg(
        long = "obj",
        visible_alias = "objective",
        value_name = "ID",
        help_heading = "Targeting",
        help = "Objective id."
    )]
    pub objective: Option<String>,

    #[arg(
        long = "seg",
        visible_alias = "segment",
        value_name = "ID",
        help_heading = "Targeting",
        help = "Saved segment id."
    )]
    pub segment: Option<i64>,

    #[arg(
        short = 'g',
        long = "grp",
        visible_alias = "groups",
        value_name = "IDS",
        help_heading = "Targeting",
        help = "Comma separated group ids."
    )]
    pub groups: Option<String>,

    #[arg(
        long = "secteur",
        visible_alias = "sector",
        value_name = "TEXT",
        help_heading = "Criteria",
        help = "Sector contains."
    )]
    pub secteur: Option<String>,

    #[arg(
        long = "opportunite",
        visible_alias = "opportunity",
        value_name = "LIST",
        help_heading = "Criteria",
        help = "Comma separated opportunity levels."
    )]
    pub opportunite: Option<String>,

    #[arg(
        long = "statut",
        visible_alias = "status",
        value_name = "TEXT",
        help_heading = "Criteria",
        help = "Prospect status."
    )]
    pub statut: Option<String>,

    #[arg(
        long = "tags",
        value_name = "TEXT",
        help_heading = "Criteria",
        help = "Tags contain."
    )]
    pub tags: Option<String>,

    #[arg(
        long = "smax",
        visible_alias = "score-max",
        value_name = "N",
        help_heading = "Criteria",
        help = "Maximum security score."
    )]
    pub score_max: Option<String>,

    #[arg(
        long = "xc",
        visible_alias = "exclude-contacted",
        help_heading = "Criteria",
        help = "Skip companies already contacted by a campaign."
    )]
    pub exclude_contacted: bool,

    #[arg(
        short = 's',
        long = "search",
        value_name = "TEXT",
        help_heading = "Targeting",
        help = "Narrow the pool by name, sector or email."
    )]
    pub search: Option<String>,
}

impl TargetingArgs {
    pub fn has_criteria(&self) -> bool {
        self.secteur.is_some()
            || self.opportunite.is_some()
            || self.statut.is_some()
            || self.tags.is_some()
            || self.score_max.is_some()
            || self.exclude_contacted
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct CompaniesArgs {
    #[command(flatten)]
    pub targeting: TargetingArgs,

    #[arg(
        long = "save",
        visible_alias = "save-segment",
        value_name = "NAME",
        help_heading = "Segments",
        help = "Save the criteria as a named segment."
    )]
    pub save_segment: Option<String>,

    #[arg(
        long = "desc",
        visible_alias = "segment-description",
        value_name = "TEXT",
        requires = "save_segment",
        help_heading = "Segments",
        help = "Description of the saved segment."
    )]
    pub segment_description: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CreateArgs {
    #[command(flatten)]
    pub targeting: TargetingArgs,

    #[arg(
        long = "two-step",
        help_heading = "Wizard",
        help = "Pick recipients on the targeting step (two-step wizard)."
    )]
    pub two_step: bool,

    #[arg(
        short = 'c',
        long = "companies",
        value_name = "IDS",
        conflicts_with = "all",
        help_heading = "Selection",
        help = "Comma separated company ids to select."
    )]
    pub companies: Option<String>,

    #[arg(
        short = 'a',
        long = "all",
        help_heading = "Selection",
        help = "Select every visible company."
    )]
    pub all: bool,

    #[arg(
        long = "po",
        visible_alias = "person-only",
        help_heading = "Recipients",
        help = "Keep only contacts identified as people."
    )]
    pub person_only: bool,

    #[arg(
        long = "wn",
        visible_alias = "with-name",
        help_heading = "Recipients",
        help = "Keep only contacts with a name."
    )]
    pub with_name: bool,

    #[arg(
        long = "xd",
        visible_alias = "exclude-domains",
        value_name = "LIST",
        help_heading = "Recipients",
        help = "Comma separated domains to exclude (subdomains included)."
    )]
    pub exclude_domains: Option<String>,

    #[arg(
        long = "xe",
        visible_alias = "exclude-contains",
        value_name = "TEXT",
        help_heading = "Recipients",
        help = "Exclude emails containing this text."
    )]
    pub exclude_contains: Option<String>,

    #[arg(
        long = "em",
        visible_alias = "emails",
        value_name = "LIST",
        conflicts_with = "select",
        help_heading = "Recipients",
        help = "Comma separated emails to select instead of every visible one."
    )]
    pub emails: Option<String>,

    #[arg(
        long = "sel",
        visible_alias = "select",
        value_name = "MODE",
        help_heading = "Recipients",
        help = "Quick select over visible emails: all, none or invert (default all)."
    )]
    pub select: Option<String>,

    #[arg(
        short = 't',
        long = "tpl",
        visible_alias = "template",
        value_name = "ID",
        help_heading = "Message",
        help = "Template id."
    )]
    pub template: Option<String>,

    #[arg(
        long = "subject",
        visible_alias = "sujet",
        value_name = "TEXT",
        help_heading = "Message",
        help = "Email subject (overrides the template subject)."
    )]
    pub subject: Option<String>,

    #[arg(
        long = "msg",
        visible_alias = "message",
        value_name = "TEXT",
        help_heading = "Message",
        help = "Custom message body."
    )]
    pub message: Option<String>,

    #[arg(
        short = 'n',
        long = "name",
        value_name = "TEXT",
        help_heading = "Message",
        help = "Campaign name (generated when omitted)."
    )]
    pub name: Option<String>,

    #[arg(
        short = 'd',
        long = "delay",
        value_name = "SECS",
        help_heading = "Sending",
        help = "Seconds between two emails."
    )]
    pub delay: Option<u32>,

    #[arg(
        long = "date",
        value_name = "YYYY-MM-DD",
        requires = "time",
        help_heading = "Sending",
        help = "Schedule the campaign on this local date."
    )]
    pub date: Option<String>,

    #[arg(
        long = "time",
        value_name = "HH:MM",
        requires = "date",
        help_heading = "Sending",
        help = "Schedule time, local."
    )]
    pub time: Option<String>,

    #[arg(
        long = "suggest",
        value_name = "SLOT",
        conflicts_with_all = ["date", "time"],
        help_heading = "Sending",
        help = "Schedule on a suggested slot: tomorrow-morning, tomorrow-afternoon or monday-morning."
    )]
    pub suggest: Option<String>,

    #[arg(
        long = "dry-run",
        help_heading = "Sending",
        help = "Print the campaign request without sending it."
    )]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 's', long = "search", value_name = "TEXT", help = "Name, subject or template contains.")]
    pub search: Option<String>,

    #[arg(long = "statut", visible_alias = "status", value_name = "STATUS", help = "Exact campaign status.")]
    pub statut: Option<String>,

    #[arg(long = "from", value_name = "YYYY-MM-DD", help = "Created on or after this day.")]
    pub from: Option<String>,

    #[arg(long = "until", visible_alias = "date-to", value_name = "YYYY-MM-DD", help = "Created on or before this day.")]
    pub until: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ResultsArgs {
    #[arg(value_name = "ID", help = "Campaign id.")]
    pub id: i64,

    #[arg(
        short = 'F',
        long = "follow",
        help = "Refresh the results until interrupted."
    )]
    pub follow: bool,

    #[arg(
        long = "interval",
        value_name = "SECS",
        help = "Seconds between two refreshes with --follow."
    )]
    pub interval: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteArgs {
    #[arg(value_name = "ID", help = "Campaign id.")]
    pub id: i64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SuggestArgs {
    #[arg(
        long = "now",
        value_name = "YYYY-MM-DD HH:MM",
        help = "Reference time instead of the local clock."
    )]
    pub now: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct HolidaysArgs {
    #[arg(value_name = "YEAR", help = "Calendar year.")]
    pub year: i32,
}
