use chrono::{NaiveDate, NaiveTime};

use crate::cli::args::{CliArgs, Command, CreateArgs, ListArgs, TargetingArgs};
use crate::schedule::SuggestionKind;
use crate::selection::QuickSelect;
use crate::targeting::TargetingMode;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.format.as_deref() {
        crate::output::OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid --format '{raw}', expected text or json"))?;
    }
    match &args.command {
        Command::Companies(c) => validate_targeting(&c.targeting)?,
        Command::Create(c) => validate_create(c)?,
        Command::List(l) => validate_list(l)?,
        Command::Results(r) => {
            if r.id <= 0 {
                return Err("invalid campaign id, expected positive integer".to_string());
            }
            if r.interval == Some(0) {
                return Err("invalid interval, expected positive integer".to_string());
            }
        }
        Command::Delete(d) => {
            if d.id <= 0 {
                return Err("invalid campaign id, expected positive integer".to_string());
            }
        }
        Command::Suggest(s) => {
            if let Some(raw) = s.now.as_deref() {
                parse_local_datetime(raw)?;
            }
        }
        Command::Holidays(h) => {
            if !(1583..=9999).contains(&h.year) {
                return Err(format!("invalid year {}, expected 1583..=9999", h.year));
            }
        }
        Command::InitConfig => {}
    }
    Ok(())
}

/// Targeting mode from `--mode`, or inferred from whichever targeting flag
/// was given.
pub fn targeting_mode(t: &TargetingArgs) -> Result<TargetingMode, String> {
    if let Some(raw) = t.mode.as_deref() {
        return TargetingMode::parse(raw).ok_or_else(|| {
            format!("invalid --mode '{raw}', expected toutes, objectif, criteres, groupes or segment")
        });
    }
    let mut inferred = Vec::new();
    if t.objective.is_some() {
        inferred.push(TargetingMode::Objectif);
    }
    if t.segment.is_some() {
        inferred.push(TargetingMode::Segment);
    }
    if t.groups.is_some() {
        inferred.push(TargetingMode::Groupes);
    }
    if t.has_criteria() {
        inferred.push(TargetingMode::Criteres);
    }
    match inferred.as_slice() {
        [] => Ok(TargetingMode::Toutes),
        [mode] => Ok(*mode),
        _ => Err("targeting flags of several modes given, pick one with --mode".to_string()),
    }
}

fn validate_targeting(t: &TargetingArgs) -> Result<(), String> {
    let mode = targeting_mode(t)?;
    let require = |present: bool, flag: &str| {
        if present {
            Ok(())
        } else {
            Err(format!("--mode {} needs {flag}", mode.as_str()))
        }
    };
    match mode {
        TargetingMode::Objectif => require(t.objective.is_some(), "--objective")?,
        TargetingMode::Segment => require(t.segment.is_some(), "--segment")?,
        TargetingMode::Groupes => require(t.groups.is_some(), "--groups")?,
        TargetingMode::Toutes | TargetingMode::Criteres => {}
    }
    if let Some(raw) = t.groups.as_deref() {
        crate::utils::parse_i64_list_csv(raw).map_err(|e| format!("invalid --groups '{raw}': {e}"))?;
    }
    if let Some(raw) = t.score_max.as_deref() {
        raw.trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid --score-max '{raw}', expected integer"))?;
    }
    Ok(())
}

fn validate_create(c: &CreateArgs) -> Result<(), String> {
    validate_targeting(&c.targeting)?;
    if c.two_step && (c.companies.is_some() || c.all) {
        return Err("--companies and --all only apply to the three-step wizard".to_string());
    }
    if let Some(raw) = c.companies.as_deref() {
        crate::utils::parse_i64_list_csv(raw)
            .map_err(|e| format!("invalid --companies '{raw}': {e}"))?;
    }
    if let Some(raw) = c.select.as_deref() {
        QuickSelect::parse(raw)
            .ok_or_else(|| format!("invalid --select '{raw}', expected all, none or invert"))?;
    }
    if let Some(raw) = c.date.as_deref() {
        parse_date(raw)?;
    }
    if let Some(raw) = c.time.as_deref() {
        parse_time(raw)?;
    }
    if let Some(raw) = c.suggest.as_deref() {
        SuggestionKind::parse(raw).ok_or_else(|| {
            format!("invalid --suggest '{raw}', expected tomorrow-morning, tomorrow-afternoon or monday-morning")
        })?;
    }
    Ok(())
}

fn validate_list(l: &ListArgs) -> Result<(), String> {
    let from = l.from.as_deref().map(parse_date).transpose()?;
    let until = l.until.as_deref().map(parse_date).transpose()?;
    if let (Some(from), Some(until)) = (from, until) {
        if from > until {
            return Err(format!("--from {from} is after --until {until}"));
        }
    }
    Ok(())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| format!("invalid time '{raw}', expected HH:MM"))
}

pub fn parse_local_datetime(raw: &str) -> Result<chrono::NaiveDateTime, String> {
    chrono::NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M")
        .map_err(|_| format!("invalid time '{raw}', expected YYYY-MM-DD HH:MM"))
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        let mut full = vec!["prospectlab"];
        full.extend_from_slice(argv);
        CliArgs::try_parse_from(full).unwrap()
    }

    fn targeting(args: &CliArgs) -> &TargetingArgs {
        match &args.command {
            Command::Companies(c) => &c.targeting,
            Command::Create(c) => &c.targeting,
            _ => panic!("no targeting flags"),
        }
    }

    #[test]
    fn mode_is_inferred_from_flags() {
        let args = parse(&["companies", "--objective", "audit"]);
        assert_eq!(targeting_mode(targeting(&args)), Ok(TargetingMode::Objectif));
        let args = parse(&["companies", "--sector", "Tech"]);
        assert_eq!(targeting_mode(targeting(&args)), Ok(TargetingMode::Criteres));
        let args = parse(&["companies"]);
        assert_eq!(targeting_mode(targeting(&args)), Ok(TargetingMode::Toutes));
        let args = parse(&["companies", "--objective", "audit", "--groups", "1"]);
        assert!(targeting_mode(targeting(&args)).is_err());
    }

    #[test]
    fn explicit_mode_needs_its_input() {
        assert!(validate(&parse(&["companies", "--mode", "segment"])).is_err());
        assert!(validate(&parse(&["companies", "--mode", "segment", "--segment", "3"])).is_ok());
        assert!(validate(&parse(&["companies", "--mode", "nope"])).is_err());
    }

    #[test]
    fn create_flags_are_checked() {
        assert!(validate(&parse(&["create", "--all", "--date", "2024-05-16", "--time", "09:00"])).is_ok());
        assert!(validate(&parse(&["create", "--date", "16/05/2024", "--time", "09:00"])).is_err());
        assert!(validate(&parse(&["create", "--suggest", "tonight"])).is_err());
        assert!(validate(&parse(&["create", "--two-step", "--all"])).is_err());
        assert!(validate(&parse(&["create", "--companies", "1,x"])).is_err());
        assert!(CliArgs::try_parse_from(["prospectlab", "create", "--date", "2024-05-16"]).is_err());
    }

    #[test]
    fn list_bounds_must_be_ordered() {
        assert!(validate(&parse(&["list", "--from", "2024-05-03", "--until", "2024-05-01"])).is_err());
        assert!(validate(&parse(&["list", "--from", "2024-05-01", "--date-to", "2024-05-03"])).is_ok());
    }

    #[test]
    fn every_subcommand_builds() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn list_timeout_and_until_are_distinct() {
        let args = parse(&["list", "--timeout", "5", "--date-to", "2024-05-03"]);
        assert_eq!(args.timeout, Some(5));
        match &args.command {
            Command::List(l) => assert_eq!(l.until.as_deref(), Some("2024-05-03")),
            other => panic!("unexpected command {:?}", other),
        }
        let args = parse(&["list", "--to", "7"]);
        assert_eq!(args.timeout, Some(7));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = parse(&["holidays", "2024", "-vv", "--format", "json"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.format.as_deref(), Some("json"));
        assert!(validate(&parse(&["holidays", "1200"])).is_err());
        assert!(validate(&parse(&["list", "--format", "xml"])).is_err());
    }
}
