use std::{
    env,
    io::{self, Write},
    process::{Command, Stdio},
};

use chrono::{Local, NaiveDate, NaiveDateTime};

use sked::{
    calendar::{
        Event,
        agenda::{DayGroup, group_by_day},
        recurrence::{self, Frequency, RecurrenceRule, Termination, Weekday},
    },
    remote::{events_api::EventDraft, identity::IdentityClient, service::Scheduler},
    storage::config::Config,
};

pub const USAGE: &str = "\
Usage: sked <command> [options]

Commands:
  signup <username>        Create an account (password read from stdin)
  login <username>         Sign in (password read from stdin)
  logout                   Drop the cached session token
  list                     Show all events grouped by day
  agenda [YYYY/MM/DD]      Show one day with recurring events expanded
  add [options]            Create an event
  edit <id> [options]      Update an event
  delete <id> [--on-date YYYY-MM-DD]
                           Delete an event, or one occurrence of a
                           recurring event

Event options:
  --title <text>           Event title
  --start <YYYY-MM-DDTHH:MM>
  --end <YYYY-MM-DDTHH:MM>
  --description <text>
  --repeat daily|weekly|monthly
  --no-repeat              Clear recurrence on edit
  --every <n>              Repeat every n units (default 1)
  --on MO,TU,..            Weekday restriction (weekly only)
  --count <n>              Stop after n occurrences
  --until <YYYY-MM-DD>     Last possible occurrence date (inclusive)
  --on-date <YYYY-MM-DD>   Which occurrence to edit (edit only)";

#[derive(Debug, PartialEq)]
pub enum CliCommand {
    SignUp { username: String },
    Login { username: String },
    Logout,
    List,
    Agenda { date: NaiveDate },
    Add(EventArgs),
    Edit { id: String, args: EventArgs },
    Delete { id: String, on_date: Option<NaiveDate> },
    Help,
}

#[derive(Debug, Default, PartialEq)]
pub struct EventArgs {
    pub title: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub repeat: Option<Frequency>,
    pub no_repeat: bool,
    pub every: Option<u32>,
    pub on: Vec<Weekday>,
    pub count: Option<u32>,
    pub until: Option<NaiveDate>,
    pub on_date: Option<NaiveDate>,
}

pub fn parse_command(args: &[String]) -> Result<CliCommand, String> {
    let mut iter = args.iter();
    let Some(command) = iter.next() else {
        return Ok(CliCommand::Help);
    };

    match command.as_str() {
        "signup" => Ok(CliCommand::SignUp {
            username: username_arg(&mut iter, "signup")?,
        }),
        "login" => Ok(CliCommand::Login {
            username: username_arg(&mut iter, "login")?,
        }),
        "logout" => Ok(CliCommand::Logout),
        "list" => Ok(CliCommand::List),
        "agenda" => {
            let date = match iter.next() {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y/%m/%d")
                    .map_err(|_| format!("Invalid date '{}'. Use YYYY/MM/DD.", raw))?,
                None => Local::now().date_naive(),
            };
            Ok(CliCommand::Agenda { date })
        }
        "add" => Ok(CliCommand::Add(parse_event_args(&mut iter, false)?)),
        "edit" => {
            let id = iter
                .next()
                .ok_or("edit needs an event id".to_string())?
                .clone();
            Ok(CliCommand::Edit {
                id,
                args: parse_event_args(&mut iter, true)?,
            })
        }
        "delete" => {
            let id = iter
                .next()
                .ok_or("delete needs an event id".to_string())?
                .clone();
            let mut on_date = None;
            while let Some(flag) = iter.next() {
                match flag.as_str() {
                    "--on-date" => on_date = Some(parse_date(&flag_value(&mut iter, "--on-date")?)?),
                    other => return Err(format!("Unknown argument: {}", other)),
                }
            }
            Ok(CliCommand::Delete { id, on_date })
        }
        "help" | "--help" => Ok(CliCommand::Help),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn username_arg(iter: &mut std::slice::Iter<'_, String>, command: &str) -> Result<String, String> {
    iter.next()
        .map(|s| s.clone())
        .ok_or(format!("{} needs a username", command))
}

fn flag_value(iter: &mut std::slice::Iter<'_, String>, flag: &str) -> Result<String, String> {
    iter.next()
        .map(|s| s.clone())
        .ok_or(format!("{} needs a value", flag))
}

fn parse_event_args(
    iter: &mut std::slice::Iter<'_, String>,
    allow_occurrence: bool,
) -> Result<EventArgs, String> {
    let mut out = EventArgs::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--title" => out.title = Some(flag_value(iter, "--title")?),
            "--start" => out.start = Some(parse_datetime(&flag_value(iter, "--start")?)?),
            "--end" => out.end = Some(parse_datetime(&flag_value(iter, "--end")?)?),
            "--description" => out.description = Some(flag_value(iter, "--description")?),
            "--repeat" => out.repeat = Some(parse_frequency(&flag_value(iter, "--repeat")?)?),
            "--no-repeat" => out.no_repeat = true,
            "--every" => {
                let raw = flag_value(iter, "--every")?;
                let every = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or(format!("Invalid interval '{}'.", raw))?;
                out.every = Some(every);
            }
            "--on" => out.on = parse_weekdays(&flag_value(iter, "--on")?)?,
            "--count" => {
                let raw = flag_value(iter, "--count")?;
                let count = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or(format!("Invalid count '{}'.", raw))?;
                out.count = Some(count);
            }
            "--until" => out.until = Some(parse_date(&flag_value(iter, "--until")?)?),
            "--on-date" if allow_occurrence => {
                out.on_date = Some(parse_date(&flag_value(iter, "--on-date")?)?);
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    Ok(out)
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or(format!("Invalid datetime '{}'. Use YYYY-MM-DDTHH:MM.", raw))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD.", raw))
}

fn parse_frequency(raw: &str) -> Result<Frequency, String> {
    match raw.to_lowercase().as_str() {
        "daily" => Ok(Frequency::Daily),
        "weekly" => Ok(Frequency::Weekly),
        "monthly" => Ok(Frequency::Monthly),
        other => Err(format!(
            "Invalid frequency '{}'. Use daily, weekly or monthly.",
            other
        )),
    }
}

fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>, String> {
    raw.split(',')
        .map(|code| {
            Weekday::from_code(&code.trim().to_uppercase())
                .ok_or(format!("Invalid weekday '{}'. Use MO,TU,..,SU.", code))
        })
        .collect()
}

/// Combines recurrence flags with an event's existing rule into the rule
/// to store, or an error when the flags contradict each other.
pub fn build_rule(
    args: &EventArgs,
    existing: Option<RecurrenceRule>,
) -> Result<Option<RecurrenceRule>, String> {
    if args.no_repeat {
        return Ok(None);
    }

    let has_recurrence_flags =
        args.every.is_some() || !args.on.is_empty() || args.count.is_some() || args.until.is_some();

    let mut rule = match (args.repeat, existing) {
        (Some(frequency), Some(mut rule)) => {
            rule.frequency = frequency;
            rule
        }
        (Some(frequency), None) => RecurrenceRule::new(frequency),
        (None, Some(rule)) => rule,
        (None, None) => {
            if has_recurrence_flags {
                return Err("--every, --on, --count and --until require --repeat".to_string());
            }
            return Ok(None);
        }
    };

    if args.count.is_some() && args.until.is_some() {
        return Err("Choose one of --count or --until, not both.".to_string());
    }

    if let Some(every) = args.every {
        rule.interval = every;
    }

    if !args.on.is_empty() {
        if rule.frequency != Frequency::Weekly {
            return Err("--on only applies to weekly rules.".to_string());
        }
        rule.by_week_day = args.on.clone();
    }

    if let Some(count) = args.count {
        rule.termination = Termination::AfterCount(count);
    } else if let Some(until) = args.until {
        rule.termination = Termination::Until(until);
    }

    Ok(Some(rule))
}

fn load_config() -> io::Result<Config> {
    Config::load_or_create().map_err(|e| io::Error::other(e.to_string()))
}

fn prompt_password() -> io::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn run_signup(username: String) -> io::Result<()> {
    let config = load_config()?;
    let mut identity = IdentityClient::new(config);
    let password = prompt_password()?;

    match identity.sign_up(&username, &password).await {
        Ok(_) => println!("Account created. Signed in as {}.", username),
        Err(e) => eprintln!("Sign up failed: {}", e),
    }
    Ok(())
}

pub async fn run_login(username: String) -> io::Result<()> {
    let config = load_config()?;
    let mut identity = IdentityClient::new(config);
    let password = prompt_password()?;

    match identity.sign_in(&username, &password).await {
        Ok(_) => println!("Signed in as {}.", username),
        Err(e) => eprintln!("Login failed: {}", e),
    }
    Ok(())
}

pub fn run_logout() -> io::Result<()> {
    let config = load_config()?;
    let identity = IdentityClient::new(config);

    match identity.sign_out() {
        Ok(()) => println!("Signed out."),
        Err(e) => eprintln!("Logout failed: {}", e),
    }
    Ok(())
}

pub async fn run_list() -> io::Result<()> {
    let config = load_config()?;
    let time_format = config.ui.time_format.clone();
    let mut scheduler = Scheduler::new(config);

    let events = match scheduler.list_events(None).await {
        Ok(events) => events,
        Err(e) => {
            eprintln!("Failed to fetch events: {}", e);
            return Ok(());
        }
    };

    let groups = group_by_day(events);
    let text = format_day_grouped(&groups, &time_format);
    display_with_pager(&text)
}

pub async fn run_agenda(date: NaiveDate) -> io::Result<()> {
    let config = load_config()?;
    let time_format = config.ui.time_format.clone();
    let mut scheduler = Scheduler::new(config);

    let mut events = match scheduler.list_events(Some(date)).await {
        Ok(events) => events,
        Err(e) => {
            eprintln!("Failed to fetch events: {}", e);
            Vec::new()
        }
    };

    events.sort_by_key(|event| event.start);
    let agenda = format_agenda_text(date, &events, &time_format);
    display_with_pager(&agenda)
}

pub async fn run_add(args: EventArgs) -> io::Result<()> {
    let (title, start, end) = match (&args.title, args.start, args.end) {
        (Some(title), Some(start), Some(end)) => (title.clone(), start, end),
        _ => {
            eprintln!("add needs --title, --start and --end");
            return Ok(());
        }
    };

    let rule = match build_rule(&args, None) {
        Ok(rule) => rule,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(());
        }
    };

    let draft = EventDraft {
        title,
        start,
        end,
        description: args.description.unwrap_or_default(),
        recurrence: recurrence::encode(rule.as_ref()),
    };

    let config = load_config()?;
    let mut scheduler = Scheduler::new(config);

    match scheduler.create_event(&draft).await {
        Ok(created) => println!("Created event {}", created.id),
        Err(e) => eprintln!("Failed to create event: {}", e),
    }
    Ok(())
}

pub async fn run_edit(id: String, args: EventArgs) -> io::Result<()> {
    let config = load_config()?;
    let mut scheduler = Scheduler::new(config);

    let event = match find_event(&mut scheduler, &id, args.on_date).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            eprintln!("Event {} not found", id);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Failed to fetch events: {}", e);
            return Ok(());
        }
    };

    let existing_rule = recurrence::decode(event.recurrence.as_deref());
    let rule = match build_rule(&args, existing_rule) {
        Ok(rule) => rule,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(());
        }
    };

    let draft = EventDraft {
        title: args.title.unwrap_or_else(|| event.title.clone()),
        start: args.start.unwrap_or(event.start),
        end: args.end.unwrap_or(event.end),
        description: args.description.unwrap_or_else(|| event.description.clone()),
        recurrence: recurrence::encode(rule.as_ref()),
    };

    match scheduler.save_event(&event, &draft).await {
        Ok(()) => println!("Updated event {}", event.id),
        Err(e) => eprintln!("Failed to update event: {}", e),
    }
    Ok(())
}

pub async fn run_delete(id: String, on_date: Option<NaiveDate>) -> io::Result<()> {
    let config = load_config()?;
    let mut scheduler = Scheduler::new(config);

    let event = match find_event(&mut scheduler, &id, on_date).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            eprintln!("Event {} not found", id);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Failed to fetch events: {}", e);
            return Ok(());
        }
    };

    match scheduler.delete_event(&event).await {
        Ok(()) => println!("Deleted event {}", event.id),
        Err(e) => eprintln!("Failed to delete event: {}", e),
    }
    Ok(())
}

/// Looks the target record up. With an occurrence date the listing is
/// date-filtered, so recurring templates come back expanded and the id
/// may match either the instance itself or its template back-reference.
async fn find_event(
    scheduler: &mut Scheduler,
    id: &str,
    on_date: Option<NaiveDate>,
) -> Result<Option<Event>, sked::SchedulerError> {
    let events = scheduler.list_events(on_date).await?;

    Ok(events.into_iter().find(|event| {
        event.id == id || (on_date.is_some() && event.original_id.as_deref() == Some(id))
    }))
}

pub fn format_day_grouped(groups: &[DayGroup], time_format: &str) -> String {
    if groups.is_empty() {
        return "No events found.".to_string();
    }

    let mut lines = Vec::new();
    for group in groups {
        lines.push(group.label());
        for event in &group.events {
            lines.push(format!(
                "  {}-{}  {}  [{}]",
                event.start.format(time_format),
                event.end.format(time_format),
                event.title,
                event.id
            ));
            if let Some(rule) = &event.recurrence {
                lines.push(format!("      {}", recurrence::describe(rule)));
            }
            if !event.description.is_empty() {
                lines.push(format!("      {}", event.description));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn format_agenda_text(date: NaiveDate, events: &[Event], time_format: &str) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Agenda – {}", date.format("%A, %B %d, %Y")));
    lines.push(String::new());

    if events.is_empty() {
        lines.push("No events scheduled.".to_string());
    } else {
        for event in events {
            lines.push(format!("- {}", build_agenda_line(event, time_format, usize::MAX)));
        }
    }

    lines.join("\n")
}

fn build_agenda_line(event: &Event, time_format: &str, width: usize) -> String {
    let time_label = format!(
        "{}-{}",
        event.start.format(time_format),
        event.end.format(time_format)
    );

    let mut line = format!("{:<13} {}", time_label, event.title);
    if let Some(rule) = &event.recurrence
        && !rule.is_empty()
    {
        line.push_str(&format!(" ({})", recurrence::describe(rule)));
    }
    truncate_to_width(&line, width)
}

fn truncate_to_width(line: &str, width: usize) -> String {
    if width > 0 && line.len() > width {
        let mut truncated = line
            .chars()
            .take(width.saturating_sub(1))
            .collect::<String>();
        truncated.push('…');
        truncated
    } else {
        line.to_string()
    }
}

fn display_with_pager(text: &str) -> Result<(), io::Error> {
    let pager_value = env::var("PAGER").unwrap_or_else(|_| "less".to_string());
    let mut parts = pager_value.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c,
        None => {
            println!("{text}");
            return Ok(());
        }
    };
    let args: Vec<&str> = parts.collect();

    match Command::new(cmd)
        .args(&args)
        .stdin(Stdio::piped())
        .spawn()
    {
        Ok(mut child) => {
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(text.as_bytes())?;
            }
            let _ = child.wait();
        }
        Err(_) => {
            println!("{text}");
        }
    }

    Ok(())
}
