use std::collections::HashMap;

use chrono::NaiveDate;

/// How often a rule repeats. A rule cannot exist without a frequency;
/// "no recurrence" is expressed as `Option<RecurrenceRule>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_token(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            _ => None,
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Mo,
    Tu,
    We,
    Th,
    Fr,
    Sa,
    Su,
}

impl Weekday {
    pub fn as_code(&self) -> &'static str {
        match self {
            Weekday::Mo => "MO",
            Weekday::Tu => "TU",
            Weekday::We => "WE",
            Weekday::Th => "TH",
            Weekday::Fr => "FR",
            Weekday::Sa => "SA",
            Weekday::Su => "SU",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "MO" => Some(Weekday::Mo),
            "TU" => Some(Weekday::Tu),
            "WE" => Some(Weekday::We),
            "TH" => Some(Weekday::Th),
            "FR" => Some(Weekday::Fr),
            "SA" => Some(Weekday::Sa),
            "SU" => Some(Weekday::Su),
            _ => None,
        }
    }
}

/// When a recurring series stops. COUNT and UNTIL are mutually exclusive
/// by construction; the encoder can never emit both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Never,
    AfterCount(u32),
    Until(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Repeat every N units of `frequency`. Always >= 1.
    pub interval: u32,
    /// Weekday restriction; only meaningful under `Frequency::Weekly`.
    pub by_week_day: Vec<Weekday>,
    pub termination: Termination,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            by_week_day: Vec::new(),
            termination: Termination::Never,
        }
    }
}

fn split_tokens(raw: &str) -> HashMap<&str, &str> {
    // Tokens without '=' are dropped here, which is what makes the
    // decoder total over arbitrary input.
    raw.split(';')
        .filter_map(|token| token.split_once('='))
        .collect()
}

/// Extracts the calendar-date part of an UNTIL value. Anything from 'T'
/// onward is discarded; both `YYYYMMDD` and `YYYY-MM-DD` spellings occur
/// in stored rules and both are accepted.
fn parse_until_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y%m%d"))
        .ok()
}

/// Decodes an encoded rule string into a typed rule.
///
/// Lenient by contract: malformed tokens and unknown keys are skipped, an
/// unparseable INTERVAL coerces to 1, unknown BYDAY codes are dropped.
/// A missing or unrecognized FREQ means no rule is recognized at all.
/// When a stored string carries both COUNT and UNTIL, COUNT wins.
pub fn decode(raw: Option<&str>) -> Option<RecurrenceRule> {
    let raw = raw?;
    let tokens = split_tokens(raw);

    let frequency = Frequency::from_token(tokens.get("FREQ")?)?;

    let interval = tokens
        .get("INTERVAL")
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1);

    let by_week_day = tokens
        .get("BYDAY")
        .map(|value| value.split(',').filter_map(Weekday::from_code).collect())
        .unwrap_or_default();

    let count = tokens
        .get("COUNT")
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|n| *n >= 1);

    let termination = if let Some(count) = count {
        Termination::AfterCount(count)
    } else if let Some(date) = tokens.get("UNTIL").and_then(|value| parse_until_date(value)) {
        Termination::Until(date)
    } else {
        Termination::Never
    };

    Some(RecurrenceRule {
        frequency,
        interval,
        by_week_day,
        termination,
    })
}

/// Encodes a rule back into its string form; `None` in, `None` out.
///
/// FREQ and INTERVAL always come first. BYDAY is emitted only for weekly
/// rules with a non-empty weekday set, so a stray restriction on a daily
/// or monthly rule never reaches the wire. UNTIL uses end-of-day
/// `235959Z` so the last day is included.
///
/// Every string this produces decodes back to an equal rule.
pub fn encode(rule: Option<&RecurrenceRule>) -> Option<String> {
    let rule = rule?;

    let mut out = format!(
        "FREQ={};INTERVAL={}",
        rule.frequency.as_token(),
        rule.interval.max(1)
    );

    if rule.frequency == Frequency::Weekly && !rule.by_week_day.is_empty() {
        let days: Vec<&str> = rule.by_week_day.iter().map(Weekday::as_code).collect();
        out.push_str(&format!(";BYDAY={}", days.join(",")));
    }

    match rule.termination {
        Termination::Never => {}
        Termination::AfterCount(count) => out.push_str(&format!(";COUNT={}", count)),
        Termination::Until(date) => {
            out.push_str(&format!(";UNTIL={}T235959Z", date.format("%Y%m%d")));
        }
    }

    Some(out)
}

/// Renders a rule string as a display sentence, e.g.
/// `"Repeats every 2 week(s) on MO,WE until Fri Mar 15 2024"`.
///
/// Works on the raw string rather than the typed rule so it can still
/// render values the decoder rejects: an unrecognized FREQ falls back to
/// its lowercased raw form. Never panics.
pub fn describe(raw: &str) -> String {
    let tokens = split_tokens(raw);

    let interval = tokens.get("INTERVAL").copied().unwrap_or("1");
    let mut desc = format!("Repeats every {} ", interval);

    match tokens.get("FREQ").copied() {
        Some("WEEKLY") => {
            desc.push_str("week(s)");
            if let Some(days) = tokens.get("BYDAY") {
                desc.push_str(&format!(" on {}", days));
            }
        }
        Some(token) => match Frequency::from_token(token) {
            Some(freq) => desc.push_str(&format!("{}(s)", freq.unit())),
            None => desc.push_str(&token.to_lowercase()),
        },
        None => {}
    }

    if let Some(count) = tokens.get("COUNT") {
        desc.push_str(&format!(" for {} time(s)", count));
    }

    if let Some(until) = tokens.get("UNTIL")
        && let Some(date) = parse_until_date(until)
    {
        desc.push_str(&format!(" until {}", date.format("%a %b %d %Y")));
    }

    desc.trim_end().to_string()
}
