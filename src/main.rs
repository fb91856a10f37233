mod config;
mod demo;
mod dispatch;
mod gifts;
mod notice;
mod phone;
mod preferences;
mod push;
mod session;
mod state;
mod traits;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::dispatch::{BirthdayRun, Dispatcher, FunctionClient};
use crate::gifts::GiftIdeaService;
use crate::notice::{NoticeLevel, NoticeSink};
use crate::preferences::PreferencesService;
use crate::session::IdentitySession;
use crate::state::SqliteStateStore;
use crate::traits::{NewGiftIdea, NewPerson, PeopleStore, PreferencesPatch, Principal, Priority};

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str());

    match command {
        Some("--version") | Some("-V") => {
            println!("kindred {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") | Some("-h") | Some("help") | None => {
            print_help();
            return Ok(());
        }
        // Pure helpers that need no configuration.
        Some("wa-link") => {
            let phone = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: kindred wa-link <phone> [message]"))?;
            match phone::wa_link(phone, args.get(3).map(|s| s.as_str())) {
                Some(link) => println!("{}", link),
                None => {
                    eprintln!("Not a valid phone number: {}", phone);
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        Some("demo") => {
            let mut session = demo::DemoSession::new();
            session.enter();
            for r in session.relationships() {
                println!(
                    "{}  {} ({}){}",
                    r.id,
                    r.name,
                    r.relationship,
                    r.birthday
                        .as_ref()
                        .map(|b| format!(", birthday {}", b))
                        .unwrap_or_default()
                );
            }
            return Ok(());
        }
        Some("notify-test") => {
            let payload = push::test_notification();
            println!("{}", payload.title);
            println!("{}", payload.body);
            return Ok(());
        }
        Some(
            "prefs" | "gifts" | "people" | "send-birthdays" | "send-date-ideas" | "send-nudge"
            | "setup-cron" | "login",
        ) => {}
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(2);
        }
    }

    let config_path = PathBuf::from("config.toml");
    let config = AppConfig::load(&config_path)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config, &args[1..]))
}

fn print_help() {
    println!("kindred {}", env!("CARGO_PKG_VERSION"));
    println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
    println!("Usage: kindred [COMMAND]\n");
    println!("Commands:");
    println!("  prefs show                         Show notification preferences");
    println!("  prefs set <field> <value>          Update one preference field");
    println!("  gifts list                         List gift ideas, newest first");
    println!("  gifts add <title> [--priority p] [--category c] [--price p] [--for person-id]");
    println!("  gifts remove <id>                  Delete a gift idea");
    println!("  people list                        List people and upcoming dates");
    println!("  people add <name> [--relationship r] [--email e] [--birthday MM-DD]");
    println!("  people remove <id>                 Delete a person");
    println!("  send-birthdays [--force|--test [email]|--debug]");
    println!("                                     Trigger the birthday reminder function");
    println!("  send-date-ideas                    Trigger the date ideas function");
    println!("  send-nudge [--partner name] [--city city]");
    println!("                                     Send a nudge to the owner");
    println!("  setup-cron                         Install the reminder cron job");
    println!("  login                              Print the OAuth sign-in URL");
    println!("  demo                               Show the demo-mode sample data");
    println!("  wa-link <phone> [message]          Build a WhatsApp link for a phone number");
    println!("  notify-test                        Show the test notification payload");
    println!("\nOptions:");
    println!("  -h, --help       Print help");
    println!("  -V, --version    Print version");
}

async fn run(config: AppConfig, args: &[String]) -> anyhow::Result<()> {
    let (notices, mut notice_rx) = NoticeSink::channel(32);
    // Surface notices the way the dashboard would toast them.
    let drain = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            match notice.level {
                NoticeLevel::Error => warn!("{}: {}", notice.title, notice.message),
                _ => info!("{}: {}", notice.title, notice.message),
            }
        }
    });

    let result = run_command(&config, args, notices).await;

    // All sinks are gone once the command returns, so the drain task ends.
    let _ = drain.await;
    result
}

async fn run_command(config: &AppConfig, args: &[String], notices: NoticeSink) -> anyhow::Result<()> {
    let command = args[0].as_str();

    match command {
        "login" => {
            let session = IdentitySession::new(config.auth.clone());
            println!("{}", session.sign_in_url()?);
            return Ok(());
        }
        "send-birthdays" => {
            let run = parse_birthday_flags(&args[1..])?;
            let dispatcher = dispatcher(config)?;
            let outcome = dispatcher.send_birthday_reminders(run).await?;
            println!(
                "Birthday reminders: {} sent, {} errored",
                outcome.sent, outcome.errored
            );
            if let Some(message) = outcome.message {
                println!("{}", message);
            }
            return Ok(());
        }
        "send-date-ideas" => {
            let dispatcher = dispatcher(config)?;
            let result = dispatcher.send_date_ideas().await?;
            println!("Date ideas triggered: {}", result);
            return Ok(());
        }
        "send-nudge" => {
            let (partner, city) = parse_nudge_flags(&args[1..])?;
            let principal = owner_principal(config);
            let owner = config.owner.as_ref();
            let dispatcher = dispatcher(config)?;
            let result = dispatcher
                .send_nudge(
                    principal.as_ref(),
                    partner
                        .as_deref()
                        .or_else(|| owner.and_then(|o| o.partner_name.as_deref())),
                    city.as_deref()
                        .or_else(|| owner.and_then(|o| o.city.as_deref())),
                )
                .await?;
            println!("Nudge sent: {}", result);
            return Ok(());
        }
        "setup-cron" => {
            let dispatcher = dispatcher(config)?;
            let report = dispatcher.setup_cron_job().await?;
            println!("Cron setup: {}", report.cron_result);
            println!("Birthday smoke test: {}", report.birthday_function_response);
            println!("Date ideas smoke test: {}", report.date_ideas_function_response);
            return Ok(());
        }
        _ => {}
    }

    // Store commands need an acting principal.
    let Some(principal) = owner_principal(config) else {
        anyhow::bail!("this command needs an [owner] section in config.toml");
    };

    let store = Arc::new(SqliteStateStore::new(&config.state.db_path).await?);

    match (command, args.get(1).map(|s| s.as_str())) {
        ("prefs", Some("show")) => {
            let service = PreferencesService::new(store, &principal.id, notices);
            let prefs = service.fetch().await?;
            println!("email_reminders       {}", prefs.email_reminders);
            println!("push_notifications    {}", prefs.push_notifications);
            println!("birthday_reminders    {}", prefs.birthday_reminders);
            println!("anniversary_reminders {}", prefs.anniversary_reminders);
            println!("nudge_reminders       {}", prefs.nudge_reminders);
            println!("date_ideas            {}", prefs.date_ideas);
            println!("reminder_time         {}", prefs.reminder_time);
        }
        ("prefs", Some("set")) => {
            let (field, value) = match (args.get(2), args.get(3)) {
                (Some(f), Some(v)) => (f.as_str(), v.as_str()),
                _ => anyhow::bail!("usage: kindred prefs set <field> <value>"),
            };
            let patch = parse_prefs_patch(field, value)?;
            let service = PreferencesService::new(store, &principal.id, notices);
            if service.update(patch).await? {
                println!("Updated {}", field);
            } else {
                std::process::exit(1);
            }
        }
        ("gifts", Some("list")) => {
            let service = GiftIdeaService::new(store, &principal.id, notices);
            let ideas = service.refresh().await?;
            if ideas.is_empty() {
                println!("No gift ideas yet.");
            }
            for idea in ideas {
                println!(
                    "{}  [{}] {}{}",
                    idea.id,
                    idea.priority.as_str(),
                    idea.title,
                    idea.category
                        .map(|c| format!(" ({})", c))
                        .unwrap_or_default()
                );
            }
        }
        ("gifts", Some("add")) => {
            let new = parse_gift_flags(&args[2..])?;
            let service = GiftIdeaService::new(store, &principal.id, notices);
            match service.add(new).await? {
                Some(idea) => println!("Added {}", idea.id),
                None => std::process::exit(1),
            }
        }
        ("gifts", Some("remove")) => {
            let id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: kindred gifts remove <id>"))?;
            let service = GiftIdeaService::new(store, &principal.id, notices);
            service.remove(id).await?;
            println!("Removed {}", id);
        }
        ("people", Some("list")) => {
            let people = store.list_people(&principal.id).await?;
            if people.is_empty() {
                println!("Nobody here yet.");
            }
            for person in &people {
                println!(
                    "{}  {} ({}){}",
                    person.id,
                    person.name,
                    person.relationship,
                    person
                        .birthday
                        .as_ref()
                        .map(|b| format!(", birthday {}", b))
                        .unwrap_or_default()
                );
            }
            let upcoming = store.people_with_upcoming_dates(&principal.id, 30).await?;
            for (person, date) in upcoming {
                println!("Coming up: {} in {} day(s)", person.name, date.in_days);
            }
        }
        ("people", Some("add")) => {
            let new = parse_person_flags(&args[2..])?;
            let person = store.insert_person(&principal.id, &new).await?;
            println!("Added {}", person.id);
        }
        ("people", Some("remove")) => {
            let id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: kindred people remove <id>"))?;
            store.delete_person(&principal.id, id).await?;
            println!("Removed {}", id);
        }
        (cmd, sub) => {
            anyhow::bail!("unknown subcommand: {} {}", cmd, sub.unwrap_or(""));
        }
    }

    Ok(())
}

fn dispatcher(config: &AppConfig) -> anyhow::Result<Dispatcher> {
    Ok(Dispatcher::new(FunctionClient::new(&config.functions)?))
}

fn owner_principal(config: &AppConfig) -> Option<Principal> {
    config.owner.as_ref().map(|owner| Principal {
        id: owner.id.clone(),
        email: owner.email.clone(),
        display_name: owner.name.clone(),
    })
}

fn parse_birthday_flags(args: &[String]) -> anyhow::Result<BirthdayRun> {
    match args.first().map(|s| s.as_str()) {
        None => Ok(BirthdayRun::Manual { force: false }),
        Some("--force") => Ok(BirthdayRun::Manual { force: true }),
        Some("--debug") => Ok(BirthdayRun::Debug),
        Some("--test") => Ok(BirthdayRun::Test {
            email: args.get(1).cloned(),
        }),
        Some(other) => anyhow::bail!("unknown flag: {}", other),
    }
}

fn parse_nudge_flags(args: &[String]) -> anyhow::Result<(Option<String>, Option<String>)> {
    let mut partner = None;
    let mut city = None;
    let mut it = args.iter();
    while let Some(flag) = it.next() {
        match flag.as_str() {
            "--partner" => {
                partner = Some(
                    it.next()
                        .ok_or_else(|| anyhow::anyhow!("--partner needs a value"))?
                        .clone(),
                )
            }
            "--city" => {
                city = Some(
                    it.next()
                        .ok_or_else(|| anyhow::anyhow!("--city needs a value"))?
                        .clone(),
                )
            }
            other => anyhow::bail!("unknown flag: {}", other),
        }
    }
    Ok((partner, city))
}

fn parse_prefs_patch(field: &str, value: &str) -> anyhow::Result<PreferencesPatch> {
    let mut patch = PreferencesPatch::default();
    if field == "reminder_time" {
        patch.reminder_time = Some(value.to_string());
        return Ok(patch);
    }

    let flag = match value.to_lowercase().as_str() {
        "true" | "on" | "yes" => true,
        "false" | "off" | "no" => false,
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    };
    match field {
        "email_reminders" => patch.email_reminders = Some(flag),
        "push_notifications" => patch.push_notifications = Some(flag),
        "birthday_reminders" => patch.birthday_reminders = Some(flag),
        "anniversary_reminders" => patch.anniversary_reminders = Some(flag),
        "nudge_reminders" => patch.nudge_reminders = Some(flag),
        "date_ideas" => patch.date_ideas = Some(flag),
        other => anyhow::bail!("unknown preference field: {}", other),
    }
    Ok(patch)
}

fn parse_gift_flags(args: &[String]) -> anyhow::Result<NewGiftIdea> {
    let mut it = args.iter();
    let title = it
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: kindred gifts add <title> [flags]"))?
        .clone();

    let mut idea = NewGiftIdea {
        title,
        ..Default::default()
    };
    while let Some(flag) = it.next() {
        let value = it
            .next()
            .ok_or_else(|| anyhow::anyhow!("{} needs a value", flag))?;
        match flag.as_str() {
            "--priority" => {
                idea.priority = Priority::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("priority must be low, medium, or high"))?;
            }
            "--category" => idea.category = Some(value.clone()),
            "--price" => idea.price = Some(value.clone()),
            "--description" => idea.description = Some(value.clone()),
            "--for" => idea.relationship_id = Some(value.clone()),
            other => anyhow::bail!("unknown flag: {}", other),
        }
    }
    Ok(idea)
}

fn parse_person_flags(args: &[String]) -> anyhow::Result<NewPerson> {
    let mut it = args.iter();
    let name = it
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: kindred people add <name> [flags]"))?
        .clone();

    let mut person = NewPerson {
        name,
        relationship: "friend".to_string(),
        ..Default::default()
    };
    while let Some(flag) = it.next() {
        let value = it
            .next()
            .ok_or_else(|| anyhow::anyhow!("{} needs a value", flag))?;
        match flag.as_str() {
            "--relationship" => person.relationship = value.clone(),
            "--email" => person.email = Some(value.clone()),
            "--birthday" => person.birthday = Some(value.clone()),
            "--anniversary" => person.anniversary = Some(value.clone()),
            "--notes" => person.notes = Some(value.clone()),
            "--tag" => person.tags.push(value.clone()),
            other => anyhow::bail!("unknown flag: {}", other),
        }
    }
    Ok(person)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn birthday_flags_map_to_run_modes() {
        assert_eq!(
            parse_birthday_flags(&[]).unwrap(),
            BirthdayRun::Manual { force: false }
        );
        assert_eq!(
            parse_birthday_flags(&["--force".to_string()]).unwrap(),
            BirthdayRun::Manual { force: true }
        );
        assert_eq!(parse_birthday_flags(&["--debug".to_string()]).unwrap(), BirthdayRun::Debug);
        assert_eq!(
            parse_birthday_flags(&["--test".to_string(), "me@example.com".to_string()]).unwrap(),
            BirthdayRun::Test {
                email: Some("me@example.com".to_string())
            }
        );
        assert!(parse_birthday_flags(&["--nope".to_string()]).is_err());
    }

    #[test]
    fn prefs_patch_parses_booleans_and_time() {
        let patch = parse_prefs_patch("birthday_reminders", "off").unwrap();
        assert_eq!(patch.birthday_reminders, Some(false));

        let patch = parse_prefs_patch("reminder_time", "21:30").unwrap();
        assert_eq!(patch.reminder_time.as_deref(), Some("21:30"));

        assert!(parse_prefs_patch("birthday_reminders", "maybe").is_err());
        assert!(parse_prefs_patch("volume", "on").is_err());
    }

    #[test]
    fn gift_flags_build_a_new_idea() {
        let idea = parse_gift_flags(&[
            "Pottery class".to_string(),
            "--priority".to_string(),
            "high".to_string(),
            "--category".to_string(),
            "experience".to_string(),
        ])
        .unwrap();
        assert_eq!(idea.title, "Pottery class");
        assert_eq!(idea.priority, Priority::High);
        assert_eq!(idea.category.as_deref(), Some("experience"));

        assert!(parse_gift_flags(&[]).is_err());
        assert!(parse_gift_flags(&["x".to_string(), "--priority".to_string(), "urgent".to_string()]).is_err());
    }

    #[test]
    fn person_flags_build_a_new_person() {
        let person = parse_person_flags(&[
            "Emma".to_string(),
            "--relationship".to_string(),
            "partner".to_string(),
            "--birthday".to_string(),
            "06-14".to_string(),
            "--tag".to_string(),
            "outdoors".to_string(),
        ])
        .unwrap();
        assert_eq!(person.name, "Emma");
        assert_eq!(person.relationship, "partner");
        assert_eq!(person.birthday.as_deref(), Some("06-14"));
        assert_eq!(person.tags, vec!["outdoors"]);
    }
}
