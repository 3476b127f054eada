use log::{debug, error, info, warn};
use reqwest::Client as ReqwestClient;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use slideshow_media::config::{self, AppConfig};
use slideshow_media::errors::AppError;
use slideshow_media::input::{command_for_key, command_for_swipe, NavCommand, WheelDebouncer};
use slideshow_media::presenter::Presenter;
use slideshow_media::probe::{is_remote_base, AssetProbe, FsProbe, HttpProbe};
use slideshow_media::stage::HeadlessStage;
use slideshow_media::store::UserOverrideStore;

type App = Presenter<Box<dyn AssetProbe>, HeadlessStage>;

/// One line of operator input.
#[derive(Debug, PartialEq)]
enum Command {
    Nav(NavCommand),
    Key(String),
    Swipe(f32, f32),
    Wheel(f32),
    Add(u32, PathBuf),
    Remove(u32),
    Info,
    Verify,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let mut args = rest.split_whitespace();
    let mut arg = |what: &str| args.next().ok_or_else(|| format!("{} needs {}", name, what));

    let command = match name {
        "" => return Err("empty command".to_string()),
        "next" => Command::Nav(NavCommand::Next),
        "prev" => Command::Nav(NavCommand::Previous),
        "home" => Command::Nav(NavCommand::First),
        "end" => Command::Nav(NavCommand::Last),
        "goto" => Command::Nav(NavCommand::GoTo(parse_arg(arg("a slide number")?)?)),
        "key" => Command::Key(arg("a key name")?.to_string()),
        "swipe" => {
            let start = parse_arg(arg("a start x")?)?;
            let end = parse_arg(arg("an end x")?)?;
            Command::Swipe(start, end)
        }
        "wheel" => Command::Wheel(parse_arg(arg("a delta")?)?),
        "add" => {
            // The path is the rest of the line and may contain spaces.
            let (index, path) = rest
                .trim()
                .split_once(char::is_whitespace)
                .ok_or_else(|| "add needs a slide number and a file path".to_string())?;
            Command::Add(parse_arg(index)?, PathBuf::from(path.trim()))
        }
        "remove" => Command::Remove(parse_arg(arg("a slide number")?)?),
        "info" => Command::Info,
        "verify" => Command::Verify,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(command)
}

fn parse_arg<T: std::str::FromStr>(raw: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("invalid argument '{}'", raw))
}

fn build_probe(config: &AppConfig) -> Box<dyn AssetProbe> {
    if is_remote_base(&config.media_base_path) {
        info!("Probing remote media at {}", config.media_base_path);
        Box::new(HttpProbe::new(ReqwestClient::new()))
    } else {
        info!("Probing local media under {}", config.media_base_path);
        Box::new(FsProbe)
    }
}

fn navigate(app: &mut App, command: NavCommand) {
    match app.navigate(command) {
        Ok(_) => debug!("Accepted {:?}", command),
        Err(reason) => debug!("Ignored {:?}: {}", command, reason),
    }
}

fn print_info(app: &App) {
    let view = app.view();
    println!("slide {}/{} ({:.0}%)", view.current, view.total, view.progress_percent);
    for media in app.media_info() {
        let shown = if app.slide_state(media.slide).attached { "shown" } else { "hidden" };
        println!(
            "  {:>3} {:<5} {:<6} {:?} {}",
            media.slide,
            media.kind.as_str(),
            shown,
            media.source,
            media.url
        );
    }
    for user in app.user_media_info() {
        println!(
            "  user media on slide {}: {} ({}, {})",
            user.slide, user.file_name, user.kind, user.timestamp
        );
    }
}

/// Handles one command. Returns `false` when the loop should stop.
fn handle_line(app: &mut App, wheel: &mut WheelDebouncer, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(e) => {
            warn!("{}", e);
            return true;
        }
    };
    match command {
        Command::Nav(nav) => navigate(app, nav),
        Command::Key(key) => match command_for_key(&key) {
            Some(nav) => navigate(app, nav),
            None => debug!("Key '{}' is not bound", key),
        },
        Command::Swipe(start, end) => {
            if let Some(nav) = command_for_swipe(start, end) {
                navigate(app, nav);
            }
        }
        Command::Wheel(delta) => wheel.push(delta, Instant::now()),
        Command::Add(index, path) => match app.add_user_media(index, &path) {
            Ok(media) => {
                println!("slide {} now shows {} {}", media.slide, media.kind, path.display())
            }
            Err(e) => error!("Could not add {:?}: {}", path, e),
        },
        Command::Remove(index) => match app.remove_user_media(index) {
            Ok(true) => println!("slide {} restored to its default visual", index),
            Ok(false) => println!("slide {} had no media", index),
            Err(e) => error!("Could not remove media from slide {}: {}", index, e),
        },
        Command::Info => print_info(app),
        Command::Verify => {
            let report = app.verify();
            println!(
                "{}/{} slides with media, {} failed",
                report.attached,
                report.total,
                report.failed.len()
            );
        }
        Command::Quit => return false,
    }
    true
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    env_logger::init();
    info!("Starting slideshow_media...");

    let app_config = match std::env::args().nth(1) {
        Some(path) => config::load_config(&path)?,
        None => {
            info!("No config file given, using defaults");
            AppConfig::default()
        }
    };

    let probe = build_probe(&app_config);
    let stage = HeadlessStage::new(app_config.slide_count);
    let store = UserOverrideStore::open(app_config.store_path.clone());
    let mut app: App = Presenter::new(app_config, probe, stage, store);

    let startup = app.start().await;
    match &startup.attached {
        Some(report) => info!("Ready: {}/{} slides with media", report.attached, report.total),
        None => warn!("Ready without attached media"),
    }
    print_info(&app);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut wheel = WheelDebouncer::new();
    loop {
        let transition_due = app.transition_deadline();
        let wheel_due = wheel.deadline();
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&mut app, &mut wheel, &line) {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = sleep_until_opt(transition_due) => {
                if let Some(change) = app.complete_transition() {
                    println!("slide {} -> {}", change.old, change.new);
                }
            }
            _ = sleep_until_opt(wheel_due) => {
                if let Some(nav) = wheel.poll(Instant::now()) {
                    navigate(&mut app, nav);
                }
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
