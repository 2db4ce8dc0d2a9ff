use std::sync::Arc;

use anyhow::Result;
use chrono::Local;

use dayplan::config::Config;
use dayplan::engine::{EngineSettings, PlannerEngine};
use dayplan::gateway::google::GoogleCalendarGateway;
use dayplan::notify::LogNotifier;
use dayplan::query;
use dayplan::session::SessionContext;
use dayplan::store::LocalStore;
use dayplan::watcher::SyncWatcher;
use dayplan::{logger, Task};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logger::init(config.logging.enabled)?;

    // An access token is expected in the environment; interactive sign-in
    // belongs to the surrounding application.
    let session = SessionContext::new();
    session.set_online(true);
    match std::env::var("DAYPLAN_ACCESS_TOKEN") {
        Ok(token) if !token.is_empty() => session.set_token(token),
        _ => {
            eprintln!("Warning: DAYPLAN_ACCESS_TOKEN not set, running offline.");
            eprintln!("Changes will be queued and synced once a token is available.");
        }
    }

    let store = LocalStore::open_default()?;
    let gateway = Arc::new(GoogleCalendarGateway::new(
        config.sync.calendar_id.clone(),
        session.clone(),
    ));
    let engine = Arc::new(PlannerEngine::new(
        store,
        gateway,
        session.clone(),
        Arc::new(LogNotifier),
        EngineSettings {
            time_zone: config.sync.time_zone.clone(),
            lookback_days: config.sync.lookback_days,
            max_replay_attempts: config.sync.max_replay_attempts,
        },
    ));
    engine.load().await?;

    // One-shot sync; a failing network never takes the agenda down with it.
    if session.can_reach_remote() {
        if let Err(err) = engine.replay_queue().await {
            log::warn!("queue replay failed: {}", err);
        }
        if let Err(err) = engine.fetch_all().await {
            log::warn!("calendar refresh failed, showing the last known agenda: {}", err);
        }
    }

    // Picks up session transitions from here on
    tokio::spawn(SyncWatcher::new(engine.clone(), session.clone()).run());

    let now = Local::now().naive_local();
    let tasks = engine.tasks().await;
    let today = query::tasks_for_date(&tasks, now.date(), config.user.day_start_hour);

    if !config.user.name.is_empty() {
        println!("Good day, {}!", config.user.name);
    }
    println!("Agenda for {}:", now.date());
    if today.is_empty() {
        println!("  (nothing scheduled)");
    }
    for task in &today {
        println!("  {}", format_line(task));
    }
    if let Some(next) = query::next_incomplete_task(&tasks, now, None) {
        println!("Up next: {}", next.title);
    }

    Ok(())
}

fn format_line(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    match task.scheduling.time() {
        Some(time) => format!("[{}] {} {}", mark, time.format("%H:%M"), task.title),
        None => format!("[{}] all-day {}", mark, task.title),
    }
}
