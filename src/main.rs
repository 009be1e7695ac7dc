mod app;
mod config;
mod console;
mod database;
mod error;
mod models;
mod services;

use app::App;
use console::ConsoleInteractionHost;
use error::AppError;
use photos_auth::AuthState;
use photos_picker::{Photo, SelectionSet};
use services::selection_service;
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("Fatal: {}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = config::load_config(&config::config_path())?;
    let app = App::bootstrap(config)?;
    let host = ConsoleInteractionHost;

    match std::env::args().nth(1).as_deref() {
        None => rotate(&app, &host).await,
        Some("pick") => {
            pick(&app, &host).await?;
            Ok(())
        }
        Some("status") => status(&app),
        Some("sign-out") => sign_out(&app).await,
        Some(other) => Err(AppError::Config(format!(
            "Unknown command '{}' (expected: pick, status, sign-out)",
            other
        ))),
    }
}

/// Default mode: rotate the cached selection until interrupted
async fn rotate(app: &App, host: &ConsoleInteractionHost) -> Result<(), AppError> {
    ensure_signed_in(app, host).await?;

    let photos = match app.cached_selection()? {
        Some(cached) if !cached.photos.is_empty() => {
            if selection_service::selection_is_stale(cached.selected_at) {
                log::warn!(
                    "Cached selection is older than {} days; run `wallshift pick` for fresh photos",
                    selection_service::STALENESS_THRESHOLD_DAYS
                );
            }
            cached.photos
        }
        _ => pick(app, host).await?,
    };

    if photos.is_empty() {
        log::warn!("No photos were selected; nothing to rotate");
        return Ok(());
    }

    let settings = app.settings()?;
    app.rotation()
        .start(photos, settings.rotation_interval())
        .await?;
    if settings.paused {
        app.rotation().pause().await?;
    }

    // Observe rotation transitions for the log
    let mut snapshots = app.rotation().subscribe();
    tokio::spawn(async move {
        let mut last_shown: Option<String> = None;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow().clone();
            if snapshot.active && snapshot.current_photo_id != last_shown {
                if let Some(id) = &snapshot.current_photo_id {
                    log::info!(
                        "Now showing photo {} ({} of {})",
                        id,
                        snapshot.current_index + 1,
                        snapshot.photo_count
                    );
                }
                last_shown = snapshot.current_photo_id;
            }
        }
    });

    // SIGUSR1 stands in for the OS display-topology notification: the current
    // photo is re-applied to every display without advancing the queue.
    // SIGUSR2 toggles pause/resume.
    let mut displays_changed = signal(SignalKind::user_defined1())?;
    let mut toggle_pause = signal(SignalKind::user_defined2())?;
    log::info!("Rotation running; press Ctrl-C to quit (SIGUSR1 re-applies after monitor changes, SIGUSR2 toggles pause)");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = displays_changed.recv() => {
                log::info!("Display change signal received");
                app.rotation().displays_changed().await?;
            }
            _ = toggle_pause.recv() => {
                let snapshot = app.rotation().snapshot();
                if snapshot.paused {
                    app.rotation().resume().await?;
                } else if snapshot.active {
                    app.rotation().pause().await?;
                }
            }
        }
    }

    let snapshot = app.rotation().snapshot();
    if snapshot.photo_count > 0 {
        log::info!(
            "Stopping at photo {} of {}",
            snapshot.current_index + 1,
            snapshot.photo_count
        );
    }
    if let Some(at) = snapshot.last_rotation_at {
        log::debug!("Last rotation was at {}", at.to_rfc3339());
    }
    app.rotation().stop().await?;
    Ok(())
}

/// Run the picker flow and merge the result into the cached selection
async fn pick(app: &App, host: &ConsoleInteractionHost) -> Result<Vec<Photo>, AppError> {
    ensure_signed_in(app, host).await?;

    let new_photos = app.run_selection_flow(host).await?;
    let existing = app
        .cached_selection()?
        .map(|cached| cached.photos)
        .unwrap_or_default();

    let mut selection = SelectionSet::from_photos(existing);
    let added = selection.select_all(new_photos);
    log::info!(
        "Added {} new photos ({} in rotation)",
        added,
        selection.len()
    );
    app.store_selection(selection.photos())?;

    let mut settings = app.settings()?;
    settings.selected_photo_ids = selection.photos().iter().map(|p| p.id.clone()).collect();
    app.save_settings(&settings)?;

    Ok(selection.into_photos())
}

fn status(app: &App) -> Result<(), AppError> {
    println!("Auth state:  {:?}", app.auth_state());

    match app.cached_selection()? {
        Some(cached) => {
            let stale = if selection_service::selection_is_stale(cached.selected_at) {
                " (stale)"
            } else {
                ""
            };
            println!(
                "Selection:   {} photos, picked {}{}",
                cached.photos.len(),
                cached.selected_at.format("%Y-%m-%d %H:%M UTC"),
                stale
            );
        }
        None => println!("Selection:   empty"),
    }

    println!("Image cache: {} bytes", app.image_cache_size_bytes());

    let settings = app.settings()?;
    println!(
        "Interval:    {}s{}",
        settings.rotation_interval_secs,
        if settings.paused { " (paused)" } else { "" }
    );
    Ok(())
}

/// Drop remote trust (best effort) and every local trace of the account
async fn sign_out(app: &App) -> Result<(), AppError> {
    app.sign_out().await?;
    app.clear_selection()?;
    app.clear_image_cache()?;
    log::info!("Signed out; local selection and image cache cleared");
    Ok(())
}

async fn ensure_signed_in(app: &App, host: &ConsoleInteractionHost) -> Result<(), AppError> {
    if app.auth_state() != AuthState::SignedIn {
        app.sign_in(host).await?;
    }
    Ok(())
}
