//! Application orchestrator: wires watcher, monitors and tray together.

use std::sync::Arc;
use std::time::Duration;

use idevtray_lockdown::{DeviceWatcher, IdeviceinfoConfig, IdeviceinfoGateway};
use idevtray_monitor::{MonitorConfig, MonitorRegistry};
use idevtray_tray::{
    IndicatorStatus, MenuItem, MenuState, PresentationSink, TrayConfig, TrayEvent, TrayHandle,
    run_update_loop,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the applet until Quit or Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // -- Tray --
    let (tray_handle, tray_event_tx, update_rx) = TrayHandle::new(tray_config(&config));
    let app_name = tray_handle.config().app_name.clone();
    tracing::info!(
        app = %app_name,
        icon = %tray_handle.config().icon_name,
        "tray configured"
    );

    let tray_thread = std::thread::Builder::new()
        .name("tray".into())
        .spawn(move || {
            // Held for the lifetime of the menu; a GUI backend sends Quit here.
            let _event_tx = tray_event_tx;
            let mut state = MenuState::new(app_name);
            let mut indicator = state.indicator;
            run_update_loop(update_rx, &mut state, |state| {
                if state.indicator != indicator {
                    indicator = state.indicator;
                    tracing::info!(?indicator, "tray indicator changed");
                }
                tracing::debug!(menu = %menu_summary(&state.build_menu()), "tray menu updated");
            });
        })?;

    let sink = Arc::new(tray_handle.sink());
    sink.set_indicator(IndicatorStatus::Passive);

    // -- Monitors --
    let gateway = Arc::new(IdeviceinfoGateway::new(IdeviceinfoConfig {
        program: config.ideviceinfo_path.clone(),
        timeout: config.query_timeout(),
    }));
    let registry = MonitorRegistry::new(
        gateway,
        sink,
        MonitorConfig {
            refresh_interval: config.refresh_interval(),
        },
    );

    // -- Device watcher --
    let cancel = CancellationToken::new();
    let (events_tx, mut events_rx) = mpsc::channel(16);
    let watcher = DeviceWatcher::new(config.idevice_id_path.clone(), config.watch_interval())
        .spawn(events_tx, cancel.clone());

    tracing::info!("idevtray ready");

    // -- Main loop: dispatch hotplug events until shutdown --
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut quit_check = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => registry.handle_event(event),
                None => {
                    tracing::warn!("device watcher stopped, shutting down");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            _ = quit_check.tick() => {
                if let Some(TrayEvent::QuitRequested) = tray_handle.try_recv_event() {
                    tracing::info!("quit requested via tray");
                    break;
                }
            }
        }
    }

    // -- Graceful shutdown --
    tracing::info!("stopping services...");
    cancel.cancel();
    if let Err(e) = watcher.await {
        tracing::error!(error = %e, "device watcher task failed");
    }
    registry.shutdown().await;
    tray_handle.shutdown();
    if tray_thread.join().is_err() {
        anyhow::bail!("tray thread panicked");
    }

    Ok(())
}

/// Tray settings taken from the applet configuration.
fn tray_config(config: &Config) -> TrayConfig {
    TrayConfig {
        icon_name: config.icon_name.clone(),
        ..TrayConfig::default()
    }
}

/// One-line rendering of the menu for the log.
fn menu_summary(items: &[MenuItem]) -> String {
    items
        .iter()
        .map(|item| {
            if item.label.is_empty() {
                "---"
            } else {
                item.label.trim()
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
