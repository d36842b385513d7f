//! Run-loop wiring for the monitoring daemon: periodic cycles with an
//! interruptible sleep and SIGINT/SIGTERM-driven graceful shutdown. Shutdown
//! never interrupts an in-flight cycle; it waits for the cycle to finish and
//! then returns.

use anyhow::{Context, Result};
use log::{error, info};
use poolwatch_core::{
    AlertStateStore, EmailAlerter, PoolDaemon, PoolMonitor, PoolwatchConfig, SmtpMailer,
};
use poolwatch_zfs::SystemZfsClient;
use std::time::Duration;
use tokio::{select, signal, sync::watch, time::sleep};

/// Build the daemon from configuration and drive it until shutdown.
pub fn run(config: PoolwatchConfig) -> Result<()> {
    let client = SystemZfsClient::from_config(&config).context("initialise zpool client")?;
    let monitor = PoolMonitor::new(config.monitor.clone());
    let alerter = EmailAlerter::new(SmtpMailer::new(config.smtp.clone()), config.alert.clone());
    let state_store = AlertStateStore::new(
        config.state_file_path(),
        config.alert.resend_interval_hours,
    );
    let daemon = PoolDaemon::new(
        client,
        monitor,
        alerter,
        state_store,
        &config.daemon,
        &config.alert,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(run_loop(daemon, config.check_interval()))
}

async fn run_loop(
    mut daemon: PoolDaemon<SystemZfsClient, SmtpMailer>,
    interval: Duration,
) -> Result<()> {
    info!(
        "starting ZFS pool monitoring daemon (interval {}s)",
        interval.as_secs()
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_signals(shutdown_tx));

    loop {
        daemon.run_cycle();

        if *shutdown_rx.borrow() {
            break;
        }

        select! {
            _ = sleep(interval) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    info!("daemon stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM and flip the shutdown flag. Sending on the
/// watch channel is all the handler does; the run loop reacts within its
/// next poll.
async fn wait_for_signals(shutdown_tx: watch::Sender<bool>) {
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    select! {
        _ = signal::ctrl_c() => info!("received interrupt signal, initiating shutdown"),
        _ = terminate => info!("received terminate signal, initiating shutdown"),
    }

    let _ = shutdown_tx.send(true);
}
