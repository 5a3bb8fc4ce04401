use streampipe_group::{ShutdownCause, ShutdownSwitch};

/// Resolves with the name of the first termination signal received: SIGINT, SIGTERM or SIGHUP.
pub async fn termination_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        async fn recv(kind: SignalKind, name: &'static str) -> &'static str {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(err) => {
                    log::warn!("Failed to listen for {name}: {err}");
                    std::future::pending::<()>().await;
                }
            }
            name
        }

        tokio::select! {
            name = recv(SignalKind::interrupt(), "SIGINT") => name,
            name = recv(SignalKind::terminate(), "SIGTERM") => name,
            name = recv(SignalKind::hangup(), "SIGHUP") => name,
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}

/// Trip the shutdown switch on the first termination signal.
pub fn watch_signals(switch: ShutdownSwitch) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let name = termination_signal().await;
        log::info!("Received {name}");
        switch.trigger(ShutdownCause::Signal);
    })
}
