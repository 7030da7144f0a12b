use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod bridge;
mod cli;
mod cloud;
mod config;
mod formatter;
mod snmp;

use crate::bridge::{CommandIntake, IntakeOptions, start_poll};
use crate::cloud::iothub::{self, IotHubOptions};
use crate::cloud::{EventSink, IotHubDriver, IotHubReceiver, IotHubSender};
use crate::config::{AppConfig, BridgeConfig, ConfigError, RUNTIME_FAILURE_EXIT_CODE};
use crate::snmp::{QueryExecutor, SnmpExecutor};

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            // переопределяется через RUST_LOG
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rumqttc=warn")),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::NONE)
                .event_format(fmt::format().compact().with_target(false)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let cli = cli::parse();

    let config = match AppConfig::load(&cli.config).and_then(|c| c.validate()) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };
    config.log_summary();

    let (sender, receiver, driver) = match iothub::connect(
        &config.iothub,
        IotHubOptions {
            token_ttl: config.settings.token_ttl,
            ..IotHubOptions::default()
        },
    ) {
        Ok(handles) => handles,
        Err(e) => exit_with(ConfigError::IotHubConnectionString(e.to_string())),
    };

    // ошибка уже залогирована через #[instrument(err)]
    if start_bridge(config, sender, receiver, driver).await.is_err() {
        std::process::exit(RUNTIME_FAILURE_EXIT_CODE);
    }
    Ok(())
}

fn exit_with(e: ConfigError) -> ! {
    error!("{}", e);
    std::process::exit(e.exit_code());
}

#[instrument(name = "bridge", skip_all, err)]
async fn start_bridge(
    config: BridgeConfig,
    sender: IotHubSender,
    receiver: IotHubReceiver,
    driver: IotHubDriver,
) -> Result<()> {
    let executor: Arc<dyn QueryExecutor> = Arc::new(
        SnmpExecutor::new(config.endpoint.socket_addr(), config.settings.timeout)
            .with_strict_methods(config.settings.strict_methods),
    );
    let sink: Arc<dyn EventSink> = Arc::new(sender);
    let cancel = CancellationToken::new();

    let driver = tokio::spawn(driver.run(cancel.clone()));

    let poll = config
        .poll
        .map(|poll| tokio::spawn(start_poll(executor.clone(), sink.clone(), poll, cancel.clone())));

    let intake = CommandIntake::new(
        executor,
        sink,
        receiver,
        IntakeOptions {
            receive_interval: config.settings.receive_interval,
            ack_empty_results: config.settings.ack_empty_results,
        },
    );
    let mut intake = tokio::spawn(intake.run(cancel.clone()));

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            signal.map_err(anyhow::Error::from)
        }
        res = &mut intake => match res {
            Ok(res) => res.map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        },
    };

    cancel.cancel();

    if !intake.is_finished() {
        if let Err(e) = intake.await {
            warn!(error = %e, "command intake did not stop cleanly");
        }
    }
    if let Some(poll) = poll {
        if let Err(e) = poll.await {
            warn!(error = %e, "scheduled poll did not stop cleanly");
        }
    }
    if let Err(e) = driver.await {
        warn!(error = %e, "IoT Hub driver did not stop cleanly");
    }

    info!("bridge stopped");
    outcome
}
