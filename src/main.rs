use agora::{
    AgoraConfig, AppState, CheckpointProvider, LLMClient, OrchestratorSettings,
    ResearchOrchestrator, RunTokens, ThrottledClient,
    api::routes,
    cli::{Cli, Commands, decision_from_flags, output::Output},
    research::{ResearchRun, SentinelPhraseClassifier},
    tools::lookups_from_config,
    types::RunPhase,
};
use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = AgoraConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    init_tracing(&config.server.log_level, cli.verbose, cli.log_json);

    let result = dispatch(cli.command, config, &output).await;
    if let Err(e) = &result {
        output.error(&format!("{:#}", e));
    }
    result
}

fn init_tracing(log_level: &str, verbose: bool, json: bool) {
    let default_directive = if verbose {
        "agora=debug,tower_http=debug".to_string()
    } else {
        format!("agora={},tower_http=info", log_level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn build_orchestrator(
    config: &AgoraConfig,
    settings: OrchestratorSettings,
) -> anyhow::Result<ResearchOrchestrator> {
    let provider = config.provider()?;
    tracing::info!(provider = provider.name(), model = provider.model(), "Using LLM provider");

    let llm: Arc<dyn LLMClient> = Arc::new(ThrottledClient::new(
        provider.create_client()?,
        config.throttle(),
    ));
    let lookups = lookups_from_config(&config.search);
    let store = CheckpointProvider::from_url(&config.database.url)
        .create_store()
        .await
        .context("Failed to open checkpoint store")?;
    let classifier = SentinelPhraseClassifier::new(config.research.close_out_phrases.clone());

    Ok(ResearchOrchestrator::new(llm, lookups, store, settings).with_classifier(Arc::new(classifier)))
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            child.cancel();
        }
    });
    token
}

async fn dispatch(command: Commands, config: AgoraConfig, output: &Output) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            topic,
            analysts,
            turns,
            yes,
        } => {
            let mut settings = OrchestratorSettings::from_config(&config);
            if yes {
                settings.require_approval = false;
            }
            let orchestrator = build_orchestrator(&config, settings).await?;

            output.info(&format!("Researching \"{}\"", topic.trim()));
            let run = orchestrator
                .start_run(
                    &topic,
                    analysts.unwrap_or(config.research.analyst_count),
                    turns.unwrap_or(config.research.turn_budget),
                    cancel_on_ctrl_c(),
                )
                .await?;
            print_run(output, &run);
        }

        Commands::Decide {
            run_id,
            approve,
            reject,
            feedback,
        } => {
            let decision = decision_from_flags(approve, reject, feedback.as_deref())?;
            let orchestrator =
                build_orchestrator(&config, OrchestratorSettings::from_config(&config)).await?;

            let run = orchestrator
                .submit_decision(&run_id, decision, cancel_on_ctrl_c())
                .await?;
            print_run(output, &run);
        }

        Commands::Status { run_id } => {
            let orchestrator =
                build_orchestrator(&config, OrchestratorSettings::from_config(&config)).await?;
            match run_id {
                Some(run_id) => output.snapshot(&orchestrator.get_status(&run_id).await?),
                None => {
                    output.header("Runs");
                    output.runs(&orchestrator.list_runs().await?);
                }
            }
        }

        Commands::Report { run_id, json } => {
            let orchestrator =
                build_orchestrator(&config, OrchestratorSettings::from_config(&config)).await?;
            let report = orchestrator.get_report(&run_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output.report(&report);
            }
        }

        Commands::Serve { host, port } => {
            let orchestrator =
                build_orchestrator(&config, OrchestratorSettings::from_config(&config)).await?;
            let addr = format!(
                "{}:{}",
                host.unwrap_or_else(|| config.server.host.clone()),
                port.unwrap_or(config.server.port)
            );

            let state = AppState {
                config: Arc::new(config),
                orchestrator: Arc::new(orchestrator),
                tokens: Arc::new(RunTokens::new()),
            };
            let app = routes::app(state);

            output.banner();
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            tracing::info!(addr = %addr, "Listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    tokio::signal::ctrl_c().await.ok();
                    tracing::info!("Shutting down");
                })
                .await?;
        }
    }

    Ok(())
}

fn print_run(output: &Output, run: &ResearchRun) {
    match run.phase() {
        RunPhase::AwaitingApproval => {
            output.panel(&run.panel);
            output.newline();
            output.success(&format!("Run {} is waiting for approval", run.id));
            output.command(&format!("agora decide {} --approve", run.id));
            output.command(&format!("agora decide {} --reject --feedback \"...\"", run.id));
        }
        RunPhase::Finalized => {
            if let Some(report) = &run.report {
                output.report(report);
            }
            output.success(&format!("Run {} finalized", run.id));
        }
        phase => output.info(&format!("Run {} is {}", run.id, phase)),
    }
}
