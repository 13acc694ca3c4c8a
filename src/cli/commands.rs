use crate::cli::args::{Args, ClientArgs, Command, ConfigArgs, ConfigCommand, OutputFormat, ServerArgs};
use crate::cli::input::StdinInput;
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::agent::{AgentExit, DuplexAgent};
use crate::domain::config::ChatConfig;
use crate::domain::error::{ChatError, ChatResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::tcp::{connect_with_retry, ChatServer, RetryPolicy, TcpConnector};
use tracing::{info, warn};

/// Execute CLI command
pub async fn execute_command(args: Args) -> ChatResult<()> {
    let writer = ConsoleWriter::new(OutputFormat::Text);

    // Load configuration using ConfigManager
    let config_manager = ConfigManager::new();
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };

    // Initialize logging
    if !args.quiet {
        setup_logging(&config, args.verbose)?;
    }

    match args.command {
        Command::Server(server_args) => run_server(server_args, &config, &writer).await,
        Command::Client(client_args) => run_client(client_args, &config, &writer).await,
        Command::Config(config_args) => {
            execute_config_command(config_args, &config, &config_manager, &writer)
        }
    }
}

async fn run_server(args: ServerArgs, config: &ChatConfig, writer: &ConsoleWriter) -> ChatResult<()> {
    let mut server_config = config.server.clone();
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let server = ChatServer::bind(&server_config).await?;
    writer.write_message(&format!(
        "[SERVER] Online. Listening on port: {}",
        server.local_addr().port()
    ))?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install ctrl-c handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn run_client(args: ClientArgs, config: &ChatConfig, writer: &ConsoleWriter) -> ChatResult<()> {
    let host = args.host.unwrap_or_else(|| config.client.host.clone());
    let port = args.port.unwrap_or(config.client.port);
    let policy = RetryPolicy::from(&config.client);

    let stream = match connect_with_retry(&TcpConnector, &host, port, &policy, |_, _| {
        if let Err(e) = writer.write_message("[ERROR] Connection unsuccessful. Retrying...") {
            warn!("Failed to report retry: {}", e);
        }
    })
    .await
    {
        Ok(stream) => stream,
        Err(e) => {
            writer.write_error("[ERROR] Failed to Connect.")?;
            return Err(e);
        }
    };

    writer.write_message("[ALERT] Connected.")?;
    writer.write_message("Enter a username to start the chat.")?;

    let mut input = StdinInput::new();
    let username = input.read_username().await?;

    let agent = DuplexAgent::from_stream(stream, username);
    match agent.run(&mut input, writer.clone()).await? {
        AgentExit::ConnectionClosed => writer.write_message("[ALERT] Disconnected from server.")?,
        AgentExit::SendFailed(reason) => {
            writer.write_error(&format!("[ERROR] Lost connection: {}", reason))?
        }
        AgentExit::Quit | AgentExit::InputClosed => {}
    }

    Ok(())
}

fn execute_config_command(
    args: ConfigArgs,
    config: &ChatConfig,
    config_manager: &ConfigManager,
    writer: &ConsoleWriter,
) -> ChatResult<()> {
    match args.command {
        ConfigCommand::Show { format } => {
            ConsoleWriter::new(format).write_config(config)?;
        }
        ConfigCommand::Init => {
            let current_dir = std::env::current_dir().map_err(|e| ChatError::Config {
                message: format!("Failed to get current directory: {}", e),
            })?;
            let created = config_manager.init_project_config(&current_dir)?;
            writer.write_message(&format!("Created {}", created.display()))?;
        }
        ConfigCommand::Path => {
            let global = config_manager
                .get_global_config_path_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no home directory)".to_string());
            let project = config_manager
                .get_project_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none found)".to_string());
            writer.write_message(&format!("global:  {}", global))?;
            writer.write_message(&format!("project: {}", project))?;
        }
    }
    Ok(())
}

fn setup_logging(config: &ChatConfig, verbose: bool) -> ChatResult<()> {
    let level = if verbose { "debug" } else { config.global.log_level.as_str() };
    init_logging(level).map_err(|e| ChatError::Config {
        message: format!("Failed to initialize logging: {}", e),
    })
}
