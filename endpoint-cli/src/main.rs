//! The endpoint command line tool.
//!
//! Drives the process-wide facades over real sockets.

#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};

use clap::Parser;
use endpoint::{Backlog, TcpEndpoint};
use eyre::{OptionExt, WrapErr};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;

use self::span_trace::SpanTraceHandler;

mod span_trace;

/// The endpoint command line.
#[derive(Debug, Parser)]
#[command(version, about)]
struct EndpointCli {
    /// Subcommands to execute.
    #[command(subcommand)]
    command: Commands,
}

/// List of supported subcommands.
#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Binds the server to an address and listens until standard input is closed.
    Serve(ServeArguments),

    /// Connects the client to an address.
    Connect(ConnectArguments),
}

/// A dotted-decimal IPv4 address and port.
#[derive(Debug, clap::Args)]
struct Target {
    /// IPv4 address in `a.b.c.d` form.
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port, `0` lets the system pick one when serving.
    #[arg(long)]
    port: u16,
}

#[derive(Debug, clap::Args)]
struct ServeArguments {
    #[command(flatten)]
    target: Target,

    /// Pending connection queue length, the system maximum if unset.
    #[arg(long, env = "ENDPOINT_BACKLOG")]
    backlog: Option<u32>,
}

#[derive(Debug, clap::Args)]
struct ConnectArguments {
    #[command(flatten)]
    target: Target,
}

fn lock<T>(facade: &'static Mutex<T>) -> eyre::Result<MutexGuard<'static, T>> {
    facade
        .lock()
        .map_err(|_| eyre::eyre!("facade poisoned by an earlier panic"))
}

#[tracing::instrument(skip_all, fields(address = %arguments.target.address, port = arguments.target.port))]
fn serve(arguments: ServeArguments) -> eyre::Result<()> {
    let mut server = lock(endpoint::global::server())?;
    if let Some(backlog) = arguments.backlog {
        server.set_backlog(Backlog::new(backlog));
    }

    server
        .bind::<TcpEndpoint<_>>(&arguments.target.address, arguments.target.port)
        .wrap_err("binding server")?;

    let endpoint = server.endpoint().ok_or_eyre("server has no endpoint")?;
    let local = endpoint
        .local_address()
        .wrap_err("querying listening address")?;
    tracing::info!(configured = %endpoint.address(), %local, backlog = %server.backlog(), "listening");

    std::io::copy(&mut std::io::stdin().lock(), &mut std::io::sink())
        .wrap_err("waiting for standard input to close")?;
    tracing::info!("standard input closed, shutting down");

    Ok(())
}

#[tracing::instrument(skip_all, fields(address = %arguments.target.address, port = arguments.target.port))]
fn connect(arguments: ConnectArguments) -> eyre::Result<()> {
    let mut client = lock(endpoint::global::client())?;

    client
        .connect::<TcpEndpoint<_>>(&arguments.target.address, arguments.target.port)
        .wrap_err("connecting client")?;

    let endpoint = client.endpoint().ok_or_eyre("client has no endpoint")?;
    let local = endpoint
        .local_address()
        .wrap_err("querying local address")?;
    tracing::info!(remote = %endpoint.address(), %local, "connected");

    Ok(())
}

fn main() -> eyre::Result<()> {
    let arguments = EndpointCli::parse();

    eyre::set_hook(Box::new(SpanTraceHandler::hook))?;

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .with_env_var("ENDPOINT_LOG")
                    .from_env()?,
            )
            .with_writer(std::io::stderr)
            .compact()
            .finish()
            .with(tracing_error::ErrorLayer::default()),
    )?;

    match arguments.command {
        Commands::Serve(arguments) => serve(arguments),
        Commands::Connect(arguments) => connect(arguments),
    }
}
