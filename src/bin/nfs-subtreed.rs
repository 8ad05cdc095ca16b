//! Daemon driver: parses the command line, builds the server over a
//! `PosixBackend`, loads the exports file, and serves TCP and UDP until
//! killed. SIGHUP reloads the exports file atomically.

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nfs_subtree::backend::PosixBackend;
use nfs_subtree::exports::ExportTable;
use nfs_subtree::server::{Server, ServerConfig, CRISIS};
use nfs_subtree::tcp::{NfsEndpoint, NfsTcpListener};
use nfs_subtree::udp::NfsUdpSocket;

#[derive(Parser, Debug)]
#[command(name = "nfs-subtreed", about = "User-space NFSv3 server for a directory subtree")]
struct Args {
    /// Directory to expose as the root of the exported namespace.
    #[arg(long)]
    root: PathBuf,

    /// Exports file; paths in it are relative to the exported namespace.
    #[arg(long)]
    exports: PathBuf,

    /// Address to serve on, for both TCP and UDP.
    #[arg(long, default_value = "0.0.0.0:2049")]
    bind: String,

    /// Advertise executable regular files as readable.
    #[arg(long)]
    readable_executables: bool,

    /// Keep created objects owned by the server identity instead of the
    /// (squashed) caller.
    #[arg(long)]
    single_user: bool,
}

async fn load_exports(server: &Server, path: &PathBuf) -> anyhow::Result<()> {
    let source = tokio::fs::read_to_string(path).await?;
    let table = ExportTable::parse(&source, server.backend().as_ref()).await?;
    server.install_exports(table);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let backend = Arc::new(PosixBackend::new(&args.root));
    let config = ServerConfig {
        exports_path: Some(args.exports.clone()),
        readable_executables: args.readable_executables,
        single_user: args.single_user,
    };
    let server = Arc::new(Server::new(backend, config));

    if let Err(e) = load_exports(&server, &args.exports).await {
        error!("cannot load exports from {:?}: {e:#}", args.exports);
        exit(CRISIS);
    }

    let tcp = match NfsTcpListener::bind(&args.bind, server.clone()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("cannot bind TCP {}: {e}", args.bind);
            exit(CRISIS);
        }
    };
    let udp = match NfsUdpSocket::bind(&args.bind, server.clone()).await {
        Ok(socket) => socket,
        Err(e) => {
            error!("cannot bind UDP {}: {e}", args.bind);
            exit(CRISIS);
        }
    };

    // Exports reload on SIGHUP; the swap is atomic, in-flight requests keep
    // the generation they started with.
    {
        let server = server.clone();
        let exports_path = args.exports.clone();
        tokio::spawn(async move {
            let Ok(mut hup) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            else {
                error!("cannot install SIGHUP handler; exports reload disabled");
                return;
            };
            while hup.recv().await.is_some() {
                info!("SIGHUP: reloading exports");
                if let Err(e) = load_exports(&server, &exports_path).await {
                    error!("exports reload failed, keeping previous table: {e:#}");
                }
            }
        });
    }

    let result = tokio::try_join!(tcp.handle_forever(), udp.handle_forever());
    if let Err(e) = result {
        error!("transport failed: {e}");
        exit(CRISIS);
    }
}
