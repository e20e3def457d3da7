use std::future::Future;
use std::io;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection;
use crate::engine::{Command, CommandSender};

/// A running WebSocket listener. Dropping the handle leaves it running;
/// call [`ListenerHandle::shutdown`] to stop it.
pub(crate) struct ListenerHandle {
    pub addr: SocketAddr,
    pub generation: u64,
    token: CancellationToken,
}

impl ListenerHandle {
    pub fn shutdown(self) {
        self.token.cancel();
    }
}

/// Source of inbound TCP connections for [`accept_loop`].
pub(crate) trait Acceptor: Send + 'static {
    fn next_connection(
        &mut self,
    ) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn next_connection(
        &mut self,
    ) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        self.accept()
    }
}

/// Bind `addr` and serve WebSocket upgrades at `/`.
pub(crate) async fn bind(
    addr: SocketAddr,
    generation: u64,
    commands: CommandSender,
) -> io::Result<ListenerHandle> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let token = CancellationToken::new();
    tokio::spawn(accept_loop(listener, generation, commands, token.clone()));

    Ok(ListenerHandle {
        addr: local_addr,
        generation,
        token,
    })
}

/// Accept connections until cancelled or the acceptor fails.
///
/// A failure that is not tied to a single peer ends the loop and is reported
/// to the engine as [`Command::ListenerExited`] tagged with `generation`.
/// Cancellation ends it silently.
pub(crate) async fn accept_loop<A: Acceptor>(
    mut acceptor: A,
    generation: u64,
    commands: CommandSender,
    token: CancellationToken,
) {
    let router = Router::new()
        .route("/", get(ws_upgrade))
        .with_state(commands.clone());

    let error = loop {
        let accepted = tokio::select! {
            _ = token.cancelled() => {
                debug!("Sync listener generation {} shut down", generation);
                return;
            }
            accepted = acceptor.next_connection() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => serve_connection(stream, peer, router.clone(), token.clone()),
            Err(e) if is_connection_error(&e) => debug!("Connection dropped during accept: {}", e),
            Err(e) => break e,
        }
    };

    let _ = commands.send(Command::ListenerExited {
        generation,
        error: error.to_string(),
    });
}

fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Router, token: CancellationToken) {
    tokio::spawn(async move {
        let builder = Builder::new(TokioExecutor::new());
        let connection =
            builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(router));

        tokio::select! {
            result = connection => {
                if let Err(e) = result {
                    debug!("Connection from {} ended: {}", peer, e);
                }
            }
            _ = token.cancelled() => {}
        }
    });
}

/// Errors that only concern the peer being accepted, not the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

async fn ws_upgrade(
    State(commands): State<CommandSender>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, commands))
}
