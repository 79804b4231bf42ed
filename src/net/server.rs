// TCP accept loop: one reader task and one writer task per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use super::codec::{self, Frame};
use super::dispatcher::{Dispatcher, HandlerContext};
use super::handlers::Services;
use super::messages::{error_code, ErrorMessage, Message};
use super::registry::TypeRegistry;
use super::session::ConnId;
use crate::engine::server::MatchCommand;
use crate::error::DispatchError;
use crate::metrics;

/// Everything a connection task needs, shared by all connections.
pub struct SocketServer {
    pub registry: TypeRegistry,
    pub dispatcher: Dispatcher,
    pub services: Arc<Services>,
}

impl SocketServer {
    pub fn new(registry: TypeRegistry, dispatcher: Dispatcher, services: Arc<Services>) -> Self {
        Self {
            registry,
            dispatcher,
            services,
        }
    }

    /// Accepts connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                server.handle_connection(stream, addr).await;
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "Failed to set TCP_NODELAY");
        }
        let (mut reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let sessions = self.services.sessions.clone();
        let conn = sessions.register(tx);
        tracing::info!(conn_id = conn, %addr, "Connection opened");

        // Ends once the registry drops the sender.
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if writer.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        let mut buf = BytesMut::with_capacity(4096);
        'read: loop {
            match reader.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(conn_id = conn, error = %e, "Read failed");
                    break;
                }
            }
            loop {
                match codec::try_decode_frame(&mut buf) {
                    Ok(Some(frame)) => self.handle_frame(conn, frame),
                    Ok(None) => break,
                    Err(e) => {
                        metrics::PROTOCOL_ERRORS_TOTAL
                            .with_label_values(&[e.kind()])
                            .inc();
                        tracing::warn!(conn_id = conn, error = %e, "Closing connection on corrupt stream");
                        break 'read;
                    }
                }
            }
        }

        if let Some(info) = sessions.unregister(conn) {
            if let (Some(match_id), Some(slot)) = (info.match_id, info.slot) {
                self.services
                    .matches
                    .send(&match_id, MatchCommand::PlayerLeft { slot });
            }
        }
        tracing::info!(conn_id = conn, %addr, "Connection closed");
    }

    fn reply_error(&self, conn: ConnId, code: i16, message: String) {
        let msg: Message = ErrorMessage { code, message }.into();
        self.services.sessions.send_unicast(conn, &msg);
    }

    /// Decodes and dispatches one frame. Never fails the connection.
    pub fn handle_frame(&self, conn: ConnId, frame: Frame) {
        metrics::FRAMES_DECODED_TOTAL.inc();
        let msg = match self.registry.decode(&frame) {
            Ok(m) => m,
            Err(e) => {
                metrics::PROTOCOL_ERRORS_TOTAL
                    .with_label_values(&[e.kind()])
                    .inc();
                tracing::warn!(conn_id = conn, msg_type = frame.msg_type, error = %e, "Rejected frame");
                self.reply_error(conn, error_code::PROTOCOL, e.to_string());
                return;
            }
        };

        let sessions = &self.services.sessions;
        let info = sessions.session(conn).unwrap_or_default();
        let ctx = HandlerContext {
            conn: Some(conn),
            user_id: info.user_id,
            match_id: info.match_id,
            slot: info.slot,
            services: self.services.as_ref(),
        };

        match self.dispatcher.dispatch(&msg, &ctx) {
            Ok(Some(reply)) => {
                sessions.send_unicast(conn, &reply);
            }
            Ok(None) => {}
            Err(e @ DispatchError::Unregistered(_)) => {
                tracing::warn!(conn_id = conn, msg = msg.name(), error = %e, "No handler");
                self.reply_error(conn, error_code::UNREGISTERED, e.to_string());
            }
            Err(e @ DispatchError::MissingContext { .. }) => {
                tracing::warn!(conn_id = conn, msg = msg.name(), error = %e, "Message before authentication");
                self.reply_error(conn, error_code::NOT_AUTHENTICATED, e.to_string());
            }
            Err(DispatchError::Rejected(e)) => {
                tracing::warn!(
                    conn_id = conn,
                    msg = msg.name(),
                    match_id = ?ctx.match_id,
                    slot = ?ctx.slot,
                    error = %e,
                    "Dropped invalid request"
                );
            }
        }
    }
}
