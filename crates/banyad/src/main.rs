//! banyad - the shared shower-cabin booking service
//!
//! This is the main entry point for the banyad service. It wires together:
//! - Configuration loading
//! - Store initialization
//! - The booking engine and dialogue registry
//! - The IPC server

use anyhow::{Context, Result};
use banya_api::{
    Command, DialogAction, DialogReply, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus,
    Request, Response, ResponsePayload, API_VERSION,
};
use banya_config::{load_config, FacilityConfig};
use banya_core::{BookingEngine, CoreEvent, DialogRegistry, DialogState};
use banya_ipc::{IpcServer, ServerMessage};
use banya_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use banya_util::{default_config_path, BanyaError, ClientId, RateLimiter, Slot, UserId};
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// banyad - booking service for shared shower cabins
#[derive(Parser, Debug)]
#[command(name = "banyad")]
#[command(about = "Booking service for shared shower cabins", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/banyad/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path override (or set BANYA_SOCKET env var)
    #[arg(short, long, env = "BANYA_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set BANYA_DATA_DIR env var)
    #[arg(short, long, env = "BANYA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logger(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Resolve configuration: an explicit path must load, the default path is
/// used when present, and built-in defaults apply otherwise.
fn load_facility(args: &Args) -> Result<FacilityConfig> {
    match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => {
            let path = default_config_path();
            if path.exists() {
                load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))
            } else {
                Ok(FacilityConfig::default())
            }
        }
    }
}

/// Main service state
struct Service {
    engine: Arc<BookingEngine>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    dialogs: Arc<Mutex<DialogRegistry>>,
    rate_limiter: Arc<Mutex<RateLimiter<ClientId>>>,
    sweep_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let facility = load_facility(args)?;

        info!(
            cabins = facility.cabins.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| facility.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| facility.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("banyad.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let dialogs = DialogRegistry::new(facility.dialog_ttl);
        let sweep_interval = facility.sweep_interval;
        let engine = BookingEngine::new(facility, store.clone());

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        // Rate limiter: 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            engine: Arc::new(engine),
            ipc: Arc::new(ipc),
            store,
            dialogs: Arc::new(Mutex::new(dialogs)),
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
            sweep_interval,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .expect("Message receiver should be available");

        let engine = self.engine.clone();
        let dialogs = self.dialogs.clone();
        let rate_limiter = self.rate_limiter.clone();
        let store = self.store.clone();

        // Spawn IPC accept task
        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                warn!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        // Maintenance tick: day rollover, slot expiry, idle dialogues
        let mut tick_timer = tokio::time::interval(self.sweep_interval);

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                _ = tick_timer.tick() => {
                    let now = banya_util::now();

                    match engine.maintain(now) {
                        Ok(events) => {
                            for event in events {
                                Self::broadcast_core_event(&ipc_ref, event);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Maintenance sweep failed");
                        }
                    }

                    dialogs.lock().await.sweep(now);
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(
                        &engine,
                        &dialogs,
                        &rate_limiter,
                        &ipc_ref,
                        &store,
                        msg,
                    )
                    .await;
                }
            }
        }

        info!("Shutting down banyad");

        ipc_ref.broadcast_event(Event::new(EventPayload::ServiceShuttingDown));

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    fn broadcast_core_event(ipc: &Arc<IpcServer>, event: CoreEvent) {
        match event {
            CoreEvent::DayReset { day } => {
                ipc.broadcast_event(Event::new(EventPayload::DayReset { day }));
            }
            CoreEvent::BookingsExpired { count } => {
                ipc.broadcast_event(Event::new(EventPayload::BookingsExpired { count }));
            }
        }
    }

    async fn handle_ipc_message(
        engine: &Arc<BookingEngine>,
        dialogs: &Arc<Mutex<DialogRegistry>>,
        rate_limiter: &Arc<Mutex<RateLimiter<ClientId>>>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::ClientConnected { client_id } => {
                debug!(client_id = %client_id, "Client connected");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                rate_limiter.lock().await.remove(&client_id);
                debug!(client_id = %client_id, "Client disconnected");
            }

            ServerMessage::Request { client_id, request } => {
                if !rate_limiter.lock().await.check(&client_id) {
                    let response = Response::error(
                        request.request_id,
                        ErrorInfo::new(ErrorCode::RateLimited, "too many requests"),
                    );
                    let _ = ipc.send_response(&client_id, response).await;
                    return;
                }

                let response =
                    Self::dispatch(engine, dialogs, ipc, store, &client_id, request).await;
                if let Err(e) = ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }
        }
    }

    async fn dispatch(
        engine: &Arc<BookingEngine>,
        dialogs: &Arc<Mutex<DialogRegistry>>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        client_id: &ClientId,
        request: Request,
    ) -> Response {
        let request_id = request.request_id;

        if request.api_version != API_VERSION {
            return Response::error(
                request_id,
                ErrorInfo::new(
                    ErrorCode::InvalidRequest,
                    format!("unsupported api version {}", request.api_version),
                ),
            );
        }

        let now = banya_util::now();

        // A menu command interrupting a booking dialogue aborts it.
        if !matches!(request.command, Command::Dialog { .. }) {
            if let Some(user_id) = request.command.actor() {
                dialogs.lock().await.abort(user_id);
            }
        }

        let result = match request.command {
            Command::RegisterUser {
                user_id,
                display_name,
                gender,
            } => engine
                .register_user(&user_id, &display_name, gender)
                .map(|_| ResponsePayload::Registered),

            Command::CheckAvailability { slot, gender } => engine
                .check_availability(slot, gender, now)
                .map(|cabins| ResponsePayload::Availability { cabins }),

            Command::CreateBooking {
                user_id,
                slot,
                cabins,
            } => engine
                .create_booking(&user_id, slot, cabins as usize, now)
                .map(|assigned| {
                    ipc.broadcast_event(Event::new(EventPayload::BookingCreated {
                        user_id: user_id.clone(),
                        slot,
                        cabins: assigned.clone(),
                    }));
                    ResponsePayload::Booked { cabins: assigned }
                }),

            Command::CancelBooking {
                user_id,
                booking_id,
            } => engine.cancel_booking(&user_id, booking_id).map(|removed| {
                ipc.broadcast_event(Event::new(EventPayload::BookingCancelled {
                    booking_id,
                    slot: removed.slot,
                    cabin: removed.cabin,
                }));
                ResponsePayload::Cancelled
            }),

            Command::ListUserBookings { user_id } => engine
                .list_bookings_for_user(&user_id, now)
                .map(ResponsePayload::UserBookings),

            Command::ListSchedule => engine
                .list_all_bookings(now)
                .map(ResponsePayload::Schedule),

            Command::Dialog { user_id, action } => {
                Self::handle_dialog(engine, dialogs, ipc, &user_id, action, now)
                    .await
                    .map(ResponsePayload::Dialog)
            }

            Command::GetHealth => Ok(ResponsePayload::Health(HealthStatus {
                store_healthy: store.is_healthy(),
                active_dialogs: dialogs.lock().await.len(),
            })),

            Command::SubscribeEvents => Ok(ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            }),

            Command::UnsubscribeEvents => Ok(ResponsePayload::Unsubscribed),

            Command::Ping => Ok(ResponsePayload::Pong),
        };

        match result {
            Ok(payload) => Response::success(request_id, payload),
            Err(e) => Response::error(request_id, error_info(&e)),
        }
    }

    /// Drive one step of the booking dialogue.
    ///
    /// Transitions requiring engine decisions (slot availability, the final
    /// commit) consult it here; the registry holds only the conversational
    /// position. The commit re-checks availability inside the engine, so a
    /// dialogue that went stale mid-flight fails cleanly instead of
    /// overrunning a cabin.
    async fn handle_dialog(
        engine: &Arc<BookingEngine>,
        dialogs: &Arc<Mutex<DialogRegistry>>,
        ipc: &Arc<IpcServer>,
        user_id: &UserId,
        action: DialogAction,
        now: DateTime<Local>,
    ) -> banya_util::Result<DialogReply> {
        let mut dialogs = dialogs.lock().await;

        match action {
            DialogAction::Start => {
                dialogs.begin(user_id, now);
                Ok(DialogReply::SlotNeeded)
            }

            DialogAction::ChooseSlot { slot } => {
                if !matches!(dialogs.state(user_id), Some(DialogState::AwaitingSlot)) {
                    return Ok(DialogReply::NotInDialog);
                }

                if slot < Slot::of(&now) {
                    return Ok(DialogReply::SlotUnavailable { slot });
                }

                let available = engine.check_availability_for_user(user_id, slot, now)?;
                if dialogs.offer_slot(user_id, slot, available, now) {
                    Ok(DialogReply::CabinCountNeeded { slot, available })
                } else {
                    Ok(DialogReply::SlotUnavailable { slot })
                }
            }

            DialogAction::ConfirmCabins { count } => {
                let Some(slot) = dialogs.take_for_commit(user_id) else {
                    return Ok(DialogReply::NotInDialog);
                };

                let cabins = engine.create_booking(user_id, slot, count as usize, now)?;
                ipc.broadcast_event(Event::new(EventPayload::BookingCreated {
                    user_id: user_id.clone(),
                    slot,
                    cabins: cabins.clone(),
                }));
                Ok(DialogReply::Booked { cabins })
            }

            DialogAction::Abort => {
                if dialogs.abort(user_id) {
                    Ok(DialogReply::Aborted)
                } else {
                    Ok(DialogReply::NotInDialog)
                }
            }
        }
    }
}

/// Translate engine errors to wire errors. Storage and internal failures
/// are reported generically; details stay in the logs.
fn error_info(err: &BanyaError) -> ErrorInfo {
    match err {
        BanyaError::Validation(_) => ErrorInfo::new(ErrorCode::Validation, err.to_string()),
        BanyaError::GenderNotSet => ErrorInfo::new(ErrorCode::GenderNotSet, err.to_string()),
        BanyaError::InsufficientCapacity { available } => {
            ErrorInfo::new(ErrorCode::InsufficientCapacity, err.to_string())
                .with_available(*available)
        }
        BanyaError::NotFound => ErrorInfo::new(ErrorCode::NotFound, err.to_string()),
        BanyaError::NotOwner => ErrorInfo::new(ErrorCode::NotOwner, err.to_string()),
        BanyaError::StorageUnavailable(e) => {
            warn!(error = %e, "Storage failure surfaced to client");
            ErrorInfo::new(
                ErrorCode::StorageUnavailable,
                "temporary storage failure, safe to retry",
            )
        }
        BanyaError::ConfigError(_) | BanyaError::Internal(_) => {
            ErrorInfo::new(ErrorCode::InternalError, "internal error")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level)?;

    let service = Service::new(&args).await?;
    service.run().await
}
