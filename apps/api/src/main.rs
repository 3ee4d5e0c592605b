use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{
    AppointmentStore, BookingService, InMemoryAppointmentStore, SupabaseAppointmentStore,
};
use availability_cell::{
    AvailabilityService, AvailabilityStore, BookedSlotSource, ConflictMatch,
    InMemoryAvailabilityStore, SupabaseAvailabilityStore, SystemClock,
};
use shared_config::AppConfig;

struct Stores {
    availability: Arc<dyn AvailabilityStore>,
    appointments: Arc<dyn AppointmentStore>,
    booked_slots: Arc<dyn BookedSlotSource>,
}

fn build_stores(config: &AppConfig) -> Stores {
    if config.is_configured() {
        info!("Using Supabase storage at {}", config.supabase_url);
        let appointments = Arc::new(SupabaseAppointmentStore::new(config));
        Stores {
            availability: Arc::new(SupabaseAvailabilityStore::new(config)),
            appointments: appointments.clone(),
            booked_slots: appointments,
        }
    } else {
        info!("Using in-memory storage");
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        Stores {
            availability: Arc::new(InMemoryAvailabilityStore::new()),
            appointments: appointments.clone(),
            booked_slots: appointments,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    let stores = build_stores(&config);

    let availability = Arc::new(
        AvailabilityService::new(stores.availability, stores.booked_slots, Arc::new(SystemClock))
            .with_conflict_match(ConflictMatch::from_config(config.slot_conflict_match_end_time)),
    );
    let booking = Arc::new(BookingService::new(stores.appointments, availability.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), availability, booking)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
