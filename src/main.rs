use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

use vaxcenter::{
    backend::HttpBackend,
    config::Config,
    permissions::{allowed_actions, status_label},
    session::{JsonFileStore, KeyValueStore, SessionProvider, StoredSession},
    stores::{AppointmentStore, ScheduleStore, StoreContext, schedule::calculate_age},
};

const USAGE: &str = "usage: vaxcenter <appointments | cancel <id> <reason...> | cart | age <YYYY-MM-DD>>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        anyhow::bail!(USAGE);
    };

    // needs neither backend nor session
    if command == "age" {
        let raw = args.get(1).context(USAGE)?;
        let dob = NaiveDate::parse_from_str(raw, "%Y-%m-%d").context("date must be YYYY-MM-DD")?;
        println!("{}", calculate_age(dob, chrono::Local::now().date_naive()));
        return Ok(());
    }

    let cfg = Config::from_env()?;
    let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&cfg.session_file));
    let session = Arc::new(StoredSession::new(storage.clone()));
    let backend = Arc::new(HttpBackend::new(&cfg.api_base_url, cfg.request_timeout_secs)?);
    let ctx = StoreContext::new(backend, session.clone(), cfg.request_timeout());

    tracing::info!("Using backend at {}", cfg.api_base_url);

    match command.as_str() {
        "appointments" => {
            let Some(current) = session.current() else {
                anyhow::bail!("not logged in: no session in {}", cfg.session_file);
            };
            let store = AppointmentStore::new(ctx);
            store.fetch_all(&current.user_id).await;
            if let Some(e) = store.last_error().await {
                anyhow::bail!("could not load appointments: {e}");
            }
            for a in store.appointments().await {
                let actions: Vec<String> = allowed_actions(&a.status).iter().map(|x| format!("{x:?}")).collect();
                println!(
                    "{}  {} {}  {:<16} {}  [{}]",
                    a.appointment_id,
                    a.appointment_date,
                    a.time_start,
                    status_label(&a.status),
                    a.children_name.as_deref().unwrap_or("-"),
                    actions.join(", ")
                );
            }
        }
        "cancel" => {
            let id = args.get(1).context(USAGE)?;
            let reason = args[2..].join(" ");
            let Some(current) = session.current() else {
                anyhow::bail!("not logged in: no session in {}", cfg.session_file);
            };
            let store = AppointmentStore::new(ctx);
            store.fetch_all(&current.user_id).await;
            store.cancel(id, &reason).await?;
            store.settle().await;
            println!("cancelled {id}");
        }
        "cart" => {
            let store = ScheduleStore::new(ctx, storage);
            for item in store.cart().await {
                println!("{}  {:<24} {:>12.0}", item.vaccine_details_id, item.dose_name, item.price);
            }
            println!("total {:.0}", store.cart_total().await);
        }
        _ => anyhow::bail!(USAGE),
    }

    Ok(())
}
