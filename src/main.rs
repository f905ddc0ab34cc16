use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use helmet_check::config::Settings;
use helmet_check::server::{routes, AppState};
use helmet_check::session;
use helmet_check::util::init_tracing;
use helmet_check::vision::OpenAiClient;
use helmet_check::workflow::Classifier;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, process};
use tracing::info;

const USAGE: &str = "usage: ./helmet-check [config file]";

fn get_args() -> Option<PathBuf> {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => None,
        2 => Some(PathBuf::from(&args[1])),
        _ => {
            println!("{USAGE}");
            process::exit(1);
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_file = get_args();

    // Fails before binding if the credential is missing
    let settings = Settings::load(config_file.as_deref()).context("could not load settings")?;
    info!("loaded settings: {settings:?}");

    let model = OpenAiClient::new(&settings.model)?;
    let classifier = Classifier::new(Arc::new(model), settings.preset);
    let state = web::Data::new(AppState::new(classifier, settings.upload.max_bytes));
    session::spawn_sweeper(
        state.sessions.clone(),
        settings.session.ttl(),
        settings.session.sweep_interval(),
    );

    let (host, port) = settings.bind_addr();
    info!("serving {:?} front end on http://{host}:{port}", settings.preset);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}
