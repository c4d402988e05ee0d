//! Classify server binary.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use classify_server::{
    config::Args,
    endpoints::router,
    frame_loop::LoopSettings,
    session::{DeviceLoader, Session},
};
use env_logger::TimestampPrecision;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    log::info!(
        "Serving classifier for model in {}",
        args.model_dir.display()
    );

    // Nothing is loaded until the start control on the page is pressed
    let settings = LoopSettings::from(&args);
    let session = Arc::new(Session::new(Arc::new(DeviceLoader::new(args.clone())), settings));

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Open http://{addr}/ and press Start");
    axum::Server::bind(&addr)
        .serve(router(session).into_make_service())
        .await?;

    Ok(())
}
