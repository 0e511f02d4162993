use emotion_overlay::camera::{NokhwaCamera, NokhwaOpener};
use emotion_overlay::config::AppConfig;
use emotion_overlay::error::{OverlayError, Result};
use emotion_overlay::poller::Poller;
use emotion_overlay::transport::HttpTransport;
use emotion_overlay::ui::EmotionOverlayApp;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the logging system (file only, no console output)
fn init_logging(path: &Path) -> Result<()> {
    let log_file = std::fs::File::create(path).map_err(OverlayError::Io)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    tracing_subscriber::registry().with(file_layer).init();

    Ok(())
}

fn main() -> Result<()> {
    let (config, config_problem) = AppConfig::resolve();
    init_logging(&config.log_file)?;

    if let Some(e) = config_problem {
        error!("{}; falling back to defaults", e);
    }
    info!("Endpoint: {}", config.endpoint_url);

    match NokhwaCamera::list_devices() {
        Ok(devices) => info!("Cameras: {:?}", devices),
        Err(e) => warn!("Could not enumerate cameras: {}", e),
    }

    // Requests run on this runtime so the UI thread never blocks on the network
    let runtime = tokio::runtime::Runtime::new()?;

    let poller = Poller::new(
        Box::new(NokhwaOpener::new(config.camera)),
        Arc::new(HttpTransport::new(config.request_timeout())),
        runtime.handle().clone(),
    );
    let endpoint = config.endpoint_url.clone();

    let result = eframe::run_native(
        "Emotion Detection",
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([900.0, 860.0])
                .with_title("Emotion Detection"),
            ..Default::default()
        },
        Box::new(move |_cc| Ok(Box::new(EmotionOverlayApp::new(poller, endpoint)))),
    );

    if let Err(e) = result {
        error!("Application error: {}", e);
    }

    Ok(())
}
