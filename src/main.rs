use anyhow::Result;
use tracing::{info, warn};
use weather_pipeline::{config, pipeline, telemetry};

use config::Config;
use pipeline::{Pipeline, PipelineOutcome};
use telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;
    info!(city = %cfg.pipeline.city, days = cfg.pipeline.days, "starting weather pipeline");

    let pipeline = Pipeline::from_config(cfg).await?;

    match pipeline.run_default().await? {
        PipelineOutcome::NoData => {
            warn!("no weather data stored; nothing to analyse");
        }
        PipelineOutcome::InsufficientData { rows, required } => {
            warn!(
                rows,
                required, "Not enough data for ML forecasting. Please collect more weather data."
            );
        }
        PipelineOutcome::Completed {
            stored,
            rows,
            dashboard_path,
            training,
            model_verified,
        } => {
            info!(stored, rows, dashboard = %dashboard_path.display(), "pipeline finished");
            match training {
                Some(report) => info!(
                    r2 = %format!("{:.3}", report.metrics.r2),
                    rmse = %format!("{:.3}", report.metrics.rmse),
                    mae = %format!("{:.3}", report.metrics.mae),
                    model = %report.model_path.display(),
                    model_verified,
                    "Final model performance"
                ),
                None => warn!("Model training failed. Please check the errors above."),
            }
        }
    }

    Ok(())
}
