mod bootstrap;

use anyhow::Result;
use features_core::settings::Settings;
use features_data::pipeline::{run_feature_pipeline, PipelineConfig};

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("Feature engineer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Events: {}, feature set: {}, format: {:?}",
        settings.events.display(),
        settings.feature_set,
        settings.format
    );

    let taxonomy = bootstrap::load_taxonomy(settings.taxonomy.as_deref())?;
    let config = PipelineConfig::from(&settings);

    let result = match run_feature_pipeline(&config, &taxonomy) {
        Ok(result) => result,
        Err(err) => {
            let kind = if err.is_configuration() {
                "configuration"
            } else {
                "data"
            };
            tracing::error!("Aborting on {kind} error: {err}");
            return Err(err.into());
        }
    };

    tracing::info!(
        "Wrote {} feature rows to {}",
        result.features.len(),
        config.output.display()
    );
    if let Some(labels) = &result.labels {
        tracing::info!(
            "Wrote {} label rows to {}",
            labels.len(),
            config.label_output.display()
        );
    }
    tracing::debug!("Run metadata: {}", serde_json::to_string(&result.metadata)?);

    Ok(())
}
