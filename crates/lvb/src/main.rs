use std::sync::Arc;

use lvb_api::{ApiSettings, HttpValidationApi};

use lvb_core::{
    config::Config,
    settings::{ChatSettings, SettingsStore},
    validation::LinkValidator,
};

#[tokio::main]
async fn main() -> Result<(), lvb_core::Error> {
    lvb_core::logging::init("lvb")?;

    let cfg = Arc::new(Config::load()?);

    let api = HttpValidationApi::new(ApiSettings::from(cfg.as_ref()))?;
    let validator = LinkValidator::new(Arc::new(api), cfg.bulk_batch_size);

    let settings = Arc::new(SettingsStore::open(
        cfg.settings_file.clone(),
        ChatSettings {
            show_invalid: cfg.default_show_invalid,
        },
    ));

    lvb_telegram::router::run_polling(cfg, validator, settings)
        .await
        .map_err(|e| lvb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
