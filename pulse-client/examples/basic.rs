//! Minimal end-to-end usage of the batching pipeline.
//!
//! Run with a collection endpoint listening locally:
//! `cargo run --example basic`

use pulse_client::{Analytics, BatchConfig, BatchConsumer};
use pulse_types::{Properties, PropertyValue};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("pulse_client=debug")
        .init();

    let mut config = BatchConfig::new("http://localhost:8080/collect");
    config.batch_size = 10;
    config.auto_flush = true;
    let analytics = Analytics::new(BatchConsumer::with_config(config)?);

    let mut props = Properties::new();
    props.insert("page".into(), "/pricing".into());
    props.insert("visit_count".into(), PropertyValue::from(3i64));
    analytics.track("user-42", "page_view", props).await?;

    let mut profile = Properties::new();
    profile.insert("$name".into(), "Ada".into());
    analytics.user_set("user-42", profile).await?;

    analytics.close().await?;
    Ok(())
}
