use crate::config::AppConfig;
use crate::services::storage::{S3StorageService, StorageService};
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

/// Builds the S3/MinIO client, or `None` when object storage is disabled;
/// the file-serving endpoints then degrade to service-unavailable.
pub async fn setup_storage(config: &AppConfig) -> Option<Arc<dyn StorageService>> {
    if !config.s3.enabled {
        info!("Object storage disabled; file endpoints will answer 503");
        return None;
    }

    let bucket = config.s3.bucket.clone();
    info!(
        "S3 Storage: {} (Bucket: {})",
        config.s3.endpoint.as_deref().unwrap_or("aws"),
        bucket
    );

    let mut loader = aws_config::from_env().region(Region::new(config.s3.region.clone()));
    if let Some(ref endpoint) = config.s3.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if !config.s3.access_key_id.is_empty() {
        loader = loader.credentials_provider(Credentials::new(
            config.s3.access_key_id.clone(),
            config.s3.secret_access_key.clone(),
            None,
            None,
            "static",
        ));
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure bucket exists
    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("Bucket '{}' created successfully", bucket);
            }
        }
    }

    Some(Arc::new(S3StorageService::new(s3_client, bucket)))
}
