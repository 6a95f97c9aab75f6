use log::{info, warn};
use tidal_transfer::{AccountConfig, Error, TidalClient, TransferConfig, transfer_playlists_from};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TransferConfig::from_env()?;

    let client_id = config.client_id.as_deref();
    if client_id.is_none() {
        warn!("TIDAL_CLIENT_ID is not set, expired access tokens cannot be refreshed");
    }

    let source = connect(client_id, &config.source, "source").await?;
    let target = connect(client_id, &config.target, "target").await?;

    let report = transfer_playlists_from(&source, &target, config.skip).await?;

    info!(
        "Transferred {} playlists ({} tracks)",
        report.playlists, report.tracks
    );

    Ok(())
}

async fn connect(
    client_id: Option<&str>,
    account: &AccountConfig,
    label: &'static str,
) -> Result<TidalClient, Error> {
    let client = TidalClient::from_account(client_id, account).with_authz_refresh_callback(
        move |authz| {
            // Refreshed tokens only live for this run
            info!(
                "Refreshed {} access token for user {:?}",
                label, authz.user_id
            );
        },
    );

    let session = client.authenticate().await?;
    info!("Signed in to {} account as user {}", label, session.user_id);

    Ok(client)
}
