//! Destroy command - Remove everything a request provisioned.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::{BackendArgs, RequestArgs};

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    #[command(flatten)]
    pub backend: BackendArgs,
}

pub async fn execute(args: DestroyArgs) -> Result<()> {
    // The handle only depends on registry name and environment, so a
    // request that no longer validates can still be torn down.
    let request = args.request.load()?;
    let handle = request.handle();

    let session = args.backend.session().await?;
    info!("Destroying {}", handle);
    session
        .destroy(&handle)
        .await
        .with_context(|| format!("Destroy of {} failed", handle))?;

    println!("✅ Destroyed {}", handle);
    Ok(())
}
