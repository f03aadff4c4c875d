//! Detail command.

use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;
use crate::output;

#[derive(Args)]
pub struct DetailArgs {
    /// Entity id or display name
    pub identity: String,
}

pub async fn execute(args: DetailArgs, config: &AppConfig, json: bool) -> Result<()> {
    let gateway = super::open_gateway(config).await?;
    let cancel = super::interrupt_token();

    let detail = gateway.get_detail(&args.identity, &cancel).await?;

    if json {
        output::print_json(&detail)
    } else {
        output::print_detail(&detail);
        Ok(())
    }
}
