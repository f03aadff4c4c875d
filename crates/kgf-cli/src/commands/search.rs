//! Search command.

use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;
use crate::output;

#[derive(Args)]
pub struct SearchArgs {
    /// Keyword; empty lists everything up to the page size
    #[arg(default_value = "")]
    pub keyword: String,
}

pub async fn execute(args: SearchArgs, config: &AppConfig, json: bool) -> Result<()> {
    let gateway = super::open_gateway(config).await?;
    let cancel = super::interrupt_token();

    let response = gateway.search(&args.keyword, &cancel).await?;

    if json {
        output::print_json(&response)
    } else {
        output::print_search(&response);
        Ok(())
    }
}
