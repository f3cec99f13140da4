use anyhow::{anyhow, Result};
use crabwalk::{AuthorityResolver, Config, PropagationCheck, Shared};
use is_terminal::IsTerminal;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut args = std::env::args();
    let program_name = args.next().unwrap_or("crabwalk".to_string());
    let (config_file, domain, expected_txt) = (args.next(), args.next(), args.next());

    let (config, domain) = match (config_file, domain) {
        (Some(config_file), Some(domain)) => (config_init(&config_file)?, domain),
        _ => {
            return Err(anyhow!(
                "usage: {program_name} /path/to/config.json <domain> [expected-txt]"
            ))
        }
    };

    let resolver = AuthorityResolver::new(&config).await?;
    let authority = resolver.get_authority(&domain, true).await;

    if std::io::stdout().is_terminal() {
        for link in authority.chain() {
            let servers: Vec<String> = link.nameservers.iter().map(ToString::to_string).collect();
            println!("{}: {}", link.domain, servers.join(", "));
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&authority.summary())?);
    }

    if let Some(expected_txt) = expected_txt {
        let check = PropagationCheck::new(resolver, &config);
        if !check.wait_for_txt(&domain, &expected_txt).await? {
            return Err(anyhow!("\"{expected_txt}\" is not visible at {authority}"));
        }
        tracing::info!("\"{expected_txt}\" is visible at {authority}");
    }
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crabwalk=info".into()),
        )
        .init();
}

fn config_init(config_file: &str) -> Result<Shared> {
    let config = Config::try_from_file(config_file)?;
    tracing::debug!("loaded config from {config_file}");
    Ok(Arc::new(config))
}
