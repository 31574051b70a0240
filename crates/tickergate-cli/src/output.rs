use serde_json::Value;
use tickergate_core::Envelope;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(envelope)?,
    }

    Ok(())
}

fn render_table(envelope: &Envelope<Value>) -> Result<(), CliError> {
    let meta = &envelope.meta;
    let source = meta
        .source
        .map(|provider| provider.to_string())
        .unwrap_or_else(|| String::from("-"));
    let chain = meta
        .source_chain
        .iter()
        .map(|provider| provider.to_string())
        .collect::<Vec<_>>()
        .join(" -> ");

    println!("request   {}", meta.request_id);
    println!("source    {source}");
    println!(
        "chain     {}",
        if chain.is_empty() { "-" } else { &chain }
    );
    println!("cache     {}", if meta.cache_hit { "hit" } else { "miss" });
    println!("latency   {}ms", meta.latency_ms);

    for error in &envelope.errors {
        let source = error
            .source
            .map(|provider| provider.to_string())
            .unwrap_or_else(|| String::from("-"));
        println!("error     [{source}] {}: {}", error.code, error.message);
    }

    if let Some(data) = &envelope.data {
        println!("{}", serde_json::to_string_pretty(data)?);
    }

    Ok(())
}
