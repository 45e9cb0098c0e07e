mod backend;
mod persist;
mod session;

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use chat_core::llm::ModelClient as _;
use providers::{config::Config, Provider, ProviderKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::backend::{Backend, InteractionRecord};
use crate::session::ChatSession;

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let base = directories::BaseDirs::new()?;
    let dir = base.data_dir().join("minichat").join("logs");
    let appender = tracing_appender::rolling::daily(dir, "minichat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn pick_provider(
    providers: Vec<Provider>,
    requested: Option<&str>,
    saved: Option<&str>,
) -> Result<Provider> {
    if let Some(name) = requested {
        let Some(kind) = ProviderKind::parse(name) else {
            bail!("unknown provider '{}'", name);
        };
        return providers
            .into_iter()
            .find(|p| p.kind() == kind)
            .ok_or_else(|| anyhow::anyhow!("provider '{}' has no credential configured", kind));
    }
    let saved_kind = saved.and_then(ProviderKind::parse);
    let mut providers = providers;
    if let Some(kind) = saved_kind {
        if let Some(pos) = providers.iter().position(|p| p.kind() == kind) {
            return Ok(providers.swap_remove(pos));
        }
    }
    Ok(providers.remove(0))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging();
    let cfg = Config::from_env_and_file()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let state = persist::load_state();

    let available = Provider::available(&cfg)?;
    if available.is_empty() {
        bail!(
            "no provider credentials configured; set OPENAI_API_KEY, OPENROUTER_API_KEY, \
             ANTHROPIC_API_KEY or GEMINI_API_KEY"
        );
    }
    let provider = pick_provider(
        available,
        args.first().map(String::as_str),
        state.last_provider.as_deref(),
    )?;

    let models = provider.list_models().await;
    let model = if let Some(m) = args.get(1) {
        m.clone()
    } else if let Some(m) = state
        .last_model
        .filter(|m| models.iter().any(|info| &info.id == m))
    {
        m
    } else if let Some(first) = models.first() {
        first.id.clone()
    } else {
        bail!("no models available for provider '{}'", provider.kind());
    };
    let _ = persist::save_state(&persist::SavedState {
        last_provider: Some(provider.kind().label().to_string()),
        last_model: Some(model.clone()),
    });
    info!(target: "cli", "session start provider={} model={}", provider.kind(), model);

    let backend = Backend::from_env();
    let settings = backend.fetch_settings().await;
    let mut session = ChatSession::new(settings, model, persist::load_history());

    println!(
        "minichat — provider: {}, model: {} (Ctrl-D or /quit to exit)",
        provider.kind(),
        session.model
    );
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let text = line?.trim().to_string();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        let result = session
            .send(&provider, &text, |delta| {
                print!("{}", delta);
                let _ = io::stdout().flush();
            })
            .await;
        println!();
        match result {
            Ok(reply) => {
                persist::save_history(&session.messages)?;
                backend.log_interaction(InteractionRecord {
                    provider: provider.kind().label().to_string(),
                    model: session.model.clone(),
                    user_message: text,
                    ai_response: reply,
                    settings: session.settings.clone(),
                });
            }
            Err(e) => {
                eprintln!("error: {}", e);
            }
        }
    }
    Ok(())
}
