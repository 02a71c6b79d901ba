//! MedAssist - 命令行问答
//!
//! 入口：初始化日志、加载配置、装配编排器，并在 stdin 上运行逐行对话。
//! `/clear` 开始新对话，`/quit` 退出。

use std::sync::Arc;

use anyhow::Context;
use medassist::config::{load_config, AppConfig};
use medassist::core::RunEvent;
use medassist::{build_orchestrator, ChatSession};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn describe(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::ContextFetched { source, snippets } => {
            Some(format!("  retrieved {} snippet(s) from {}", snippets, source))
        }
        RunEvent::ProviderFailed { source, reason } => {
            Some(format!("  {} unavailable: {}", source, reason))
        }
        RunEvent::GenerationFailed { attempt, reason } => {
            Some(format!("  generation attempt {} failed: {}", attempt, reason))
        }
        RunEvent::Fallback { reason } => Some(format!("  answering without context ({})", reason)),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖；输出到 stderr，不与回答混排
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        AppConfig::default()
    });
    let orchestrator = build_orchestrator(&cfg).context("Failed to build orchestrator")?;
    let mut session = ChatSession::new(Arc::new(orchestrator));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let banner = format!(
        "{} (/clear for a new conversation, /quit to exit)\n",
        cfg.app.name
    );
    stdout.write_all(banner.as_bytes()).await?;

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.reset();
                stdout.write_all(b"Started a new conversation.\n").await?;
                continue;
            }
            _ => {}
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
        let progress = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if let Some(text) = describe(&event) {
                    eprintln!("{}", text);
                }
            }
        });
        let reply = session.ask_with_events(input, &event_tx).await;
        drop(event_tx);
        let _ = progress.await;

        let mut out = format!("\nAnswer:\n{}\n", reply.answer);
        if !reply.failed {
            out.push_str(&format!("\nContext (Source: {}):\n", reply.context_source));
            if reply.context.is_empty() {
                out.push_str("(none)\n");
            } else {
                out.push_str(&reply.context);
                out.push('\n');
            }
        }
        stdout.write_all(out.as_bytes()).await?;
    }

    Ok(())
}
