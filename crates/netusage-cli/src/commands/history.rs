use anyhow::{Context, bail};
use futures_util::{SinkExt, StreamExt};
use netusage_core::{
    ChartFrame, MessageOutcome, PipelineConfig, RenderAdapter, Renderer, RequestOutcome,
    SessionState, StreamSession,
};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::tui::{self, ChartRenderer};

pub struct HistoryCommandConfig<'a> {
    pub url: &'a str,
    pub days: u32,
    pub bucket_size: Option<usize>,
    pub config_path: Option<&'a str>,
    pub output_path: Option<&'a str>,
}

/// Run one history request against `session` and draw every merged chunk.
///
/// Returns whether the server sent its terminator. The session is always
/// left `Idle` with its series intact.
pub async fn stream_history<R: Renderer>(
    url: &str,
    days: u32,
    session: &mut StreamSession,
    adapter: &mut RenderAdapter<R>,
) -> anyhow::Result<bool> {
    if session.request(url, days) == RequestOutcome::Ignored {
        bail!("history request for {days} days on {url} was not accepted");
    }
    adapter.reset();

    let (ws, _) = match tokio_tungstenite::connect_async(url).await {
        Ok(conn) => conn,
        Err(e) => {
            session.on_close();
            return Err(e).with_context(|| format!("connecting to {url}"));
        }
    };
    let (mut write, mut read) = ws.split();

    if let Some(request) = session.on_open() {
        let text = serde_json::to_string(&request)?;
        if let Err(e) = write.send(Message::Text(text.into())).await {
            session.on_close();
            return Err(e).context("sending history request");
        }
    }

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("history stream broke: {e}");
                break;
            }
        };
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match session.on_message(text.as_str()) {
            MessageOutcome::Merged { chunk_id, points } => {
                log::debug!("chunk {chunk_id}: {points} points");
                adapter.present(&ChartFrame::from(session.series()));
            }
            MessageOutcome::Finished => break,
            MessageOutcome::Dropped | MessageOutcome::Ignored => {}
        }
    }

    let finished = session.state() == SessionState::Closed;
    session.on_close();
    Ok(finished)
}

fn summary(session: &StreamSession, finished: bool) -> String {
    format!(
        "{} chunks, {} points, {} dropped{}",
        session.chunk_index(),
        session.series().len(),
        session.dropped(),
        if finished { "" } else { " (stream ended early)" }
    )
}

pub fn run(cfg: HistoryCommandConfig) -> anyhow::Result<()> {
    let pipeline =
        super::load_pipeline(cfg.config_path, cfg.bucket_size, PipelineConfig::history())?;
    let bucket = pipeline.config().bucket_size;
    let mut session = StreamSession::new(pipeline);

    let rt = tokio::runtime::Runtime::new()?;
    let (terminal, guard) = tui::enter().context("starting terminal UI")?;
    let mut adapter = RenderAdapter::new(ChartRenderer::new(
        terminal,
        format!("{}  last {} days, {} samples per point", cfg.url, cfg.days, bucket),
    ));
    adapter.renderer_mut().redraw();

    let streamed = rt.block_on(async {
        let cancel = CancellationToken::new();
        let keys = tui::spawn_quit_listener(cancel.clone());

        let streamed = tokio::select! {
            result = stream_history(cfg.url, cfg.days, &mut session, &mut adapter) => Some(result),
            _ = cancel.cancelled() => None,
        };
        if let Some(Ok(finished)) = &streamed {
            // keep the chart up until the user leaves
            let chart = adapter.renderer_mut();
            chart.set_notice(Some(summary(&session, *finished)));
            chart.redraw();
            cancel.cancelled().await;
        }

        cancel.cancel();
        let _ = keys.await;
        streamed
    });
    drop(adapter);
    drop(guard);

    let finished = match streamed {
        Some(result) => result?,
        None => {
            session.on_close();
            false
        }
    };
    println!("{}", summary(&session, finished));

    if let Some(path) = cfg.output_path {
        let json = serde_json::to_string_pretty(&ChartFrame::from(session.series()))?;
        std::fs::write(path, json).with_context(|| format!("writing {path}"))?;
        println!("Series written to {path}");
    }
    Ok(())
}
