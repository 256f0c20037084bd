use crate::app::{AppContext, Result};
use crate::scheduler::{listen_for_signals, ChannelScheduler, Shutdown};

pub async fn run(ctx: &AppContext) -> Result<()> {
    let shutdown = Shutdown::new();
    let listener = listen_for_signals(shutdown.clone(), ctx.notifier.clone());

    let mut scheduler = ChannelScheduler::from_context(ctx, shutdown)?;
    scheduler.run().await;

    listener.abort();
    Ok(())
}

pub async fn run_once(ctx: &AppContext) -> Result<()> {
    let shutdown = Shutdown::new();
    let listener = listen_for_signals(shutdown.clone(), ctx.notifier.clone());

    let mut scheduler = ChannelScheduler::from_context(ctx, shutdown)?;
    let report = scheduler.run_cycle().await;
    println!("{}", report);

    listener.abort();
    Ok(())
}

pub async fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.feeds()?;

    for feed in feeds {
        let state = ctx.store.get(&feed.id).await?.unwrap_or_default();
        let cursor = if state.cursor > feed.cursor {
            state.cursor
        } else {
            feed.cursor.clone()
        };
        let playlist = state.playlist_id.or(feed.playlist_id.clone());

        let mut flags = Vec::new();
        if feed.options.suspended {
            flags.push("suspended");
        }
        if feed.options.skip_cover {
            flags.push("no cover");
        }
        if feed.options.skip_description {
            flags.push("no description");
        }

        println!("{} [{}]", feed.display_title(), feed.id);
        println!("  source:   {}", feed.source);
        if let Some(playlist) = playlist {
            println!("  playlist: {}", playlist);
        }
        println!("  cursor:   {}", cursor);
        if !flags.is_empty() {
            println!("  options:  {}", flags.join(", "));
        }
    }

    Ok(())
}
