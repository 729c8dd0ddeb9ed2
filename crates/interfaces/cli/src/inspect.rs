//! Offline views of a page: what the pipeline sees before any oracle call.

use anyhow::Result;

use pagesift_config::AppConfig;
use pagesift_dom::{normalize, render_snapshot, tag_distribution};
use pagesift_runtime::{Extractor, LoadedPage};

async fn load(config: &AppConfig, url: &str) -> Result<(Extractor, LoadedPage)> {
    let extractor = Extractor::from_config(config)?;
    let ctx = extractor.context();
    let page = extractor.load(&ctx, url).await?;
    Ok((extractor, page))
}

pub(crate) async fn snapshot(config: &AppConfig, url: &str, json: bool) -> Result<()> {
    let (_, page) = load(config, url).await?;
    let lines = normalize(&page.document);
    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else {
        println!("{}", render_snapshot(&lines));
    }
    Ok(())
}

pub(crate) async fn outline(config: &AppConfig, url: &str) -> Result<()> {
    let (extractor, page) = load(config, url).await?;
    println!("{}", extractor.digest(&page));
    Ok(())
}

/// Counts every tag, boilerplate included: this is a view of the page, not
/// of what the pipeline reads.
pub(crate) async fn analyze(config: &AppConfig, url: &str, json: bool) -> Result<()> {
    let extractor = Extractor::from_config(config)?;
    let raw = extractor.fetch(&extractor.context(), url).await?;
    let distribution = tag_distribution(&raw.into_document()?);
    if json {
        println!("{}", serde_json::to_string_pretty(&distribution)?);
        return Ok(());
    }

    println!("{url}: {} characters of text", distribution.total_chars);
    for share in &distribution.shares {
        println!("{:>12} {:>6.2}% {:>8}", share.tag, share.percent, share.chars);
    }
    Ok(())
}
