//! Non-interactive subcommands: source inspection and catalog management.

use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Subcommand};

use cinevault_core::{Backend, CatalogStore, Title, TitleDraft, TitlePatch, classify, split_headers};

#[derive(Subcommand)]
pub enum TitlesCommand {
    /// List titles, optionally filtered by a search query
    List {
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Show one title in full
    Show { id: i64 },
    /// Add a title
    Add(TitleArgs),
    /// Change fields of a title; omitted fields are kept
    Update {
        id: i64,
        #[command(flatten)]
        fields: PatchArgs,
    },
    /// Remove a title
    Delete { id: i64 },
}

#[derive(Args)]
pub struct TitleArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub genre: String,
    #[arg(long)]
    pub year: i32,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "")]
    pub poster: String,
    #[arg(long, default_value = "")]
    pub video: String,
    #[arg(long)]
    pub series: bool,
    /// JSON array of {"title", "url"} objects
    #[arg(long, default_value = "")]
    pub episodes: String,
}

impl From<TitleArgs> for TitleDraft {
    fn from(args: TitleArgs) -> Self {
        TitleDraft {
            title: args.title,
            description: args.description,
            poster_url: args.poster,
            video_url: args.video,
            genre: args.genre,
            release_year: args.year,
            is_series: args.series,
            episodes: args.episodes,
        }
    }
}

#[derive(Args, Default)]
pub struct PatchArgs {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub genre: Option<String>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub poster: Option<String>,
    #[arg(long)]
    pub video: Option<String>,
    #[arg(long)]
    pub series: Option<bool>,
    #[arg(long)]
    pub episodes: Option<String>,
}

impl From<PatchArgs> for TitlePatch {
    fn from(args: PatchArgs) -> Self {
        TitlePatch {
            title: args.title,
            description: args.description,
            poster_url: args.poster,
            video_url: args.video,
            genre: args.genre,
            release_year: args.year,
            is_series: args.series,
            episodes: args.episodes,
        }
    }
}

pub fn run_titles(catalog: &mut impl CatalogStore, command: TitlesCommand) -> Result<()> {
    let mut out = io::stdout().lock();
    execute_titles(catalog, command, &mut out)
}

fn execute_titles(catalog: &mut impl CatalogStore, command: TitlesCommand, out: &mut impl Write) -> Result<()> {
    match command {
        TitlesCommand::List { query } => {
            let titles = match query.as_deref() {
                Some(q) => catalog.search(q),
                None => catalog.list(),
            };
            if titles.is_empty() {
                writeln!(out, "No titles")?;
            }
            for title in &titles {
                writeln!(out, "{}", summary_line(title))?;
            }
        }
        TitlesCommand::Show { id } => {
            let title = catalog.get(id).ok_or_else(|| anyhow!("No title with id {}", id))?;
            write_details(out, &title)?;
        }
        TitlesCommand::Add(args) => {
            let title = catalog.create(args.into()).context("Could not add title")?;
            writeln!(out, "Added {}", summary_line(&title))?;
        }
        TitlesCommand::Update { id, fields } => {
            let patch: TitlePatch = fields.into();
            if patch.is_empty() {
                return Err(anyhow!("Nothing to update"));
            }
            let title = catalog.update(id, patch).context("Could not update title")?;
            writeln!(out, "Updated {}", summary_line(&title))?;
        }
        TitlesCommand::Delete { id } => {
            catalog.delete(id).context("Could not delete title")?;
            writeln!(out, "Deleted {}", id)?;
        }
    }
    Ok(())
}

fn summary_line(title: &Title) -> String {
    let kind = if title.is_series {
        format!("series, {} episodes", title.episodes.len())
    } else {
        "movie".to_string()
    };
    format!("#{} {} ({}) [{}] {}", title.id, title.title, title.release_year, title.genre, kind)
}

fn write_details(out: &mut impl Write, title: &Title) -> io::Result<()> {
    writeln!(out, "{}", summary_line(title))?;
    if !title.description.is_empty() {
        writeln!(out, "  {}", title.description)?;
    }
    writeln!(out, "  poster: {}", title.poster_or_fallback())?;
    for (label, url) in title.playback_sources() {
        writeln!(out, "  {}: {} ({})", label, url, classify(&split_headers(&url).url))?;
    }
    Ok(())
}

/// Print how a source would be played
pub fn print_classification(url: &str) -> Result<()> {
    let mut out = io::stdout().lock();
    describe_source(url, &mut out)?;
    Ok(())
}

fn describe_source(raw: &str, out: &mut impl Write) -> io::Result<()> {
    let playable = split_headers(raw.trim());
    let strategy = classify(&playable.url);
    writeln!(out, "url:      {}", playable.url)?;
    writeln!(out, "strategy: {}", strategy)?;
    match Backend::for_strategy(&strategy) {
        Some(backend) => writeln!(out, "backend:  {:?}", backend)?,
        None => writeln!(out, "backend:  none")?,
    }
    if let Some(embed) = strategy.embed_url() {
        writeln!(out, "embed:    {}", embed)?;
    }
    // values may carry credentials
    for name in playable.headers.keys() {
        writeln!(out, "header:   {}", name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinevault_core::MemoryCatalog;

    fn run(catalog: &mut MemoryCatalog, command: TitlesCommand) -> Result<String> {
        let mut out = Vec::new();
        execute_titles(catalog, command, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn add_args(title: &str) -> TitleArgs {
        TitleArgs {
            title: title.to_string(),
            genre: "Noir".to_string(),
            year: 1950,
            description: String::new(),
            poster: String::new(),
            video: "https://cdn.example/film.mp4".to_string(),
            series: false,
            episodes: String::new(),
        }
    }

    #[test]
    fn test_add_list_delete() {
        let mut catalog = MemoryCatalog::new();
        let added = run(&mut catalog, TitlesCommand::Add(add_args("Sunset Boulevard"))).unwrap();
        assert!(added.contains("#1 Sunset Boulevard (1950)"));

        let listed = run(&mut catalog, TitlesCommand::List { query: Some("sunset".into()) }).unwrap();
        assert!(listed.contains("Sunset Boulevard"));

        run(&mut catalog, TitlesCommand::Delete { id: 1 }).unwrap();
        let listed = run(&mut catalog, TitlesCommand::List { query: None }).unwrap();
        assert_eq!(listed.trim(), "No titles");
    }

    #[test]
    fn test_update_requires_fields() {
        let mut catalog = MemoryCatalog::new();
        run(&mut catalog, TitlesCommand::Add(add_args("Laura"))).unwrap();
        let empty = TitlesCommand::Update { id: 1, fields: PatchArgs::default() };
        assert!(run(&mut catalog, empty).is_err());

        let fields = PatchArgs { year: Some(1944), ..Default::default() };
        let out = run(&mut catalog, TitlesCommand::Update { id: 1, fields }).unwrap();
        assert!(out.contains("(1944)"));
    }

    #[test]
    fn test_invalid_title_is_rejected() {
        let mut catalog = MemoryCatalog::new();
        let mut args = add_args("Nothing to play");
        args.video = String::new();
        assert!(run(&mut catalog, TitlesCommand::Add(args)).is_err());
        assert!(run(&mut catalog, TitlesCommand::Show { id: 1 }).is_err());
    }

    #[test]
    fn test_describe_source_hides_header_values() {
        let mut out = Vec::new();
        describe_source(
            "https://cdn.example/live.m3u8?headers=%7B%22Authorization%22%3A%22secret%22%7D",
            &mut out,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("strategy: hls-manifest"));
        assert!(text.contains("header:   Authorization"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_describe_embed_source() {
        let mut out = Vec::new();
        describe_source("https://youtu.be/dQw4w9WgXcQ", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("embed-provider(youtube)"));
        assert!(text.contains("https://www.youtube.com/embed/dQw4w9WgXcQ"));
    }
}
