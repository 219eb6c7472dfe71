use std::time::Instant;

use cinevault_core::{AppConfig, CatalogStore, JsonCatalog, TitleDraft};
use ratatui::{Terminal, backend::TestBackend, buffer::Buffer, layout::Position};

use super::draw_ui;
use crate::app::App;

fn app_in(dir: &tempfile::TempDir) -> App {
    let mut config = AppConfig::default();
    config.catalog_path = dir.path().join("catalog.json");
    config.log_path = dir.path().join("cinevault.log");
    let mut store = JsonCatalog::open(&config.catalog_path).unwrap();
    store
        .create(TitleDraft {
            title: "Harbor Lights".to_string(),
            genre: "Drama".to_string(),
            release_year: 1998,
            video_url: "https://youtu.be/aaaaaaaaaaa".to_string(),
            ..Default::default()
        })
        .unwrap();
    App::new(config).unwrap()
}

fn screen_text(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut text = String::new();
    for y in 0..area.height {
        for x in 0..area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

fn render(app: &mut App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal.draw(|f| draw_ui(f, app)).unwrap();
    screen_text(terminal.backend().buffer())
}

#[test]
fn test_catalog_shows_titles_and_fallback_poster() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_in(&dir);
    let screen = render(&mut app);
    assert!(screen.contains("Harbor Lights"));
    assert!(screen.contains("Titles (1)"));
    assert!(screen.contains("images.unsplash.com"));
    assert!(app.surface_area.is_none());
}

#[test]
fn test_watch_view_records_surface_and_controls() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_in(&dir);
    app.watch_title(1, None).unwrap();
    app.update(Instant::now());

    let screen = render(&mut app);
    assert!(screen.contains("Harbor Lights"));
    assert!(screen.contains("youtube.com/embed/aaaaaaaaaaa"));
    assert!(screen.contains("LIVE"));

    let surface = app.surface_area.unwrap();
    let controls = app.controls_area.unwrap();
    assert!(surface.contains(Position::new(controls.x, controls.y)));
    assert_eq!(controls.bottom(), surface.bottom());
}

#[test]
fn test_help_overlay_follows_view() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_in(&dir);
    app.show_help = true;
    assert!(render(&mut app).contains("Clear search"));

    app.watch_title(1, None).unwrap();
    assert!(render(&mut app).contains("Retry after an error"));
}
