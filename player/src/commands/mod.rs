use anyhow::{Result, anyhow};
use ratatui::style::Color;

use crate::app::{App, AppView};

/// Commands typed after `:`
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Seek to an absolute position, or by an offset when signed
    Seek(SeekTarget),
    /// Volume in percent
    Volume(u8),
    Mute,
    /// Episode number, starting at 1
    Episode(usize),
    Open(String),
    Retry,
    Autoplay(bool),
    Search(String),
    Back,
    Quit,
    Help,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    To(f64),
    By(f64),
}

/// Parse a command line
pub fn parse_command(input: &str) -> Result<AppCommand> {
    let parts: Vec<&str> = input.trim().splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());

    let command = match cmd.as_str() {
        "seek" | "s" => {
            let arg = args.ok_or_else(|| anyhow!("Seek command requires a position argument"))?;
            parse_seek(arg)?
        }
        "volume" | "vol" | "v" => {
            let arg = args.ok_or_else(|| anyhow!("Volume command requires a level argument (0-100)"))?;
            match arg.parse::<u8>() {
                Ok(level) if level <= 100 => AppCommand::Volume(level),
                _ => return Err(anyhow!("Invalid volume: {}", arg)),
            }
        }
        "mute" | "m" => AppCommand::Mute,
        "episode" | "ep" | "e" => {
            let arg = args.ok_or_else(|| anyhow!("Episode command requires an episode number"))?;
            match arg.parse::<usize>() {
                Ok(n) if n >= 1 => AppCommand::Episode(n),
                _ => return Err(anyhow!("Invalid episode: {}", arg)),
            }
        }
        "open" | "o" => {
            let url = args.ok_or_else(|| anyhow!("Open command requires a URL"))?;
            AppCommand::Open(url.to_string())
        }
        "retry" | "r" => AppCommand::Retry,
        "autoplay" => match args {
            Some("on" | "true" | "1") => AppCommand::Autoplay(true),
            Some("off" | "false" | "0") => AppCommand::Autoplay(false),
            Some(other) => return Err(anyhow!("Invalid autoplay setting: {}", other)),
            None => return Err(anyhow!("Autoplay command requires on or off")),
        },
        "search" | "find" | "/" => AppCommand::Search(args.unwrap_or_default().to_string()),
        "back" | "menu" | "home" => AppCommand::Back,
        "quit" | "exit" | "q" => AppCommand::Quit,
        "help" | "h" | "?" => AppCommand::Help,
        "" => AppCommand::Nothing,
        _ => return Err(anyhow!("Unknown command: {}", cmd)),
    };
    Ok(command)
}

fn parse_seek(arg: &str) -> Result<AppCommand> {
    let invalid = || anyhow!("Invalid position: {}", arg);
    let target = if let Some(rest) = arg.strip_prefix('+') {
        SeekTarget::By(parse_position(rest).ok_or_else(invalid)?)
    } else if let Some(rest) = arg.strip_prefix('-') {
        SeekTarget::By(-parse_position(rest).ok_or_else(invalid)?)
    } else {
        SeekTarget::To(parse_position(arg).ok_or_else(invalid)?)
    };
    Ok(AppCommand::Seek(target))
}

/// Seconds, or `m:ss` / `h:mm:ss`
fn parse_position(text: &str) -> Option<f64> {
    let mut total = 0.0;
    for part in text.split(':') {
        let value: f64 = part.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

/// Handle a command string entered by the user
pub fn handle_command(app: &mut App, input: &str) -> Result<()> {
    match parse_command(input)? {
        AppCommand::Seek(target) => {
            let watch = app.watch_mut().ok_or_else(|| anyhow!("Nothing is playing"))?;
            match target {
                SeekTarget::To(secs) => watch.controller.seek_to(secs),
                SeekTarget::By(delta) => watch.controller.seek_by(delta),
            }
        }
        AppCommand::Volume(level) => {
            let watch = app.watch_mut().ok_or_else(|| anyhow!("Nothing is playing"))?;
            watch.controller.set_volume(f64::from(level) / 100.0);
            app.set_status(format!("Volume {}%", level), Color::Yellow);
        }
        AppCommand::Mute => {
            let watch = app.watch_mut().ok_or_else(|| anyhow!("Nothing is playing"))?;
            watch.controller.toggle_mute();
        }
        AppCommand::Episode(n) => app.play_episode(n - 1)?,
        AppCommand::Open(url) => app.watch_url(&url)?,
        AppCommand::Retry => {
            let watch = app.watch_mut().ok_or_else(|| anyhow!("Nothing is playing"))?;
            watch.controller.retry();
        }
        AppCommand::Autoplay(enabled) => {
            app.config.player.autoplay = enabled;
            if let Some(watch) = app.watch_mut() {
                watch.controller.set_autoplay(enabled);
            }
            app.set_status(
                format!("Autoplay {}", if enabled { "on" } else { "off" }),
                Color::Green,
            );
        }
        AppCommand::Search(query) => {
            app.close_watch();
            app.browser.set_query(query);
        }
        AppCommand::Back => {
            if app.view == AppView::Watch {
                app.close_watch();
                app.set_status("Back to catalog", Color::Blue);
            }
        }
        AppCommand::Quit => app.should_quit = true,
        AppCommand::Help => app.show_help = true,
        AppCommand::Nothing => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seek() {
        assert_eq!(parse_command("seek 90").unwrap(), AppCommand::Seek(SeekTarget::To(90.0)));
        assert_eq!(parse_command("s 1:30").unwrap(), AppCommand::Seek(SeekTarget::To(90.0)));
        assert_eq!(parse_command("seek 1:00:05").unwrap(), AppCommand::Seek(SeekTarget::To(3605.0)));
        assert_eq!(parse_command("seek +10").unwrap(), AppCommand::Seek(SeekTarget::By(10.0)));
        assert_eq!(parse_command("seek -0:15").unwrap(), AppCommand::Seek(SeekTarget::By(-15.0)));
        assert!(parse_command("seek").is_err());
        assert!(parse_command("seek soon").is_err());
        assert!(parse_command("seek 1:-5").is_err());
    }

    #[test]
    fn test_parse_volume_and_episode() {
        assert_eq!(parse_command("vol 40").unwrap(), AppCommand::Volume(40));
        assert!(parse_command("vol 140").is_err());
        assert_eq!(parse_command("ep 2").unwrap(), AppCommand::Episode(2));
        assert!(parse_command("ep 0").is_err());
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(
            parse_command("open https://cdn.example/a.mp4").unwrap(),
            AppCommand::Open("https://cdn.example/a.mp4".into())
        );
        assert_eq!(parse_command("autoplay on").unwrap(), AppCommand::Autoplay(true));
        assert_eq!(parse_command("AUTOPLAY off").unwrap(), AppCommand::Autoplay(false));
        assert!(parse_command("autoplay maybe").is_err());
        assert_eq!(parse_command("search noir").unwrap(), AppCommand::Search("noir".into()));
        assert_eq!(parse_command("search").unwrap(), AppCommand::Search(String::new()));
        assert_eq!(parse_command("  ").unwrap(), AppCommand::Nothing);
        assert_eq!(parse_command("q").unwrap(), AppCommand::Quit);
        assert!(parse_command("renderer kitty").is_err());
    }
}
