mod examples;
mod fixture;
mod output;
mod replay;
mod theme;

use std::{fmt::Write, path::PathBuf};

use anyhow::Result;
use clap::{
    Args, ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, Style},
    },
};
use colored::{Color as ThemeColor, Colorize, control::ShouldColorize};
use comfy_table::{Cell, Table};
use entity_tracker::TrackerConfig;

use examples::{ExampleGroup, command_examples};
use fixture::{Fixture, FixtureSummary};
use output::{GlobalOptions, OutputFormat, OutputManager, TableDisplay, set_table_header, themed_table};
use theme::{ARROW, THEME};

#[derive(Parser)]
#[command(name = "entity-tracker")]
#[command(version)]
#[command(
    about = "Replay unit-of-work scenarios and inspect change notifications",
    long_about = r#"Replays scenario fixtures against an in-memory persistence context with
the change listener attached, and prints every entityChanged notification
raised at flush time.

Commands:
  replay   Run a fixture and print its notifications
  check    Validate a fixture without running it
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a fixture and print the change notifications
    Replay(ReplayArgs),

    /// Validate a fixture without replaying it
    Check(CheckArgs),
}

#[derive(Args)]
struct ReplayArgs {
    /// Fixture file (TOML)
    fixture: PathBuf,

    /// Tracker settings replacing the fixture's [tracker] table
    #[arg(long, env = "ENTITY_TRACKER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct CheckArgs {
    /// Fixture file (TOML)
    fixture: PathBuf,
}

impl TableDisplay for FixtureSummary {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        set_table_header(&mut table, options, &["Classes", "Tracked", "Steps", "Flushes"]);
        table.add_row(vec![
            Cell::new(self.classes.join(", ")),
            Cell::new(self.tracked.join(", ")),
            Cell::new(self.steps),
            Cell::new(self.flushes),
        ]);
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "classes={} tracked={} steps={} flushes={}",
            self.classes.len(),
            self.tracked.len(),
            self.steps,
            self.flushes
        )
    }
}

fn main() {
    env_logger::init();

    let cli = parse_cli();
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli.command, &output) {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn execute(command: Commands, output: &OutputManager) -> Result<()> {
    match command {
        Commands::Replay(args) => handle_replay(args, output),
        Commands::Check(args) => handle_check(args, output),
    }
}

fn handle_replay(args: ReplayArgs, output: &OutputManager) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => fixture.tracker.clone(),
    };
    let name = args.fixture.display().to_string();

    output.heading(&format!("Replaying {name}"));
    output.info(&format!(
        "eligibility: {:?}, proxy traversal: {:?}",
        config.eligibility, config.proxy_traversal
    ));

    let report = replay::replay(&fixture, &config, &name)?;
    if report.notifications.is_empty() {
        output.warning(&format!("no notifications over {} flush(es)", report.flushes));
        return Ok(());
    }

    output.display(&report)?;
    output.success(&format!(
        "{} notification(s) over {} flush(es)",
        report.notifications.len(),
        report.flushes
    ));
    Ok(())
}

fn handle_check(args: CheckArgs, output: &OutputManager) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let summary = fixture.validate()?;

    output.display(&summary)?;
    for class in &summary.tracked {
        output.bullet(&format!("{class} is tracked"));
    }
    output.success(&format!("{} is valid", args.fixture.display()));
    Ok(())
}

fn parse_cli() -> Cli {
    let use_color = ShouldColorize::from_env().should_colorize();
    let mut command = Cli::command()
        .styles(help_styles())
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });
    attach_command_examples(&mut command, use_color);

    let matches = command.get_matches();
    match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    }
}

fn attach_command_examples(command: &mut Command, use_color: bool) {
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            *subcommand = subcommand
                .clone()
                .after_long_help(render_examples(example.groups, use_color));
        }
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", stylize("Examples:", THEME.heading, true, use_color));

    for (index, group) in groups.iter().enumerate() {
        let _ = writeln!(buffer, "  {}", stylize(group.title, THEME.emphasis, true, use_color));
        for command in group.commands {
            let _ = writeln!(
                buffer,
                "    {} {}",
                stylize(ARROW, THEME.command, false, use_color),
                stylize(command, THEME.command, false, use_color)
            );
        }
        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }
    buffer
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    match (use_color, bold) {
        (false, _) => text.to_string(),
        (true, true) => text.color(color).bold().to_string(),
        (true, false) => text.color(color).to_string(),
    }
}

fn help_styles() -> Styles {
    Styles::styled()
        .usage(style_from_color(THEME.emphasis).bold())
        .header(style_from_color(THEME.heading).bold())
        .literal(style_from_color(THEME.command))
        .placeholder(style_from_color(THEME.muted))
        .valid(style_from_color(THEME.success))
        .invalid(style_from_color(THEME.warning))
        .error(style_from_color(THEME.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    let ansi = match color {
        ThemeColor::Red => AnsiColor::Red,
        ThemeColor::Green => AnsiColor::Green,
        ThemeColor::Yellow => AnsiColor::Yellow,
        ThemeColor::Blue => AnsiColor::Blue,
        ThemeColor::Magenta => AnsiColor::Magenta,
        ThemeColor::Cyan => AnsiColor::Cyan,
        ThemeColor::BrightBlack => AnsiColor::BrightBlack,
        ThemeColor::BrightBlue => AnsiColor::BrightBlue,
        _ => AnsiColor::White,
    };
    Style::new().fg_color(Some(ClapColor::Ansi(ansi)))
}
