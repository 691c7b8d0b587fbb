use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use diary_core::{
    Config, Database, DiaryEntry, DiaryError, DiaryService, DiaryWeatherResolver, RefreshOutcome,
    SqliteDiaryStore, SqliteWeatherCache, SystemClock, WeatherFetcher, WeatherScheduler,
    config::parse_time_of_day, provider::client_from_config,
};
use std::sync::Arc;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-diary", version, about = "Daily diary tagged with the day's weather")]
pub struct Cli {
    /// Log more (debug level) unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the OpenWeather API key, location and daily refresh time.
    Configure,

    /// Write a diary entry, tagged with that day's weather.
    Write {
        /// Entry date (YYYY-MM-DD); today if absent.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Diary text.
        text: String,
    },

    /// Show every entry for one day.
    Read {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show entries between two dates, inclusive.
    List {
        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,
    },

    /// Replace the text of the first entry of a day.
    Update {
        #[arg(long)]
        date: Option<NaiveDate>,

        text: String,
    },

    /// Delete every entry of a day.
    Delete {
        #[arg(long)]
        date: NaiveDate,
    },

    /// Fetch today's weather into the cache now.
    Refresh,

    /// Keep running and refresh the weather cache once a day.
    Daemon,
}

/// Everything a command needs, built from the on-disk config.
///
/// The weather client is only built by commands that call the provider, so
/// reading and editing the diary work without an API key.
struct App {
    config: Config,
    cache: Arc<SqliteWeatherCache>,
    diary: DiaryService,
}

impl App {
    fn load() -> Result<Self> {
        Self::open(Config::load()?)
    }

    fn open(config: Config) -> Result<Self> {
        let path = config.database_path()?;
        let db = Database::open(&path)?;
        let cache = Arc::new(SqliteWeatherCache::new(db.clone()));
        let diary = DiaryService::new(Arc::new(SqliteDiaryStore::new(db)));

        tracing::debug!(
            database = %path.display(),
            location = %config.location,
            "Loaded configuration"
        );
        Ok(Self { config, cache, diary })
    }

    fn fetcher(&self) -> Result<WeatherFetcher> {
        let client = client_from_config(&self.config)?;
        Ok(WeatherFetcher::new(
            Arc::from(client),
            Arc::new(SystemClock),
            self.config.location.clone(),
        ))
    }

    fn resolver(&self) -> Result<DiaryWeatherResolver> {
        Ok(DiaryWeatherResolver::new(self.cache.clone(), self.fetcher()?)
            .with_policy(self.config.on_demand_policy()))
    }

    fn scheduler(&self) -> Result<WeatherScheduler> {
        Ok(WeatherScheduler::new(self.fetcher()?, self.cache.clone()))
    }
}

impl Cli {
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "weather_diary=debug,diary_core=debug"
        } else {
            "weather_diary=info,diary_core=info"
        }
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure()?,
            Command::Write { date, text } => {
                let date = date.unwrap_or_else(today);
                let app = App::load()?;
                match app.diary.create(&app.resolver()?, date, &text).await {
                    Ok(entry) => {
                        println!("Saved entry for {date}");
                        print_entry(&entry);
                    }
                    Err(err @ DiaryError::WeatherUnavailable { .. }) => {
                        return Err(anyhow::Error::new(err).context(
                            "Diary entry was not saved; try again once weather is available",
                        ));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Command::Read { date } => {
                let date = date.unwrap_or_else(today);
                let entries = App::load()?.diary.read(date).await?;
                print_entries(&entries, &format!("No entries for {date}."));
            }
            Command::List { from, to } => {
                let entries = App::load()?.diary.read_range(from, to).await?;
                print_entries(&entries, &format!("No entries between {from} and {to}."));
            }
            Command::Update { date, text } => {
                let date = date.unwrap_or_else(today);
                let entry = App::load()?.diary.update(date, &text).await?;
                println!("Updated entry for {date}");
                print_entry(&entry);
            }
            Command::Delete { date } => {
                let removed = App::load()?.diary.delete(date).await?;
                let noun = if removed == 1 { "entry" } else { "entries" };
                println!("Deleted {removed} {noun} for {date}");
            }
            Command::Refresh => match App::load()?.scheduler()?.run_once().await {
                RefreshOutcome::Stored(record) => println!(
                    "Cached weather for {}: {} ({}), {:.1} K",
                    record.date, record.condition, record.icon_code, record.temperature_kelvin
                ),
                RefreshOutcome::Skipped(reason) => println!("Weather not cached: {reason}"),
            },
            Command::Daemon => {
                let app = App::load()?;
                let at = app.config.refresh_at;
                let handle = app.scheduler()?.spawn(at);
                tracing::info!(%at, "Daily weather refresh scheduled; press Ctrl-C to stop");

                tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
                handle.abort();
                tracing::info!("Shutting down");
            }
        }

        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.api_key = Some(api_key.trim().to_string());
    }

    let location = inquire::Text::new("Location:")
        .with_default(&config.location)
        .prompt()
        .context("Failed to read location")?;
    config.location = location;

    let refresh_default = config.refresh_at.format("%H:%M").to_string();
    let refresh_at = inquire::Text::new("Daily weather refresh time (HH:MM):")
        .with_default(&refresh_default)
        .prompt()
        .context("Failed to read refresh time")?;
    config.refresh_at = parse_time_of_day(&refresh_at)?;

    config.persist_on_demand = inquire::Confirm::new("Cache weather fetched while writing entries?")
        .with_default(config.persist_on_demand)
        .prompt()
        .context("Failed to read cache policy")?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn print_entries(entries: &[DiaryEntry], empty: &str) {
    if entries.is_empty() {
        println!("{empty}");
        return;
    }
    for entry in entries {
        print_entry(entry);
    }
}

fn print_entry(entry: &DiaryEntry) {
    println!(
        "{}  {} ({}, {:.1} K)\n    {}",
        entry.date, entry.condition, entry.icon_code, entry.temperature_kelvin, entry.text
    );
}
