use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use wardrobe::filter::CategoryGroup;

mod commands;

#[derive(Parser)]
#[command(name = "wardrobe")]
#[command(about = "Wardrobe - personal clothing catalog\nWeather-aware outfit suggestions, shopping advice and try-on renders")]
#[command(version)]
struct Cli {
  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Catalog a new item from a photo
  Add {
    /// Photo of the item
    image: PathBuf,
    #[command(flatten)]
    tags: commands::ItemTags,
    /// Skip automatic tagging
    #[arg(long)]
    no_analyze: bool,
  },
  /// List items, newest first
  List {
    #[arg(short, long, value_enum, default_value_t = CategoryGroup::All)]
    group: CategoryGroup,
    /// Case-insensitive text matched against category, color and description
    #[arg(short, long)]
    query: Option<String>,
  },
  /// Remove an item
  Remove {
    id: String,
  },
  /// Record items as worn today
  Wear {
    #[arg(required = true)]
    ids: Vec<String>,
  },
  /// Show wardrobe utilization
  Stats,
  /// Show or edit the profile
  Profile {
    #[command(subcommand)]
    action: Option<ProfileAction>,
  },
  /// Current weather and dressing advice
  Weather {
    /// City name instead of the device location
    #[arg(long)]
    city: Option<String>,
  },
  /// Suggest an outfit for today
  Suggest {
    #[command(flatten)]
    options: commands::SuggestOptions,
  },
  /// Ask whether an item is worth buying
  Shop {
    /// Photo of the candidate item
    image: PathBuf,
  },
  /// Ask the styling assistant a question
  Chat {
    #[arg(required = true)]
    message: Vec<String>,
  },
  /// Show the effective configuration
  Config,
}

#[derive(Subcommand)]
enum ProfileAction {
  /// Update profile fields
  Set {
    #[command(flatten)]
    fields: commands::ProfileFields,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  valet::init_tracing(cli.verbose);

  match cli.command {
    Commands::Add { image, tags, no_analyze } => {
      commands::add_item(&image, tags, !no_analyze).await?;
    }
    Commands::List { group, query } => {
      commands::list_items(group, query.as_deref())?;
    }
    Commands::Remove { id } => {
      commands::remove_item(&id)?;
    }
    Commands::Wear { ids } => {
      commands::wear_items(&ids)?;
    }
    Commands::Stats => {
      commands::show_stats()?;
    }
    Commands::Profile { action: None } => {
      commands::show_profile()?;
    }
    Commands::Profile { action: Some(ProfileAction::Set { fields }) } => {
      commands::set_profile(fields)?;
    }
    Commands::Weather { city } => {
      commands::show_weather(city.as_deref()).await?;
    }
    Commands::Suggest { options } => {
      commands::suggest(options).await?;
    }
    Commands::Shop { image } => {
      commands::shop(&image).await?;
    }
    Commands::Chat { message } => {
      commands::chat(&message).await?;
    }
    Commands::Config => {
      commands::show_config()?;
    }
  }

  Ok(())
}
